//! BetBoom line snapshot (protobuf), replayed from disk.
//!
//! BetBoom has no plain HTTP line endpoint; its live line is streamed over a
//! protobuf WebSocket. This adapter reads recorded `LineSnapshot` messages
//! (usually through a file feed): tournaments carry a numeric sport code and
//! matches reference tournaments by id.
//!
//! Record policy: hidden matches and outrights are dropped, as are matches
//! with a zero id or a blank participant name.

use async_trait::async_trait;
use common::{Bookmaker, EventError, SportEvent, SportType};
use prost::Message;
use source_adapter_trait::{FeedSource, ParsedFeed, RawPayload, SourceAdapter};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, PartialEq, Message)]
pub struct LineSnapshot {
    #[prost(message, repeated, tag = "1")]
    pub tournaments: Vec<BetboomTournament>,
    #[prost(message, repeated, tag = "2")]
    pub matches: Vec<BetboomMatch>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BetboomTournament {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(uint32, tag = "2")]
    pub sport_code: u32,
    #[prost(string, tag = "3")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct BetboomMatch {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint32, tag = "2")]
    pub tournament_id: u32,
    /// Unix seconds.
    #[prost(int64, tag = "3")]
    pub start_ts: i64,
    #[prost(string, tag = "4")]
    pub home: String,
    #[prost(string, tag = "5")]
    pub away: String,
    #[prost(string, tag = "6")]
    pub status: String,
    #[prost(bool, tag = "7")]
    pub is_hidden: bool,
    #[prost(bool, tag = "8")]
    pub is_outright: bool,
}

/// Sport codes used by the BetBoom line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetboomSport {
    Football,
    Hockey,
    Basketball,
    Tennis,
    Volleyball,
    Handball,
    TableTennis,
    Esports,
    Unknown(u32),
}

impl BetboomSport {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => BetboomSport::Football,
            2 => BetboomSport::Hockey,
            3 => BetboomSport::Basketball,
            4 => BetboomSport::Tennis,
            5 => BetboomSport::Volleyball,
            6 => BetboomSport::Handball,
            7 => BetboomSport::TableTennis,
            8 => BetboomSport::Esports,
            other => BetboomSport::Unknown(other),
        }
    }

    pub fn sport_type(&self) -> Option<SportType> {
        match self {
            BetboomSport::Football => Some(SportType::Football),
            BetboomSport::Hockey => Some(SportType::Hockey),
            BetboomSport::Basketball => Some(SportType::Basketball),
            BetboomSport::Tennis => Some(SportType::Tennis),
            BetboomSport::Volleyball => Some(SportType::Volleyball),
            BetboomSport::Handball => Some(SportType::Handball),
            BetboomSport::TableTennis => Some(SportType::TableTennis),
            BetboomSport::Esports => Some(SportType::Esports),
            BetboomSport::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BetboomTournaments {
    pub by_id: HashMap<u32, (BetboomSport, String)>,
}

pub struct BetboomAdapter {
    feed: Arc<dyn FeedSource>,
}

impl BetboomAdapter {
    pub fn new(feed: Arc<dyn FeedSource>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl SourceAdapter for BetboomAdapter {
    type Record = BetboomMatch;
    type Aux = BetboomTournaments;

    fn bookmaker(&self) -> Bookmaker {
        Bookmaker::Betboom
    }

    async fn fetch(&self) -> Result<RawPayload, EventError> {
        self.feed
            .fetch()
            .await
            .map_err(|e| EventError::fetch(self.bookmaker(), format!("{:#}", e)))
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParsedFeed<BetboomMatch, BetboomTournaments>, EventError> {
        let snapshot = LineSnapshot::decode(payload.body.clone())
            .map_err(|e| EventError::parse(self.bookmaker(), e.to_string()))?;

        let by_id = snapshot
            .tournaments
            .into_iter()
            .map(|t| (t.id, (BetboomSport::from_code(t.sport_code), t.name)))
            .collect();

        Ok(ParsedFeed {
            records: snapshot.matches,
            aux: BetboomTournaments { by_id },
        })
    }

    fn is_valid_record(&self, record: &BetboomMatch) -> bool {
        !record.is_hidden
            && !record.is_outright
            && record.id != 0
            && !record.home.trim().is_empty()
            && !record.away.trim().is_empty()
    }

    fn to_event(&self, record: &BetboomMatch, aux: &BetboomTournaments) -> Result<Option<SportEvent>, EventError> {
        let Some((sport, tournament)) = aux.by_id.get(&record.tournament_id) else {
            return Ok(None);
        };
        let Some(sport) = sport.sport_type() else {
            return Ok(None);
        };

        SportEvent::create(
            self.bookmaker(),
            record.id.to_string(),
            record.start_ts,
            tournament.clone(),
            record.home.clone(),
            record.away.clone(),
            sport,
            &record.status,
        )
        .map(Some)
    }
}
