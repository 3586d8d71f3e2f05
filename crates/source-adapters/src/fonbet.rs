//! Fonbet line feed (JSON).
//!
//! The list endpoint returns every event in one document together with the
//! sport tree:
//!
//! ```json
//! {
//!   "sports": [
//!     { "id": 1, "kind": "sport", "alias": "football", "name": "Football" },
//!     { "id": 11916, "kind": "segment", "parentId": 1, "name": "Russia. Premier League" }
//!   ],
//!   "events": [
//!     { "id": 48213390, "level": 1, "kind": 1, "sportId": 11916, "startTime": 1735689600,
//!       "team1": "Спартак", "team2": "Зенит", "place": "live" }
//!   ]
//! }
//! ```
//!
//! An event's `sportId` points at a segment (tournament), whose `parentId` is
//! the sport.
//!
//! Record policy: only top-level (`level == 1`) matches (`kind == 1`) are
//! kept; `notMatch`, `noEventView` and `place == "notActive"` records are
//! dropped, as are records without an id, a start time or both team names.
//! A record that does not decode (wrong field types) is kept as an empty
//! [`FonbetEvent`], which the record filter then rejects; it never fails the
//! whole payload.

use async_trait::async_trait;
use common::{Bookmaker, EventError, SportEvent, SportType};
use serde::Deserialize;
use source_adapter_trait::{FeedSource, ParsedFeed, RawPayload, SourceAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_URL: &str =
    "https://line-lb11.bk6bba-resources.com/ma/events/list?lang=ru&scopeMarket=1600";

/// Fonbet sport aliases this adapter knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FonbetSport {
    Football,
    Hockey,
    Tennis,
    Basketball,
    TableTennis,
    Esports,
    Other(String),
}

impl FonbetSport {
    pub fn from_alias(alias: &str) -> Self {
        match alias {
            "football" => FonbetSport::Football,
            "hockey" => FonbetSport::Hockey,
            "tennis" => FonbetSport::Tennis,
            "basketball" => FonbetSport::Basketball,
            "table-tennis" => FonbetSport::TableTennis,
            "esports" => FonbetSport::Esports,
            other => FonbetSport::Other(other.to_string()),
        }
    }

    /// `None` for sports this feed mapping does not support.
    pub fn sport_type(&self) -> Option<SportType> {
        match self {
            FonbetSport::Football => Some(SportType::Football),
            FonbetSport::Hockey => Some(SportType::Hockey),
            FonbetSport::Tennis => Some(SportType::Tennis),
            FonbetSport::Basketball => Some(SportType::Basketball),
            FonbetSport::TableTennis => Some(SportType::TableTennis),
            FonbetSport::Esports => Some(SportType::Esports),
            FonbetSport::Other(_) => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FonbetEvent {
    pub id: Option<u64>,
    pub level: Option<i64>,
    pub kind: Option<i64>,
    pub sport_id: Option<u64>,
    pub start_time: Option<i64>,
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub place: Option<String>,
    #[serde(default)]
    pub not_match: bool,
    #[serde(default)]
    pub no_event_view: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct FonbetSportEntry {
    id: u64,
    kind: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct FonbetLine {
    #[serde(default)]
    events: Vec<serde_json::Value>,
    #[serde(default)]
    sports: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FonbetTournament {
    pub sport: FonbetSport,
    pub name: String,
}

/// Segment id -> tournament, built from the `sports` section of a payload.
#[derive(Debug, Clone, Default)]
pub struct FonbetTaxonomy {
    pub tournaments: HashMap<u64, FonbetTournament>,
}

impl FonbetTaxonomy {
    fn from_entries(entries: &[FonbetSportEntry]) -> Self {
        let sports: HashMap<u64, &str> = entries
            .iter()
            .filter(|e| e.kind == "sport")
            .filter_map(|e| e.alias.as_deref().map(|alias| (e.id, alias)))
            .collect();

        let tournaments = entries
            .iter()
            .filter(|e| e.kind == "segment")
            .filter_map(|e| {
                let alias = sports.get(&e.parent_id?)?;
                Some((
                    e.id,
                    FonbetTournament {
                        sport: FonbetSport::from_alias(alias),
                        name: e.name.clone().unwrap_or_default(),
                    },
                ))
            })
            .collect();

        Self { tournaments }
    }
}

pub struct FonbetAdapter {
    feed: Arc<dyn FeedSource>,
}

impl FonbetAdapter {
    pub fn new(feed: Arc<dyn FeedSource>) -> Self {
        Self { feed }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[async_trait]
impl SourceAdapter for FonbetAdapter {
    type Record = FonbetEvent;
    type Aux = FonbetTaxonomy;

    fn bookmaker(&self) -> Bookmaker {
        Bookmaker::Fonbet
    }

    async fn fetch(&self) -> Result<RawPayload, EventError> {
        self.feed
            .fetch()
            .await
            .map_err(|e| EventError::fetch(self.bookmaker(), format!("{:#}", e)))
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParsedFeed<FonbetEvent, FonbetTaxonomy>, EventError> {
        let line: FonbetLine = serde_json::from_slice(&payload.body)
            .map_err(|e| EventError::parse(self.bookmaker(), e.to_string()))?;
        let sports: Vec<FonbetSportEntry> = line
            .sports
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        let records = line
            .events
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).unwrap_or_else(|e| {
                    debug!(bookmaker = %self.bookmaker(), error = %e, "Unreadable event record");
                    FonbetEvent::default()
                })
            })
            .collect();

        Ok(ParsedFeed {
            aux: FonbetTaxonomy::from_entries(&sports),
            records,
        })
    }

    fn is_valid_record(&self, record: &FonbetEvent) -> bool {
        record.level == Some(1)
            && record.kind == Some(1)
            && !record.not_match
            && !record.no_event_view
            && record.place.as_deref() != Some("notActive")
            && record.id.is_some()
            && record.start_time.is_some()
            && has_text(&record.team1)
            && has_text(&record.team2)
    }

    fn to_event(&self, record: &FonbetEvent, aux: &FonbetTaxonomy) -> Result<Option<SportEvent>, EventError> {
        let Some(tournament) = record.sport_id.and_then(|id| aux.tournaments.get(&id)) else {
            return Ok(None);
        };
        let Some(sport) = tournament.sport.sport_type() else {
            return Ok(None);
        };

        let id = record
            .id
            .ok_or_else(|| EventError::MalformedEvent("fonbet event without id".to_string()))?;
        let start_time = record.start_time.ok_or_else(|| {
            EventError::MalformedEvent(format!("fonbet event {} without startTime", id))
        })?;
        let status = if record.place.as_deref() == Some("live") {
            "live"
        } else {
            "prematch"
        };

        SportEvent::create(
            self.bookmaker(),
            id.to_string(),
            start_time,
            tournament.name.clone(),
            record.team1.clone().unwrap_or_default(),
            record.team2.clone().unwrap_or_default(),
            sport,
            status,
        )
        .map(Some)
    }
}
