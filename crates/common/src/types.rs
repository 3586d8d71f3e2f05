use crate::errors::EventError;
use crate::identity::{build_key, IdentityKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bookmaker, i.e. one external odds feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bookmaker {
    Winline,
    Ggbet,
    Parimatch,
    Fonbet,
    OneWin,
    Betboom,
    Betcity,
    Leon,
    Ligastavok,
    Melbet,
    Olimpbet,
    Tenisi,
}

impl Bookmaker {
    pub const ALL: [Bookmaker; 12] = [
        Bookmaker::Winline,
        Bookmaker::Ggbet,
        Bookmaker::Parimatch,
        Bookmaker::Fonbet,
        Bookmaker::OneWin,
        Bookmaker::Betboom,
        Bookmaker::Betcity,
        Bookmaker::Leon,
        Bookmaker::Ligastavok,
        Bookmaker::Melbet,
        Bookmaker::Olimpbet,
        Bookmaker::Tenisi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bookmaker::Winline => "winline",
            Bookmaker::Ggbet => "ggbet",
            Bookmaker::Parimatch => "parimatch",
            Bookmaker::Fonbet => "fonbet",
            Bookmaker::OneWin => "one_win",
            Bookmaker::Betboom => "betboom",
            Bookmaker::Betcity => "betcity",
            Bookmaker::Leon => "leon",
            Bookmaker::Ligastavok => "ligastavok",
            Bookmaker::Melbet => "melbet",
            Bookmaker::Olimpbet => "olimpbet",
            Bookmaker::Tenisi => "tenisi",
        }
    }
}

impl fmt::Display for Bookmaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown bookmaker: {0}")]
pub struct UnknownBookmaker(pub String);

impl FromStr for Bookmaker {
    type Err = UnknownBookmaker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Bookmaker::ALL
            .into_iter()
            .find(|b| b.as_str() == wanted || b.as_str().replace('_', "") == wanted)
            .ok_or_else(|| UnknownBookmaker(s.to_string()))
    }
}

/// Canonical sport taxonomy. Adapters map their own sport codes onto it or skip the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportType {
    Football,
    Basketball,
    Tennis,
    Hockey,
    Esports,
    TableTennis,
    Volleyball,
    Handball,
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SportType::Football => "football",
            SportType::Basketball => "basketball",
            SportType::Tennis => "tennis",
            SportType::Hockey => "hockey",
            SportType::Esports => "esports",
            SportType::TableTennis => "table_tennis",
            SportType::Volleyball => "volleyball",
            SportType::Handball => "handball",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a match as reported by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Prematch,
    Live,
    Finished,
}

impl EventStatus {
    /// Total mapping from a feed's status string. Anything unrecognised is `Prematch`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "prematch" => EventStatus::Prematch,
            "live" => EventStatus::Live,
            "finished" => EventStatus::Finished,
            _ => EventStatus::Prematch,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Prematch => write!(f, "prematch"),
            EventStatus::Live => write!(f, "live"),
            EventStatus::Finished => write!(f, "finished"),
        }
    }
}

/// One bookmaker's view of a real-world match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportEvent {
    pub bookmaker: Bookmaker,
    /// Source-native event id; opaque.
    pub source_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub sport: SportType,
    pub tournament: String,
    pub status: EventStatus,
    /// Participant names exactly as the feed reported them.
    pub team1: String,
    pub team2: String,
}

impl SportEvent {
    /// Builds an event from feed values. `start_time_unix` is in seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        bookmaker: Bookmaker,
        source_id: impl Into<String>,
        start_time_unix: i64,
        tournament: impl Into<String>,
        team1: impl Into<String>,
        team2: impl Into<String>,
        sport: SportType,
        raw_status: &str,
    ) -> Result<Self, EventError> {
        let source_id = source_id.into();
        let start_time = DateTime::<Utc>::from_timestamp(start_time_unix, 0).ok_or_else(|| {
            EventError::MalformedEvent(format!(
                "{bookmaker} event {source_id}: start time {start_time_unix} out of range"
            ))
        })?;
        let team1 = team1.into();
        let team2 = team2.into();

        Ok(SportEvent {
            bookmaker,
            source_id,
            name: format!("{} vs {}", team1, team2),
            start_time,
            sport,
            tournament: tournament.into(),
            status: EventStatus::from_raw(raw_status),
            team1,
            team2,
        })
    }

    pub fn is_started(&self) -> bool {
        self.is_started_at(Utc::now())
    }

    pub fn is_started_at(&self, now: DateTime<Utc>) -> bool {
        now > self.start_time
    }

    pub fn identity_key(&self) -> Result<IdentityKey, EventError> {
        build_key(&self.team1, &self.team2)
    }
}

impl fmt::Display for SportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}#{}] {} ({}, {}, {})",
            self.bookmaker, self.source_id, self.name, self.sport, self.tournament, self.status
        )
    }
}
