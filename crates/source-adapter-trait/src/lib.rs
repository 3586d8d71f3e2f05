//! Contract every bookmaker adapter implements.
//!
//! An adapter is a small capability set: fetch a payload, split it into raw
//! records, filter them, and turn each survivor into a [`SportEvent`]. The
//! cycle orchestration (registry updates, missing-event tracking) lives in the
//! poller and is shared by all adapters.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{Bookmaker, EventError, SportEvent};

/// Body of one feed response, as fetched.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub body: Bytes,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A parsed payload: per-event records plus whatever lookup data the feed ships
/// alongside them (sport and tournament taxonomy, usually).
#[derive(Debug, Clone)]
pub struct ParsedFeed<R, A> {
    pub records: Vec<R>,
    pub aux: A,
}

/// Abstracts where a payload comes from, allowing for live or prerecorded feeds.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Performs one request/response cycle and returns the body.
    async fn fetch(&self) -> Result<RawPayload>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// One raw event record as the feed ships it.
    type Record: Send + Sync;
    /// Auxiliary lookup data shared by all records of a payload.
    type Aux: Send + Sync;

    /// The bookmaker this adapter polls.
    fn bookmaker(&self) -> Bookmaker;

    /// Fetches one payload. Fails with [`EventError::Fetch`].
    async fn fetch(&self) -> Result<RawPayload, EventError>;

    /// Splits a payload into records. Fails with [`EventError::Parse`] when the
    /// payload does not have the expected structure.
    fn parse(&self, payload: &RawPayload)
        -> Result<ParsedFeed<Self::Record, Self::Aux>, EventError>;

    /// Bookmaker-specific filter for non-matches, hidden events and records
    /// missing mandatory fields.
    fn is_valid_record(&self, record: &Self::Record) -> bool;

    /// Converts a valid record. `Ok(None)` means the sport is not supported and
    /// the record is skipped; that is not an error.
    fn to_event(
        &self,
        record: &Self::Record,
        aux: &Self::Aux,
    ) -> Result<Option<SportEvent>, EventError>;
}
