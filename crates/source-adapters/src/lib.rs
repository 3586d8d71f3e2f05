//! Bookmaker adapters and the feed sources they poll.

pub mod betboom;
pub mod feed;
pub mod fonbet;

pub use betboom::BetboomAdapter;
pub use feed::{FileFeed, HttpFeed, StaticFeed, DEFAULT_TIMEOUT};
pub use fonbet::FonbetAdapter;

use common::Bookmaker;

/// Bookmakers that have an adapter implementation.
pub const SUPPORTED_BOOKMAKERS: [Bookmaker; 2] = [Bookmaker::Fonbet, Bookmaker::Betboom];

/// Default HTTP endpoint, for bookmakers that serve their line over HTTP.
/// BetBoom only supports recorded snapshots.
pub fn default_url(bookmaker: Bookmaker) -> Option<&'static str> {
    match bookmaker {
        Bookmaker::Fonbet => Some(fonbet::DEFAULT_URL),
        _ => None,
    }
}

pub fn is_supported(bookmaker: Bookmaker) -> bool {
    SUPPORTED_BOOKMAKERS.contains(&bookmaker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        assert!(default_url(Bookmaker::Fonbet).is_some());
        assert_eq!(default_url(Bookmaker::Betboom), None);
        assert!(is_supported(Bookmaker::Betboom));
        assert!(!is_supported(Bookmaker::Leon));
        assert_eq!(default_url(Bookmaker::Leon), None);
    }
}
