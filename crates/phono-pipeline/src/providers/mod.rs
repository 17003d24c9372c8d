//! Rate-limited external metadata provider clients.
//!
//! Three providers, one client each, queried in the cascade order
//! TheAudioDB -> MusicBrainz -> Last.fm. Every client owns a global
//! per-provider rate limiter and durable lookup caches, and degrades to
//! empty results instead of surfacing errors.

pub mod audiodb;
pub mod lastfm;
pub mod musicbrainz;
pub mod resilience;
pub mod titles;

pub use audiodb::AudioDbClient;
pub use lastfm::LastFmClient;
pub use musicbrainz::MusicBrainzClient;
pub use resilience::RateLimiter;
