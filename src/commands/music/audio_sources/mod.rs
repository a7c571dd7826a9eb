//! This module defines how search queries are turned into playable tracks.
//! It holds the `Track` descriptor and the YouTube (`yt-dlp`) resolver.

/// Submodule defining the immutable `Track` descriptor.
pub mod track_metadata;
/// Submodule resolving free-text queries through `yt-dlp`.
pub mod youtube;

use crate::commands::music::utils::music_manager::MusicError;

pub use track_metadata::Track;

/// A specialized `Result` type for operations within the `audio_sources` module.
pub type AudioSourceResult<T> = Result<T, MusicError>;

/// The query prefix asking the provider for exactly one top search result.
pub const SEARCH_PREFIX: &str = "ytsearch1: ";

/// A blocking media-search backend.
///
/// Implementations perform network and process I/O directly, so callers must run them off the
/// async executor (see [`youtube::YoutubeResolver::resolve`]).
#[cfg_attr(test, mockall::automock)]
pub trait SearchProvider: Send + Sync {
    /// Run a search and return the provider's raw JSON document.
    fn search(&self, query: &str) -> AudioSourceResult<Vec<u8>>;
}
