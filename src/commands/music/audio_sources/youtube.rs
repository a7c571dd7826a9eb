//! Resolves free-text queries to a single YouTube track using the `yt-dlp` command-line tool.

use serde::Deserialize;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{AudioSourceResult, SEARCH_PREFIX, SearchProvider, Track, track_metadata::UNTITLED};
use crate::commands::music::utils::music_manager::MusicError;

/// Best audio-only format at or under 96 kbps, falling back to the best audio available.
pub const AUDIO_FORMAT: &str = "bestaudio[abr<=96]/bestaudio";

/// `SearchProvider` backed by the `yt-dlp` binary.
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the `yt-dlp` argument list for a prefixed search query.
    pub fn arguments(query: &str) -> Vec<String> {
        [
            "-J",            // Dump a single JSON document, entries included
            "--format",
            AUDIO_FORMAT,
            "--no-playlist", // Never expand a playlist URL
            "--extractor-args",
            "youtube:skip=dash,hls", // Plain progressive streams only
            "--no-warnings",
            query,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl SearchProvider for YtDlp {
    fn search(&self, query: &str) -> AudioSourceResult<Vec<u8>> {
        debug!("Running {} for query: {}", self.program, query);

        let output = Command::new(&self.program)
            .args(Self::arguments(query))
            .output()
            .map_err(|e| MusicError::Provider(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::Provider(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    // yt-dlp writes `null` for entries it could not extract
    entries: Option<Vec<Option<SearchEntry>>>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    url: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

impl SearchEntry {
    fn into_track(self, stream_url: String) -> Track {
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let mut track = Track::new(stream_url, title);
        if let Some(page) = self.webpage_url {
            track = track.with_webpage_url(page);
        }
        if let Some(seconds) = self.duration.filter(|s| s.is_finite() && *s >= 0.0) {
            track = track.with_duration(Duration::from_secs_f64(seconds));
        }
        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        track
    }
}

/// Turn the provider's JSON document into the first playable track.
///
/// Entries without a stream URL are skipped; if none remain the search has no results.
pub fn parse_search_results(raw: &[u8], query: &str) -> AudioSourceResult<Track> {
    let results: SearchResults = serde_json::from_slice(raw)
        .map_err(|e| MusicError::Provider(format!("Failed to parse search results: {}", e)))?;

    let (stream_url, entry) = results
        .entries
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .find_map(|mut entry| entry.url.take().map(|url| (url, entry)))
        .ok_or_else(|| MusicError::NoResults(query.to_string()))?;

    Url::parse(&stream_url).map_err(|e| {
        MusicError::Provider(format!("Provider returned an invalid stream URL: {}", e))
    })?;

    Ok(entry.into_track(stream_url))
}

/// The Track Resolver: runs the search provider on a blocking worker and picks the top result.
#[derive(Clone)]
pub struct YoutubeResolver {
    provider: Arc<dyn SearchProvider>,
}

impl YoutubeResolver {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Resolve a free-text query to one playable track.
    ///
    /// Fails with [`MusicError::NoResults`] when nothing matched and [`MusicError::Provider`]
    /// when the provider itself failed. Never touches any queue.
    pub async fn resolve(&self, query: &str) -> AudioSourceResult<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::NoResults(String::new()));
        }

        info!("Resolving search query: {}", query);
        let search = format!("{}{}", SEARCH_PREFIX, query);
        let provider = Arc::clone(&self.provider);

        let raw = tokio::task::spawn_blocking(move || provider.search(&search))
            .await
            .map_err(|e| MusicError::Provider(format!("Search worker failed: {}", e)))??;

        let track = parse_search_results(&raw, query)?;
        info!("Resolved '{}' to '{}'", query, track.title());
        Ok(track)
    }
}
