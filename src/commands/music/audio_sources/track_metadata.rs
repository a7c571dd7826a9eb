//! Defines the `Track` struct, the resolved and playable unit that flows from the resolver
//! through the guild queue into the playback controller.

use std::time::Duration;

/// Title used when the provider does not report one.
pub const UNTITLED: &str = "untitled";

/// A single resolved, playable audio item.
///
/// Tracks are immutable once resolved: fields are only readable, and the `with_*` builders
/// consume the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    stream_url: String,
    title: String,
    webpage_url: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requested_by: Option<String>,
}

impl Track {
    /// A track with only the fields every provider must supply.
    pub fn new(stream_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            title: title.into(),
            webpage_url: None,
            duration: None,
            thumbnail: None,
            requested_by: None,
        }
    }

    /// The direct audio stream URL handed to the audio driver.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Display title as reported by the provider.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The human-facing page for the track, if known.
    pub fn webpage_url(&self) -> Option<&str> {
        self.webpage_url.as_deref()
    }

    /// Length of the track, when the provider reports one. Live streams have none.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Thumbnail image URL for embeds.
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    /// Name of the user who asked for the track.
    pub fn requested_by(&self) -> Option<&str> {
        self.requested_by.as_deref()
    }

    /// Set the page the track was found on.
    pub fn with_webpage_url(mut self, webpage_url: impl Into<String>) -> Self {
        self.webpage_url = Some(webpage_url.into());
        self
    }

    /// Set the track length.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the thumbnail image URL.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Record who requested the track.
    pub fn with_requester(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = Some(requested_by.into());
        self
    }

    /// Markdown link to the track page, falling back to the bare title.
    pub fn display_link(&self) -> String {
        match self.webpage_url() {
            Some(url) => format!("[{}]({})", self.title, url),
            None => format!("**{}**", self.title),
        }
    }
}
