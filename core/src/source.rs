//! Video source classification.
//!
//! Every URL maps to exactly one [`VideoKind`]. Anything that is not a
//! recognised YouTube, Tubi or Vimeo link is treated as a direct media URL and
//! handed to the native player, so a bad link shows up later as a load error
//! rather than a classification error.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::media::BackendKind;

static TUBI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"tubitv\.com/(?:movies|tv-shows)/(\d+)").expect("tubi pattern compiles")
});

static VIMEO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"vimeo\.com/(?:video/)?(\d+)").expect("vimeo pattern compiles")
});

const DIRECT_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".mov", ".avi"];

/// Hosts that serve plain media files we can hand to the native player
const DIRECT_HOSTS: &[&str] = &[
    "archive.org",
    "commondatastorage.googleapis.com",
    "cloudfront.net",
    "akamaihd.net",
    "storage.googleapis.com",
];

/// What a video URL points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VideoKind {
    /// Direct file or stream (also archive.org and known CDNs)
    Native,
    /// YouTube video id
    YouTube { id: String },
    /// Tubi numeric content id
    Tubi { id: String },
    /// Vimeo numeric video id
    Vimeo { id: String },
}

impl VideoKind {
    /// The adapter that plays this kind. Vimeo plays through its embeddable
    /// URL on the direct adapter.
    pub fn backend(&self) -> BackendKind {
        match self {
            VideoKind::Native | VideoKind::Vimeo { .. } => BackendKind::Native,
            VideoKind::YouTube { .. } => BackendKind::YouTube,
            VideoKind::Tubi { .. } => BackendKind::Tubi,
        }
    }
}

impl fmt::Display for VideoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoKind::Native => write!(f, "native"),
            VideoKind::YouTube { id } => write!(f, "youtube ({})", id),
            VideoKind::Tubi { id } => write!(f, "tubi ({})", id),
            VideoKind::Vimeo { id } => write!(f, "vimeo ({})", id),
        }
    }
}

/// The video a party is watching. Set once when the host picks a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    url: String,
}

impl VideoSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Always derived from the URL, never cached
    pub fn kind(&self) -> VideoKind {
        classify(&self.url)
    }

    /// URL the direct adapter should load
    pub fn playback_url(&self) -> String {
        match self.kind() {
            VideoKind::Vimeo { id } => vimeo_embed_url(&id),
            _ => self.url.clone(),
        }
    }
}

/// Classify a URL. Total: unmatched input is [`VideoKind::Native`].
pub fn classify(url: &str) -> VideoKind {
    let url = url.trim();

    if is_youtube_url(url) {
        if let Some(id) = extract_youtube_id(url) {
            return VideoKind::YouTube { id };
        }
    }

    if let Some(id) = extract_tubi_id(url) {
        return VideoKind::Tubi { id };
    }

    if let Some(id) = extract_vimeo_id(url) {
        return VideoKind::Vimeo { id };
    }

    VideoKind::Native
}

/// Check if a URL is a YouTube URL
pub fn is_youtube_url(url: &str) -> bool {
    url.contains("youtube.com/watch")
        || url.contains("youtu.be/")
        || url.contains("youtube.com/embed/")
}

/// Extract the YouTube video id from a watch, short or embed URL
pub fn extract_youtube_id(url: &str) -> Option<String> {
    // watch?v=ID, also when v is not the first query parameter
    if let Some(pos) = url.find("youtube.com/watch") {
        let rest = &url[pos + "youtube.com/watch".len()..];
        let query = rest.strip_prefix('?')?;
        let query = query.split('#').next().unwrap_or(query);
        return query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .and_then(take_id_token);
    }

    for prefix in ["youtu.be/", "youtube.com/embed/"] {
        if let Some(pos) = url.find(prefix) {
            return take_id_token(&url[pos + prefix.len()..]);
        }
    }

    None
}

/// Token up to the next `&`, `?`, `#` or `/`
fn take_id_token(rest: &str) -> Option<String> {
    let end = rest.find(&['&', '#', '?', '/'][..]).unwrap_or(rest.len());
    let id = &rest[..end];
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Numeric content id from a tubitv.com movie or series URL
pub fn extract_tubi_id(url: &str) -> Option<String> {
    TUBI_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Numeric id from a vimeo.com URL
pub fn extract_vimeo_id(url: &str) -> Option<String> {
    VIMEO_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn vimeo_embed_url(id: &str) -> String {
    format!("https://player.vimeo.com/video/{}", id)
}

/// Whether the URL is a recognised direct media file, archive.org item or
/// CDN-hosted file. Purely informational: [`classify`] sends everything
/// unrecognised to the native player regardless.
pub fn is_direct_media_url(url: &str) -> bool {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url).to_ascii_lowercase();
    if DIRECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }

    let host = path
        .split("://")
        .nth(1)
        .unwrap_or(&path)
        .split('/')
        .next()
        .unwrap_or_default();
    DIRECT_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_short_and_watch_urls() {
        assert_eq!(
            classify("https://youtu.be/abc123"),
            VideoKind::YouTube { id: "abc123".into() }
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc123&t=5"),
            VideoKind::YouTube { id: "abc123".into() }
        );
    }

    #[test]
    fn test_youtube_embed_and_param_order() {
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1"),
            Some("dQw4w9WgXcQ".into())
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?feature=share&v=xyz_-9#t=3"),
            Some("xyz_-9".into())
        );
    }

    #[test]
    fn test_youtube_without_id_falls_back_to_native() {
        assert_eq!(classify("https://www.youtube.com/watch?list=abc"), VideoKind::Native);
        assert_eq!(classify("https://youtu.be/"), VideoKind::Native);
    }

    #[test]
    fn test_tubi_movie_and_series() {
        assert_eq!(
            classify("https://tubitv.com/movies/100098"),
            VideoKind::Tubi { id: "100098".into() }
        );
        assert_eq!(
            classify("https://tubitv.com/tv-shows/200042/s01-e01"),
            VideoKind::Tubi { id: "200042".into() }
        );
        assert_eq!(classify("https://tubitv.com/home"), VideoKind::Native);
    }

    #[test]
    fn test_vimeo_normalizes_to_embed() {
        let source = VideoSource::new("https://vimeo.com/76979871");
        assert_eq!(source.kind(), VideoKind::Vimeo { id: "76979871".into() });
        assert_eq!(source.playback_url(), "https://player.vimeo.com/video/76979871");
        assert_eq!(source.kind().backend(), BackendKind::Native);
    }

    #[test]
    fn test_direct_and_unknown_urls_are_native() {
        for url in [
            "https://archive.org/download/BigBuckBunny/big_buck_bunny.mp4",
            "https://cdn.example.com/live/master.m3u8?token=1",
            "file:///tmp/clip.mov",
            "https://example.com/watch/something",
            "",
            "not a url at all",
        ] {
            assert_eq!(classify(url), VideoKind::Native, "{}", url);
        }
    }

    #[test]
    fn test_direct_media_detection() {
        assert!(is_direct_media_url("https://cdn.example.com/a/b.MP4?x=1"));
        assert!(is_direct_media_url("https://ia800300.us.archive.org/1/items/x/y"));
        assert!(is_direct_media_url("https://d111.cloudfront.net/v/1"));
        assert!(!is_direct_media_url("https://example.com/page"));
    }

    #[test]
    fn test_kind_follows_url() {
        let source = VideoSource::new("  https://youtu.be/abc123  ");
        assert_eq!(source.url(), "https://youtu.be/abc123");
        assert_eq!(source.kind().backend(), BackendKind::YouTube);
    }
}
