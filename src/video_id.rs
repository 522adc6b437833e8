// Video identifier extraction
//
// Turns any of the URL shapes people paste (short links, watch pages, embeds,
// shorts) into the 11-character token the hosting site uses. Pure string
// parsing; no network access.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Length of a canonical video identifier
pub const VIDEO_ID_LEN: usize = 11;

const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

static FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:v=|/)([0-9A-Za-z_-]{11})(?:[?&#/]|$)",
        r"(?:embed/|youtu\.be/)([0-9A-Za-z_-]{11})",
        r"^([0-9A-Za-z_-]{11})$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("fallback pattern is valid"))
    .collect()
});

/// A validated video identifier together with the URL it came from.
/// Only `parse`/`extract_id` build one, so the id always has the expected format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    id: String,
    url: String,
}

impl VideoReference {
    /// Extract the video identifier from a URL.
    ///
    /// Structured parsing is tried first. A string that is not a URL on a
    /// known host falls back to a small set of patterns looking for an
    /// 11-character token; a known host with an unsupported path (channels,
    /// playlists) is rejected outright. Returns `None` rather than guessing.
    pub fn parse(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return None;
        }

        let id = match parse_structured(trimmed) {
            Structured::Found(id) => id,
            Structured::Rejected => return None,
            Structured::Unknown => match_fallback(trimmed)?,
        };

        is_valid_video_id(&id).then(|| Self {
            id,
            url: trimmed.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URL as the caller supplied it, trimmed
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Canonical watch-page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Check the identifier format the hosting site expects
pub fn is_valid_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Shorthand for [`VideoReference::parse`]
pub fn extract_id(url: &str) -> Option<VideoReference> {
    VideoReference::parse(url)
}

enum Structured {
    /// Known host and path shape with a valid id
    Found(String),
    /// Known host, but the path does not name a video
    Rejected,
    /// Not a URL, or not a host we recognize
    Unknown,
}

fn parse_structured(input: &str) -> Structured {
    let Ok(parsed) = Url::parse(input) else {
        return Structured::Unknown;
    };
    let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
        return Structured::Unknown;
    };

    let candidate = if host == "youtu.be" || host == "www.youtu.be" {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next().map(str::to_string))
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        let mut segments = match parsed.path_segments() {
            Some(segments) => segments,
            None => return Structured::Rejected,
        };
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                segments.next().map(str::to_string)
            }
            _ => None,
        }
    } else {
        return Structured::Unknown;
    };

    match candidate.filter(|id| is_valid_video_id(id)) {
        Some(id) => Structured::Found(id),
        None => Structured::Rejected,
    }
}

fn match_fallback(input: &str) -> Option<String> {
    FALLBACK_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(input)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}
