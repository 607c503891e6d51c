use crate::error::{Error, Result};
use crate::types::*;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path};

/// Default delay before a page reopens a dropped sync socket
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
pub const DEFAULT_TITLE: &str = "Album Player";

/// Raw TOML structure, matching media.toml exactly
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    player: Option<RawPlayerSettings>,
    #[serde(default)]
    item: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawPlayerSettings {
    title: Option<String>,
    default_media: Option<String>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    media_type: String,
    video_url: String,
    title: Option<String>,
    poster: Option<String>,
}

/// Page-level settings shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub title: String,
    pub default_media: MediaFilter,
    pub reconnect_delay_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            default_media: MediaFilter::default(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

/// Parsed media manifest
#[derive(Debug, Clone, Default)]
pub struct MediaManifest {
    pub player: PlayerSettings,
    pub items: Vec<AlbumItem>,
}

impl MediaManifest {
    /// Items whose type is in `filter`, in manifest order
    pub fn select(&self, filter: &MediaFilter) -> Vec<AlbumItem> {
        self.items
            .iter()
            .filter(|item| filter.contains(item.media_type))
            .cloned()
            .collect()
    }

    pub fn count(&self, media_type: MediaType) -> usize {
        self.items
            .iter()
            .filter(|item| item.media_type == media_type)
            .count()
    }
}

/// Parse media.toml from a file path
pub fn parse_manifest<P: AsRef<Path>>(path: P) -> Result<MediaManifest> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

/// Parse media.toml from a string
pub fn parse_manifest_str(content: &str) -> Result<MediaManifest> {
    let raw: RawManifest = toml::from_str(content)?;

    let player = match raw.player {
        Some(p) => PlayerSettings {
            title: p.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            default_media: match p.default_media {
                Some(list) => MediaFilter::parse(&list)
                    .map_err(|e| Error::ConfigParse(format!("player.default_media: {}", e)))?,
                None => MediaFilter::default(),
            },
            reconnect_delay_ms: p.reconnect_delay_ms.unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
        },
        None => PlayerSettings::default(),
    };

    let items: Result<Vec<AlbumItem>> = raw
        .item
        .into_iter()
        .map(|i| {
            let media_type: MediaType = i
                .media_type
                .parse()
                .map_err(|e| Error::ConfigParse(format!("item.media_type: {}", e)))?;

            let poster = match i.poster {
                Some(p) => Some(validate_location(&p, "item.poster")?),
                None => None,
            };

            Ok(AlbumItem {
                media_type,
                video_url: validate_location(&i.video_url, "item.video_url")?,
                title: i.title,
                poster,
            })
        })
        .collect();

    Ok(MediaManifest {
        player,
        items: items?,
    })
}

/// Accept an http(s) URL verbatim, or a relative path that stays inside the
/// media directory.
fn validate_location(value: &str, field_name: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::ConfigParse(format!(
            "Empty location in '{}' field",
            field_name
        )));
    }

    if is_remote_url(value) {
        return Ok(value.to_string());
    }

    let path = Path::new(value);

    if path.is_absolute() || value.starts_with('/') {
        return Err(Error::ConfigParse(format!(
            "Absolute paths not allowed in '{}': '{}'. Use relative paths only.",
            field_name, value
        )));
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(Error::ConfigParse(format!(
            "Parent directory references (..) not allowed in '{}': '{}'",
            field_name, value
        )));
    }

    Ok(value.to_string())
}
