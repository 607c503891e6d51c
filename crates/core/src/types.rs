use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a slide belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Album,
    Phone,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Album => "album",
            MediaType::Phone => "phone",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "album" => Ok(MediaType::Album),
            "phone" => Ok(MediaType::Phone),
            other => Err(Error::InvalidData(format!(
                "Unknown media type '{}', expected 'album' or 'phone'",
                other
            ))),
        }
    }
}

/// Ordered set of media types selected by the `media` URL parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFilter(Vec<MediaType>);

impl MediaFilter {
    /// Parse a comma-separated list such as `album,phone`.
    ///
    /// An empty list falls back to `album`.
    pub fn parse(list: &str) -> Result<Self> {
        let mut types = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let media_type: MediaType = name.parse()?;
            if !types.contains(&media_type) {
                types.push(media_type);
            }
        }

        if types.is_empty() {
            return Ok(Self::default());
        }

        Ok(MediaFilter(types))
    }

    pub fn contains(&self, media_type: MediaType) -> bool {
        self.0.contains(&media_type)
    }

    pub fn types(&self) -> &[MediaType] {
        &self.0
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        MediaFilter(vec![MediaType::Album])
    }
}

impl fmt::Display for MediaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(MediaType::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// One slide's worth of media, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumItem {
    pub media_type: MediaType,
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

impl AlbumItem {
    /// Whether the video lives on another host rather than in the media directory
    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.video_url)
    }
}

pub fn is_remote_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Session role, fixed for the lifetime of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    #[default]
    Slave,
}

impl Role {
    pub fn is_master(&self) -> bool {
        matches!(self, Role::Master)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => f.write_str("master"),
            Role::Slave => f.write_str("slave"),
        }
    }
}

/// Parameters a page derives from its URL at startup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionParams {
    pub role: Role,
    pub media: MediaFilter,
}

impl SessionParams {
    /// Build params from already-decoded query pairs.
    ///
    /// `master` with an empty value, `true`, `1`, `yes` or `on` selects the
    /// master role. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = SessionParams::default();

        for (key, value) in pairs {
            match key.as_ref() {
                "master" => params.role = parse_master_flag(value.as_ref()),
                "media" => params.media = MediaFilter::parse(value.as_ref())?,
                _ => {}
            }
        }

        Ok(params)
    }

    /// Parse a raw URL query string such as `master&media=album%2Cphone`
    pub fn from_query(query: &str) -> Result<Self> {
        Self::from_query_or(query, &MediaFilter::default())
    }

    /// Like [`SessionParams::from_query`], using `default_media` when the
    /// query has no `media` key
    pub fn from_query_or(query: &str, default_media: &MediaFilter) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| Error::InvalidData(format!("Invalid query string '{}': {}", query, e)))?;

        let mut params = Self::from_pairs(pairs.iter().map(|(k, v)| (k, v)))?;
        if !pairs.iter().any(|(k, _)| k == "media") {
            params.media = default_media.clone();
        }
        Ok(params)
    }
}

fn parse_master_flag(value: &str) -> Role {
    match value.trim().to_lowercase().as_str() {
        "" | "true" | "1" | "yes" | "on" => Role::Master,
        _ => Role::Slave,
    }
}

/// Whether the session's videos are meant to be running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
}

impl PlaybackState {
    pub fn toggle(&mut self) -> bool {
        self.is_playing = !self.is_playing;
        self.is_playing
    }
}
