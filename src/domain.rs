use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RipError;

/// Opaque catalog key of a channel. The catalog renders these as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = RipError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_hexdigit());
        if !is_valid {
            return Err(RipError::InvalidChannelId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for ChannelId {
    type Error = RipError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub id: ChannelId,
}

/// One piece of media seen on one channel. Either link identifies it in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub channel: ChannelId,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub year: i32,
    /// Seconds.
    pub duration: u32,
    pub primary_link: String,
    pub secondary_link: String,
}

impl Track {
    pub fn link(&self, kind: LinkKind) -> &str {
        match kind {
            LinkKind::Primary => &self.primary_link,
            LinkKind::Secondary => &self.secondary_link,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Primary,
    Secondary,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Primary => write!(f, "primary"),
            LinkKind::Secondary => write!(f, "secondary"),
        }
    }
}
