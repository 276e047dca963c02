use std::fmt;

use chrono::{DateTime, Utc};

/// Default number of feed entries kept live by a subscription.
pub const DEFAULT_FEED_LIMIT: usize = 100;

/// Opaque user identifier assigned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Opaque document identifier assigned by the realtime store on append.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identity vendors the backend brokers sign-in flows for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityProvider {
    Google,
    Github,
}

impl IdentityProvider {
    pub const ALL: [IdentityProvider; 2] = [IdentityProvider::Google, IdentityProvider::Github];

    /// Wire identifier understood by the identity service.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Github => "github.com",
        }
    }

    /// Human-readable vendor name for buttons and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Github => "GitHub",
        }
    }

    /// Maps a wire identifier back to a provider, if recognized.
    pub fn from_id(raw: &str) -> Option<Self> {
        match raw {
            "google.com" => Some(Self::Google),
            "github.com" => Some(Self::Github),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.label())
    }
}

/// Authenticated identity of the current user.
///
/// Produced by a completed sign-in flow and passed down explicitly; nothing
/// in this workspace reads it from ambient global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: UserId,
    pub id_token: String,
    pub photo_url: Option<String>,
    pub provider: IdentityProvider,
}

/// One stored chat entry as read from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub text: String,
    pub author_uid: UserId,
    pub author_photo_url: Option<String>,
    /// Assigned by the backend at append time; the feed ordering key.
    pub created_at: DateTime<Utc>,
}

/// Append payload. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub author_uid: UserId,
    pub author_photo_url: Option<String>,
}

/// Live query shape for a feed subscription.
///
/// The collection name is part of the static backend configuration; the
/// query only carries the size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FEED_LIMIT,
        }
    }
}
