//! Timeline owner identifiers

use serde::{Deserialize, Serialize};

/// Which feed a timeline shows
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum TimelineKind {
    /// Home timeline of the signed-in account
    #[default]
    Home,
    /// Instance-local public timeline
    Local,
    /// Federated public timeline
    Federated,
    /// Posts carrying a hashtag (without the leading '#')
    Hashtag(String),
    /// Posts by one account (network account id)
    Account(String),
}

impl TimelineKind {
    /// Parse from string ("home", "local", "federated", "#tag", "@account-id")
    pub fn from_str(s: &str) -> Option<Self> {
        if let Some(tag) = s.strip_prefix('#') {
            return (!tag.is_empty()).then(|| Self::Hashtag(tag.to_string()));
        }
        if let Some(account) = s.strip_prefix('@') {
            return (!account.is_empty()).then(|| Self::Account(account.to_string()));
        }
        match s.to_lowercase().as_str() {
            "home" => Some(Self::Home),
            "local" => Some(Self::Local),
            "federated" | "public" => Some(Self::Federated),
            _ => None,
        }
    }

    /// Get the display name
    pub fn name(&self) -> String {
        match self {
            Self::Home => "home".to_string(),
            Self::Local => "local".to_string(),
            Self::Federated => "federated".to_string(),
            Self::Hashtag(tag) => format!("#{tag}"),
            Self::Account(id) => format!("@{id}"),
        }
    }
}

impl std::fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identifies one timeline owner: a feed as seen from one instance/account.
///
/// Each key gets its own paginator and its own cached list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineKey {
    /// Instance the feed comes from (e.g. "mastodon.social")
    pub instance: String,
    /// Feed kind
    pub kind: TimelineKind,
}

impl TimelineKey {
    /// Create a key
    pub fn new(instance: impl Into<String>, kind: TimelineKind) -> Self {
        Self {
            instance: instance.into(),
            kind,
        }
    }

    /// Stable string form used as the cache key
    pub fn cache_key(&self) -> String {
        let instance = self
            .instance
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("{}/{}", instance, self.kind.name())
    }
}

impl std::fmt::Display for TimelineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cache_key())
    }
}
