use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identifier supplied by the caller on every request.
///
/// Unlike the reference stack's `UserId` (which mints its own UUIDv7), this
/// service never authenticates or creates users — multi-tenant auth is an
/// explicit non-goal. `UserId` exists purely for type safety at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Caller-assigned conversation identifier (orchestrator, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Mint a new memory id: `mem_` + 12 lowercase hex characters (§3).
///
/// Derived from a UUIDv4's first 12 hex digits — collisions are
/// astronomically unlikely and the format matches the spec's scenario suite
/// (`mem_<12hex>`).
pub fn new_memory_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("mem_{}", &raw[..12])
}

/// Mint a new scheduled-intent id: `intent_` + UUIDv4.
pub fn new_intent_id() -> String {
    format!("intent_{}", Uuid::new_v4())
}

/// Current UTC instant formatted as RFC3339 — the wire format for every
/// timestamp field in §3.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Memory retention tier (§3 `layer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryLayer {
    ShortTerm,
    Semantic,
    LongTerm,
}

impl fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryLayer::ShortTerm => "short-term",
            MemoryLayer::Semantic => "semantic",
            MemoryLayer::LongTerm => "long-term",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemoryLayer {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short-term" => Ok(Self::ShortTerm),
            "semantic" => Ok(Self::Semantic),
            "long-term" => Ok(Self::LongTerm),
            other => Err(format!("unknown memory layer: {other}")),
        }
    }
}

/// Explicit (user-stated) vs implicit (inferred) memory (§3 `type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Explicit,
    Implicit,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryType::Explicit => write!(f, "explicit"),
            MemoryType::Implicit => write!(f, "implicit"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// How a profile field/source was acquired (§3 `profile_sources.source_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Explicit,
    Implicit,
    Inferred,
}

impl SourceType {
    /// Explicitness component weight from §4.5.
    pub fn explicitness_score(&self) -> f64 {
        match self {
            SourceType::Explicit => 1.0,
            SourceType::Implicit => 0.7,
            SourceType::Inferred => 0.4,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Explicit => write!(f, "explicit"),
            SourceType::Implicit => write!(f, "implicit"),
            SourceType::Inferred => write!(f, "inferred"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            "inferred" => Ok(Self::Inferred),
            other => Err(format!("unknown source type: {other}")),
        }
    }
}

/// Profile field category — fixed schema of 5 (§3: 25 fields total for MVP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    Basics,
    Preferences,
    Goals,
    Interests,
    Background,
}

impl ProfileCategory {
    pub const ALL: [ProfileCategory; 5] = [
        ProfileCategory::Basics,
        ProfileCategory::Preferences,
        ProfileCategory::Goals,
        ProfileCategory::Interests,
        ProfileCategory::Background,
    ];
}

impl fmt::Display for ProfileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProfileCategory::Basics => "basics",
            ProfileCategory::Preferences => "preferences",
            ProfileCategory::Goals => "goals",
            ProfileCategory::Interests => "interests",
            ProfileCategory::Background => "background",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProfileCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basics" => Ok(Self::Basics),
            "preferences" => Ok(Self::Preferences),
            "goals" => Ok(Self::Goals),
            "interests" => Ok(Self::Interests),
            "background" => Ok(Self::Background),
            other => Err(format!("unknown profile category: {other}")),
        }
    }
}

/// Fixed schema size used by the completeness formula (§3): 5 fields x 5
/// categories for the MVP schema.
pub const PROFILE_FIELDS_PER_CATEGORY: usize = 5;
pub const PROFILE_TOTAL_FIELDS: usize = PROFILE_FIELDS_PER_CATEGORY * 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_id_has_expected_shape() {
        let id = new_memory_id();
        assert!(id.starts_with("mem_"));
        assert_eq!(id.len(), 4 + 12);
    }

    #[test]
    fn layer_round_trips_through_string() {
        for l in [MemoryLayer::ShortTerm, MemoryLayer::Semantic, MemoryLayer::LongTerm] {
            let s = l.to_string();
            assert_eq!(s.parse::<MemoryLayer>().unwrap(), l);
        }
    }

    #[test]
    fn total_fields_is_twenty_five() {
        assert_eq!(PROFILE_TOTAL_FIELDS, 25);
    }
}
