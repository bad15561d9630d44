use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8788;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (memoria.toml + MEMORIA_* env overrides), mirroring the
/// reference stack's `SkynetConfig::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoriaConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub stores: StoresConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub intents: IntentsConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Store connection settings (§6: "vector store URL (required); time-
/// partitioned store DSN (required, fail-fast if unset); relational store
/// DSN; cache URL").
///
/// All four stores are backed by the same embedded SQLite engine in this
/// implementation (§3/§4.3 "Design Notes" — a single polyglot-shaped
/// database, not four separate network services), but the URLs/paths are
/// still independently configurable so a future deployment can point each
/// at a distinct backend without touching calling code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    pub vector_url: String,
    pub timeseries_dsn: String,
    #[serde(default = "default_relational_dsn")]
    pub relational_dsn: String,
    #[serde(default = "default_cache_url")]
    pub cache_url: String,
    /// Short-term memory key TTL in seconds (§6, default 3600).
    #[serde(default = "default_short_term_ttl")]
    pub short_term_ttl_secs: u64,
}

fn default_relational_dsn() -> String {
    default_db_path()
}
fn default_cache_url() -> String {
    default_db_path()
}
fn default_short_term_ttl() -> u64 {
    3600
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.memoria/memoria.db")
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_embedding_model() -> String {
    "memoria-embed-3072".to_string()
}

/// Thresholds and caps (§6 configuration paragraph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_extraction_confidence")]
    pub extraction_confidence: f64,
    #[serde(default = "default_dedup_cosine")]
    pub dedup_cosine: f64,
    #[serde(default = "default_max_injections")]
    pub max_injections_per_turn: usize,
    #[serde(default = "default_profile_cooldown_hours")]
    pub profile_question_cooldown_hours: i64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            extraction_confidence: default_extraction_confidence(),
            dedup_cosine: default_dedup_cosine(),
            max_injections_per_turn: default_max_injections(),
            profile_question_cooldown_hours: default_profile_cooldown_hours(),
        }
    }
}

fn default_extraction_confidence() -> f64 {
    0.80
}
fn default_dedup_cosine() -> f64 {
    0.80
}
fn default_max_injections() -> usize {
    3
}
fn default_profile_cooldown_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentsConfig {
    #[serde(default = "default_intents_max_per_user")]
    pub max_per_user: usize,
    #[serde(default = "default_claim_timeout_minutes")]
    pub claim_timeout_minutes: i64,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            max_per_user: default_intents_max_per_user(),
            claim_timeout_minutes: default_claim_timeout_minutes(),
        }
    }
}

fn default_intents_max_per_user() -> usize {
    25
}
fn default_claim_timeout_minutes() -> i64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_half_life_days")]
    pub decay_half_life_days: f64,
    #[serde(default)]
    pub daily_enabled: bool,
    #[serde(default = "default_min_age_days")]
    pub min_age_days: i64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            decay_half_life_days: default_half_life_days(),
            daily_enabled: false,
            min_age_days: default_min_age_days(),
        }
    }
}

fn default_half_life_days() -> f64 {
    60.0
}
fn default_min_age_days() -> i64 {
    7
}

/// Authentication mode for an incoming webhook source (§4.10 hook ingress).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    HmacSha256,
    BearerToken,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    pub name: String,
    pub secret: Option<String>,
    pub auth_mode: WebhookAuthMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<WebhookSourceConfig>,
}

impl MemoriaConfig {
    /// Load config from a TOML file with `MEMORIA_*` env var overrides.
    ///
    /// Checks, in order: explicit path argument, then
    /// `~/.memoria/memoria.toml`. Missing required fields (`stores.vector_url`,
    /// `stores.timeseries_dsn`) surface as `ConfigError` — the caller is
    /// expected to fail fast at startup (§6).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MEMORIA_").split("_"))
            .extract()
            .map_err(|e| crate::error::MemoriaError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.memoria/memoria.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_six() {
        let t = ThresholdsConfig::default();
        assert_eq!(t.extraction_confidence, 0.80);
        assert_eq!(t.dedup_cosine, 0.80);
        assert_eq!(t.max_injections_per_turn, 3);
        assert_eq!(t.profile_question_cooldown_hours, 24);

        let i = IntentsConfig::default();
        assert_eq!(i.max_per_user, 25);
        assert_eq!(i.claim_timeout_minutes, 5);

        let c = CompactionConfig::default();
        assert_eq!(c.decay_half_life_days, 60.0);
    }

    #[test]
    fn missing_required_fields_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memoria.toml");
        std::fs::write(&path, "").unwrap();
        let result = MemoriaConfig::load(Some(path.to_str().unwrap()));
        assert!(result.is_err());
    }
}
