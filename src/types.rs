use serde::{Deserialize, Serialize};

/// Main configuration loaded from `~/.plannerdesk/config.json`.
///
/// Every section has defaults so a missing or partial file still yields a
/// usable config. Secrets are usually supplied through the environment
/// (see `state::apply_env_overrides`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// IANA timezone used to decide what "today" means for the planner.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            ai: AiConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
            timezone: default_timezone(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

impl Config {
    /// Today's date in the configured timezone. Unknown zones fall back to UTC.
    pub fn today(&self) -> chrono::NaiveDate {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => chrono::Utc::now().with_timezone(&tz).date_naive(),
            Err(_) => {
                log::warn!("Unknown timezone '{}', using UTC", self.timezone);
                chrono::Utc::now().date_naive()
            }
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

/// Connection settings for the hosted backend-as-a-service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.example.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Storage bucket used for contract uploads.
    #[serde(default = "default_contracts_bucket")]
    pub contracts_bucket: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            contracts_bucket: default_contracts_bucket(),
        }
    }
}

fn default_contracts_bucket() -> String {
    "contracts".to_string()
}

/// Hosted inference endpoint used by the assistant function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Seconds before the chat call loses the race against the timer.
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ai_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            api_key: None,
            timeout_secs: default_ai_timeout_secs(),
            max_tokens: default_ai_max_tokens(),
        }
    }
}

fn default_ai_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_ai_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    12
}

fn default_ai_max_tokens() -> u32 {
    600
}

/// User-configurable weights for the priority queue, one per rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityWeights {
    #[serde(default = "default_stage_weight")]
    pub stage: f64,
    #[serde(default = "default_overdue_weight")]
    pub overdue_follow_up: f64,
    #[serde(default = "default_upcoming_weight")]
    pub upcoming_event: f64,
    #[serde(default = "default_stale_weight")]
    pub stale_interaction: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            stage: default_stage_weight(),
            overdue_follow_up: default_overdue_weight(),
            upcoming_event: default_upcoming_weight(),
            stale_interaction: default_stale_weight(),
        }
    }
}

impl PriorityWeights {
    /// Negative weights are clamped to zero.
    pub fn clamped(self) -> Self {
        Self {
            stage: self.stage.max(0.0),
            overdue_follow_up: self.overdue_follow_up.max(0.0),
            upcoming_event: self.upcoming_event.max(0.0),
            stale_interaction: self.stale_interaction.max(0.0),
        }
    }
}

fn default_stage_weight() -> f64 {
    20.0
}

fn default_overdue_weight() -> f64 {
    30.0
}

fn default_upcoming_weight() -> f64 {
    25.0
}

fn default_stale_weight() -> f64 {
    15.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default)]
    pub weights: PriorityWeights,
    /// Events further away than this contribute nothing to urgency.
    #[serde(default = "default_event_horizon_days")]
    pub event_horizon_days: i64,
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
    #[serde(default = "default_priority_limit")]
    pub priority_limit: usize,
    /// Follow-up sweep interval. 0 disables the background poller.
    #[serde(default = "default_follow_up_poll_minutes")]
    pub follow_up_poll_minutes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weights: PriorityWeights::default(),
            event_horizon_days: default_event_horizon_days(),
            stale_after_days: default_stale_after_days(),
            priority_limit: default_priority_limit(),
            follow_up_poll_minutes: default_follow_up_poll_minutes(),
        }
    }
}

fn default_event_horizon_days() -> i64 {
    90
}

fn default_stale_after_days() -> i64 {
    14
}

fn default_priority_limit() -> usize {
    10
}

fn default_follow_up_poll_minutes() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin (development).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.pipeline.priority_limit, 10);
        assert_eq!(config.pipeline.weights, PriorityWeights::default());
        assert_eq!(config.ai.timeout_secs, 12);
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.currency_symbol, "$");
    }

    #[test]
    fn partial_weights_keep_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "pipeline": { "weights": { "stage": 5 } } }"#).unwrap();
        assert_eq!(config.pipeline.weights.stage, 5.0);
        assert_eq!(config.pipeline.weights.overdue_follow_up, 30.0);
    }

    #[test]
    fn clamped_weights_drop_negatives() {
        let weights = PriorityWeights {
            stage: -3.0,
            ..PriorityWeights::default()
        }
        .clamped();
        assert_eq!(weights.stage, 0.0);
        assert_eq!(weights.upcoming_event, 25.0);
    }

    #[test]
    fn unknown_timezone_still_gives_a_date() {
        let config = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        let _ = config.today();
    }
}
