//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub geometry: GeometryConfig,

    #[serde(default)]
    pub positioner: PositionerConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub launcher: LauncherSettings,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Overall bound on a resolution, across all retries.
    #[serde(default = "default_resolve_timeout_ms")]
    pub timeout_ms: u64,

    /// Bound on the free-text document walk of a single attempt.
    #[serde(default = "default_text_walk_budget_ms")]
    pub text_walk_budget_ms: u64,
}

fn default_max_retries() -> u32 {
    15
}

fn default_retry_delay_ms() -> u64 {
    300
}

fn default_resolve_timeout_ms() -> u64 {
    10_000
}

fn default_text_walk_budget_ms() -> u64 {
    3_000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_resolve_timeout_ms(),
            text_walk_budget_ms: default_text_walk_budget_ms(),
        }
    }
}

impl ResolverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn text_walk_budget(&self) -> Duration {
        Duration::from_millis(self.text_walk_budget_ms)
    }
}

/// Geometry tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Fallback polling interval when no change notifications arrive.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Recompute batching window.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_frame_interval_ms() -> u64 {
    16
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl GeometryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Overlay placement settings, in CSS pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionerConfig {
    /// Minimum distance between an overlay and the viewport edge.
    #[serde(default = "default_margin")]
    pub margin: f64,

    /// Distance between an overlay and its target.
    #[serde(default = "default_gap")]
    pub gap: f64,

    /// Minimum distance between the tail and an overlay corner.
    #[serde(default = "default_tail_inset")]
    pub tail_inset: f64,
}

fn default_margin() -> f64 {
    8.0
}

fn default_gap() -> f64 {
    12.0
}

fn default_tail_inset() -> f64 {
    12.0
}

impl Default for PositionerConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            gap: default_gap(),
            tail_inset: default_tail_inset(),
        }
    }
}

/// Flow orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Duration of the per-flow start re-entrancy lock.
    #[serde(default = "default_start_lock_ms")]
    pub start_lock_ms: u64,

    /// URL query parameter carrying a forced step marker.
    #[serde(default = "default_forced_step_param")]
    pub forced_step_param: String,

    /// Move `dismiss` actions ahead of the others in a batch.
    #[serde(default = "default_true")]
    pub prioritize_dismiss: bool,

    /// Bound on consecutive trigger-driven transitions.
    #[serde(default = "default_max_transition_hops")]
    pub max_transition_hops: usize,

    #[serde(default = "default_auto_start_delay_ms")]
    pub auto_start_delay_ms: u64,

    /// Re-evaluation interval of a step waiting on its triggers.
    #[serde(default = "default_trigger_poll_ms")]
    pub trigger_poll_ms: u64,
}

fn default_start_lock_ms() -> u64 {
    1_500
}

fn default_forced_step_param() -> String {
    "wf_step".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_transition_hops() -> usize {
    64
}

fn default_auto_start_delay_ms() -> u64 {
    1_000
}

fn default_trigger_poll_ms() -> u64 {
    500
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            start_lock_ms: default_start_lock_ms(),
            forced_step_param: default_forced_step_param(),
            prioritize_dismiss: default_true(),
            max_transition_hops: default_max_transition_hops(),
            auto_start_delay_ms: default_auto_start_delay_ms(),
            trigger_poll_ms: default_trigger_poll_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn start_lock(&self) -> Duration {
        Duration::from_millis(self.start_lock_ms)
    }

    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_millis(self.auto_start_delay_ms)
    }

    pub fn trigger_poll(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_ms)
    }
}

/// Launcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// Position refresh interval for element-attached launchers.
    #[serde(default = "default_fallback_poll_ms")]
    pub fallback_poll_ms: u64,
}

fn default_fallback_poll_ms() -> u64 {
    250
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            fallback_poll_ms: default_fallback_poll_ms(),
        }
    }
}

impl LauncherSettings {
    pub fn fallback_poll(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_ms)
    }
}

/// Embedding authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Embed key validated once per engine. When absent the key is read
    /// from the page; with neither the engine stays unauthorized.
    #[serde(default)]
    pub embed_key: Option<String>,

    #[serde(default)]
    pub environment_id: Option<String>,

    /// Id of the page element carrying the fallback key.
    #[serde(default = "default_page_key_element")]
    pub page_key_element: String,

    /// Attribute of that element holding the key.
    #[serde(default = "default_page_key_attribute")]
    pub page_key_attribute: String,
}

fn default_page_key_element() -> String {
    "mflows-lockout".to_string()
}

fn default_page_key_attribute() -> String {
    "data-ark".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            embed_key: None,
            environment_id: None,
            page_key_element: default_page_key_element(),
            page_key_attribute: default_page_key_attribute(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files; console only when absent.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}
