//! Configuration via `nautilus.toml`
//!
//! One explicit `NautilusConfig` value is passed to every component
//! constructor; there are no process-wide singletons. Resolution order:
//!
//! 1. Environment variables (`NAUTILUS_WORKSPACE`, `NAUTILUS_STATE_DIR`,
//!    `NAUTILUS_CONFIG`)
//! 2. The config file (`$NAUTILUS_CONFIG`, else `<workspace>/nautilus.toml`)
//! 3. Built-in defaults
//!
//! To change settings, edit the file and rerun; there is no in-process
//! reload.

use crate::error::{NautilusError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file name looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "nautilus.toml";

/// Environment variable overriding the workspace directory.
pub const ENV_WORKSPACE: &str = "NAUTILUS_WORKSPACE";
/// Environment variable overriding the state directory.
pub const ENV_STATE_DIR: &str = "NAUTILUS_STATE_DIR";
/// Environment variable pointing at an explicit config file.
pub const ENV_CONFIG: &str = "NAUTILUS_CONFIG";

// ============================================================================
// Component sections
// ============================================================================

/// Gravity tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GravityConfig {
    /// Rate used by both the recency curve and the decay step
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Documentation only; the curve is derived from `decay_rate`
    #[serde(default = "default_half_life_days")]
    pub recency_half_life_days: u32,
    /// Flat boost for chunks written less than 2 days ago
    #[serde(default = "default_authority_boost")]
    pub authority_boost: f64,
    /// Upper bound on effective mass
    #[serde(default = "default_mass_cap")]
    pub mass_cap: f64,
}

fn default_decay_rate() -> f64 {
    0.05
}

fn default_half_life_days() -> u32 {
    14
}

fn default_authority_boost() -> f64 {
    0.3
}

fn default_mass_cap() -> f64 {
    100.0
}

impl Default for GravityConfig {
    fn default() -> Self {
        GravityConfig {
            decay_rate: default_decay_rate(),
            recency_half_life_days: default_half_life_days(),
            authority_boost: default_authority_boost(),
            mass_cap: default_mass_cap(),
        }
    }
}

/// Chamber age boundaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChamberConfig {
    /// Files at most this old classify as atrium
    #[serde(default = "default_atrium_max_hours")]
    pub atrium_max_hours: u64,
    /// Files at most this old (and past the atrium boundary) classify as
    /// corridor
    #[serde(default = "default_corridor_max_days")]
    pub corridor_max_days: u64,
}

fn default_atrium_max_hours() -> u64 {
    48
}

fn default_corridor_max_days() -> u64 {
    7
}

impl Default for ChamberConfig {
    fn default() -> Self {
        ChamberConfig {
            atrium_max_hours: default_atrium_max_hours(),
            corridor_max_days: default_corridor_max_days(),
        }
    }
}

/// Summarizer endpoint configuration
///
/// When `enabled` is false, promotion and crystallization skip cleanly
/// without contacting any endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarizerConfig {
    /// Master switch for promotion/crystallization
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// OpenAI-compatible API endpoint (e.g. "http://localhost:11434/v1")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name (e.g. "qwen3:1.7b")
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature passed to the endpoint
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Output token cap passed to the endpoint
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Optional API key for authenticated endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "qwen3:1.7b".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        SummarizerConfig {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            api_key: None,
        }
    }
}

/// Search pipeline tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Floor on the base-retrieval candidate cap (`max(n * 3, this)`)
    #[serde(default = "default_minimum_candidates")]
    pub minimum_candidates: usize,
}

fn default_minimum_candidates() -> usize {
    25
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            minimum_candidates: default_minimum_candidates(),
        }
    }
}

// ============================================================================
// NautilusConfig
// ============================================================================

/// Complete Nautilus configuration
///
/// # Example
///
/// ```toml
/// workspace_dir = "/home/agent"
/// memory_dir = "memory"
///
/// [gravity]
/// decay_rate = 0.05
/// authority_boost = 0.3
///
/// [summarizer]
/// enabled = true
/// endpoint = "http://localhost:11434/v1"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NautilusConfig {
    /// Root for resolving workspace-relative memory paths
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Location of the embedded database (under `<state_dir>/nautilus/`)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Memory tree root, relative to the workspace
    #[serde(default = "default_memory_dir")]
    pub memory_dir: String,
    /// Gravity tunables
    #[serde(default)]
    pub gravity: GravityConfig,
    /// Chamber age boundaries
    #[serde(default)]
    pub chambers: ChamberConfig,
    /// Summarizer endpoint configuration
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    /// Search pipeline tunables
    #[serde(default)]
    pub search: SearchConfig,
    /// Access-log rows older than this are pruned by vacuum
    #[serde(default = "default_retention_days")]
    pub access_log_retention_days: u32,
    /// Context-tag pattern table (tag → case-insensitive regexes);
    /// `None` uses the built-in set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_table: Option<BTreeMap<String, Vec<String>>>,
}

fn default_workspace_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_memory_dir() -> String {
    "memory".to_string()
}

fn default_retention_days() -> u32 {
    90
}

impl Default for NautilusConfig {
    fn default() -> Self {
        NautilusConfig {
            workspace_dir: default_workspace_dir(),
            state_dir: default_state_dir(),
            memory_dir: default_memory_dir(),
            gravity: GravityConfig::default(),
            chambers: ChamberConfig::default(),
            summarizer: SummarizerConfig::default(),
            search: SearchConfig::default(),
            access_log_retention_days: default_retention_days(),
            pattern_table: None,
        }
    }
}

impl NautilusConfig {
    /// Load configuration with the documented resolution order.
    ///
    /// Environment directories override whatever the file says; a missing
    /// file falls back to built-in defaults; a present-but-invalid file is
    /// an error rather than a silent default.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        let env_workspace = std::env::var_os(ENV_WORKSPACE).map(PathBuf::from);

        let candidate = explicit.clone().or_else(|| {
            let workspace = env_workspace
                .clone()
                .unwrap_or_else(default_workspace_dir);
            let path = workspace.join(CONFIG_FILE_NAME);
            path.is_file().then_some(path)
        });

        let mut config = match candidate {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(workspace) = env_workspace {
            config.workspace_dir = workspace;
        }
        if let Some(state_dir) = std::env::var_os(ENV_STATE_DIR) {
            config.state_dir = PathBuf::from(state_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on unreadable or unparsable files.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NautilusError::invalid_argument(format!(
                "cannot read config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: NautilusConfig = toml::from_str(&text).map_err(|e| {
            NautilusError::invalid_argument(format!(
                "invalid config {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check numeric ranges that would silently break the formulas.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.gravity.decay_rate) {
            return Err(NautilusError::invalid_argument(format!(
                "decay_rate must be in [0, 1), got {}",
                self.gravity.decay_rate
            )));
        }
        if self.gravity.authority_boost < 0.0 {
            return Err(NautilusError::invalid_argument(
                "authority_boost must be non-negative",
            ));
        }
        if self.gravity.mass_cap <= 0.0 {
            return Err(NautilusError::invalid_argument(
                "mass_cap must be positive",
            ));
        }
        if self.chambers.atrium_max_hours >= self.chambers.corridor_max_days * 24 {
            return Err(NautilusError::invalid_argument(format!(
                "atrium boundary ({}h) must precede corridor boundary ({}d)",
                self.chambers.atrium_max_hours, self.chambers.corridor_max_days
            )));
        }
        Ok(())
    }

    /// Path of the embedded database file.
    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("nautilus").join("nautilus.db")
    }

    /// Absolute root of the memory tree.
    pub fn memory_root(&self) -> PathBuf {
        self.workspace_dir.join(&self.memory_dir)
    }

    /// Directory receiving corridor summary files.
    pub fn corridors_dir(&self) -> PathBuf {
        self.memory_root().join("corridors")
    }

    /// Directory receiving vault lesson files.
    pub fn vaults_dir(&self) -> PathBuf {
        self.memory_root().join("vaults")
    }

    /// Turn an absolute path under the workspace back into the
    /// workspace-relative form used as chunk identity.
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.workspace_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Nautilus memory engine configuration
#
# workspace_dir: root for resolving memory paths (default: home directory)
# state_dir:     location of the embedded database (default: per-user data dir)
# memory_dir:    memory tree root, relative to the workspace
# workspace_dir = "/home/agent"
# state_dir = "/home/agent/.local/share"
memory_dir = "memory"

# Access-log rows older than this many days are pruned by vacuum.
access_log_retention_days = 90

[gravity]
# Rate used by both the recency curve and the decay step.
decay_rate = 0.05
# Flat boost for chunks written less than 2 days ago.
authority_boost = 0.3
# Upper bound on effective mass.
mass_cap = 100.0

[chambers]
# Files at most this old classify as atrium.
atrium_max_hours = 48
# Files at most this old classify as corridor; older files are vault.
corridor_max_days = 7

[summarizer]
# Set to false to skip promotion/crystallization cleanly.
enabled = true
endpoint = "http://localhost:11434/v1"
model = "qwen3:1.7b"
temperature = 0.3
max_tokens = 512
timeout_ms = 30000
# api_key = "your-api-key"     # optional

# Context-tag patterns. Omit to use the built-in set.
# [pattern_table]
# "project:nautilus" = ["\\bnautilus\\b"]
# "topic:memory" = ["\\bmemor(y|ies)\\b", "\\brecall\\b"]
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_spec_defaults() {
        let config = NautilusConfig::default();
        assert_eq!(config.gravity.decay_rate, 0.05);
        assert_eq!(config.gravity.authority_boost, 0.3);
        assert_eq!(config.gravity.mass_cap, 100.0);
        assert_eq!(config.gravity.recency_half_life_days, 14);
        assert_eq!(config.chambers.atrium_max_hours, 48);
        assert_eq!(config.chambers.corridor_max_days, 7);
        assert_eq!(config.access_log_retention_days, 90);
        assert_eq!(config.memory_dir, "memory");
        assert!(config.summarizer.enabled);
    }

    #[test]
    fn test_default_toml_parses_back() {
        let config: NautilusConfig = toml::from_str(NautilusConfig::default_toml()).unwrap();
        assert_eq!(config.gravity.decay_rate, 0.05);
        assert_eq!(config.chambers.corridor_max_days, 7);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: NautilusConfig = toml::from_str(
            r#"
            memory_dir = "mem"
            [gravity]
            decay_rate = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.memory_dir, "mem");
        assert_eq!(config.gravity.decay_rate, 0.1);
        // Untouched sections keep their defaults
        assert_eq!(config.gravity.mass_cap, 100.0);
        assert_eq!(config.chambers.atrium_max_hours, 48);
    }

    #[test]
    fn test_validate_rejects_bad_decay_rate() {
        let mut config = NautilusConfig::default();
        config.gravity.decay_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_chamber_boundaries() {
        let mut config = NautilusConfig::default();
        config.chambers.atrium_max_hours = 24 * 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_path_layout() {
        let mut config = NautilusConfig::default();
        config.state_dir = PathBuf::from("/var/lib");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/nautilus/nautilus.db"));
    }

    #[test]
    fn test_relative_path_strips_workspace() {
        let mut config = NautilusConfig::default();
        config.workspace_dir = PathBuf::from("/home/agent");
        assert_eq!(
            config.relative_path(Path::new("/home/agent/memory/2026-01-01.md")),
            "memory/2026-01-01.md"
        );
        // Paths outside the workspace pass through unchanged
        assert_eq!(config.relative_path(Path::new("/tmp/x.md")), "/tmp/x.md");
    }

    #[test]
    fn test_pattern_table_from_toml() {
        let config: NautilusConfig = toml::from_str(
            r#"
            [pattern_table]
            "project:x" = ["\\bxproj\\b"]
            "#,
        )
        .unwrap();
        let table = config.pattern_table.unwrap();
        assert_eq!(table["project:x"], vec!["\\bxproj\\b"]);
    }
}
