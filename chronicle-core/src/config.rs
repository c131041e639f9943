//! Sync configuration.
//!
//! # Layering
//!
//! 1. Built-in defaults ([`SyncConfig::default`])
//! 2. `<dest_root>/.chronicle-sync.yaml`, if present
//! 3. Environment (`FORCE_SYNC`)
//! 4. CLI flags (applied by the binary)
//!
//! As with every loader here, `load_at(dest_root)` takes an explicit root so
//! tests can point it at a `TempDir`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// File name of the optional per-destination config file.
pub const CONFIG_FILE_NAME: &str = ".chronicle-sync.yaml";

/// Environment flag that forces a write even when nothing changed.
pub const FORCE_SYNC_ENV: &str = "FORCE_SYNC";

pub const DEFAULT_UPSTREAM_URL: &str = "https://github.com/ai-village-agents/village-event-log.git";
pub const DEFAULT_CHECKOUT_DIR_NAME: &str = "village-event-log-sync";
pub const DEFAULT_SOURCE_FILE: &str = "events.json";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything a sync run needs to know that is not a destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Clone URL (or local path) of the upstream repository.
    pub upstream_url: String,
    pub branch: String,
    /// Reusable checkout location; safe to delete between runs.
    pub checkout_dir: PathBuf,
    /// Event log file name, relative to both the checkout and the destination.
    pub source_file: String,
    /// Secondary publish directory under the destination root.
    pub publish_dir: String,
    pub validator: ValidatorConfig,
    pub privacy: PrivacyPolicy,
    pub force: bool,
}

/// External validator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Script path relative to the checkout root.
    pub script: PathBuf,
    pub interpreter: String,
}

/// Which email addresses may appear in event descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrivacyPolicy {
    pub allowed_domains: Vec<String>,
    pub redaction_marker: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            branch: "main".to_string(),
            checkout_dir: std::env::temp_dir().join(DEFAULT_CHECKOUT_DIR_NAME),
            source_file: DEFAULT_SOURCE_FILE.to_string(),
            publish_dir: "docs".to_string(),
            validator: ValidatorConfig::default(),
            privacy: PrivacyPolicy::default(),
            force: false,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("scripts").join("validate_events.py"),
            interpreter: "python3".to_string(),
        }
    }
}

impl Default for PrivacyPolicy {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["agentvillage.org".to_string()],
            redaction_marker: "[redacted-email]".to_string(),
        }
    }
}

impl PrivacyPolicy {
    /// `true` if `email` belongs to an allowed domain (or one of its
    /// subdomains, case-insensitive) or carries the redaction marker.
    pub fn permits(&self, email: &str) -> bool {
        if email.contains(&self.redaction_marker) {
            return true;
        }
        let Some((_, domain)) = email.rsplit_once('@') else {
            return false;
        };
        let domain = domain.to_ascii_lowercase();
        self.allowed_domains.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            domain == allowed || domain.ends_with(&format!(".{allowed}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Path of the optional config file for a destination root.
    pub fn path_at(dest_root: &Path) -> PathBuf {
        dest_root.join(CONFIG_FILE_NAME)
    }

    /// Defaults, overlaid with `<dest_root>/.chronicle-sync.yaml` if it exists,
    /// then the process environment.
    pub fn load_at(dest_root: &Path) -> Result<Self, CoreError> {
        let path = Self::path_at(dest_root);
        let mut config = if path.exists() {
            Self::load_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse an explicit config file. Missing keys take their defaults;
    /// unknown keys are rejected.
    pub fn load_file(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(FORCE_SYNC_ENV) {
            self.force = is_truthy(&value);
        }
    }

    /// Path of the event log inside a checkout.
    pub fn source_path(&self, checkout: &Path) -> PathBuf {
        checkout.join(&self.source_file)
    }

    /// Primary destination path.
    pub fn dest_path(&self, dest_root: &Path) -> PathBuf {
        dest_root.join(&self.source_file)
    }

    /// Secondary publish directory under `dest_root`.
    pub fn publish_dir_at(&self, dest_root: &Path) -> PathBuf {
        dest_root.join(&self.publish_dir)
    }
}

/// `FORCE_SYNC` semantics: only `"true"`, in any case, is truthy.
pub fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
