//! Engine configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! node:
//!   name: node10
//!   cores: 4
//!   schedulable_threshold: 80
//!   server_period_us: 2500
//!   wcet_multiplier: 1
//! storage:
//!   backend: csv            # csv | yaml | memory
//!   directory: /var/lib/rtadmit
//!   flush_interval_secs: 10
//! tdma:
//!   enabled: true
//!   master: 192.168.1.1
//!   major_cycle_us: 5000
//!   guard_band_us: 20
//!   reserved_head_us: 100
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults of [`EngineConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::scheduler::{
    AdmissionPolicy, DEFAULT_SCHEDULABLE_THRESHOLD, DEFAULT_SERVER_PERIOD_US,
    DEFAULT_WCET_MULTIPLIER,
};
use crate::store::{FlatFileStorage, MemoryStorage, Storage, YamlStorage};
use crate::tdma::{
    TdmaConfig, DEFAULT_GUARD_BAND_US, DEFAULT_MAJOR_CYCLE_US, DEFAULT_RESERVED_HEAD_US,
};

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_NODE_NAME: &str = "localhost";
pub const DEFAULT_STORAGE_DIR: &str = "/var/lib/rtadmit";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Cores the host reports, or 1 if that cannot be determined.
fn default_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    #[serde(default)]
    node: NodeSection,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    tdma: TdmaSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeSection {
    name: Option<String>,
    cores: Option<usize>,
    schedulable_threshold: Option<u32>,
    server_period_us: Option<u64>,
    wcet_multiplier: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageSection {
    backend: Option<StorageBackend>,
    directory: Option<PathBuf>,
    flush_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TdmaSection {
    enabled: Option<bool>,
    master: Option<String>,
    major_cycle_us: Option<i64>,
    guard_band_us: Option<i64>,
    reserved_head_us: Option<i64>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// Where committed containers are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `containers.csv` + `tasks.csv`.
    #[default]
    Csv,
    /// `state.yaml`.
    Yaml,
    /// Nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub directory: PathBuf,
    pub flush_interval: Duration,
}

impl StorageConfig {
    /// Instantiate the configured backend.
    pub fn open_backend(&self) -> Box<dyn Storage> {
        match self.backend {
            StorageBackend::Csv => Box::new(FlatFileStorage::new(&self.directory)),
            StorageBackend::Yaml => Box::new(YamlStorage::new(&self.directory)),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        }
    }
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name under which this node reports itself.
    pub node_name: String,
    pub policy: AdmissionPolicy,
    pub storage: StorageConfig,

    /// `None` when this node does not allocate TDMA slots.
    pub tdma: Option<TdmaConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            policy: AdmissionPolicy::new(default_cores()),
            storage: StorageConfig {
                backend: StorageBackend::default(),
                directory: PathBuf::from(DEFAULT_STORAGE_DIR),
                flush_interval: DEFAULT_FLUSH_INTERVAL,
            },
            tdma: None,
        }
    }
}

impl EngineConfig {
    /// Parse `path` and resolve every missing value to its default.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is structurally
    /// invalid, or the resolved values fail [`validate`](Self::validate).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading engine configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: EngineConfigFile = if content.trim().is_empty() {
            EngineConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let config = Self::resolve(file);
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        debug!(?config, "engine configuration resolved");
        Ok(config)
    }

    fn resolve(file: EngineConfigFile) -> Self {
        let defaults = Self::default();
        let node = file.node;
        let storage = file.storage;
        let tdma = file.tdma;

        let policy = AdmissionPolicy {
            cores: node.cores.unwrap_or(defaults.policy.cores),
            threshold: node
                .schedulable_threshold
                .unwrap_or(DEFAULT_SCHEDULABLE_THRESHOLD),
            server_period_us: node.server_period_us.unwrap_or(DEFAULT_SERVER_PERIOD_US),
            wcet_multiplier: node.wcet_multiplier.unwrap_or(DEFAULT_WCET_MULTIPLIER),
        };

        let tdma = tdma.enabled.unwrap_or(false).then(|| TdmaConfig {
            master: tdma.master.unwrap_or_default(),
            major_cycle_us: tdma.major_cycle_us.unwrap_or(DEFAULT_MAJOR_CYCLE_US),
            guard_band_us: tdma.guard_band_us.unwrap_or(DEFAULT_GUARD_BAND_US),
            reserved_head_us: tdma.reserved_head_us.unwrap_or(DEFAULT_RESERVED_HEAD_US),
        });

        Self {
            node_name: node.name.unwrap_or(defaults.node_name),
            policy,
            storage: StorageConfig {
                backend: storage.backend.unwrap_or_default(),
                directory: storage.directory.unwrap_or(defaults.storage.directory),
                flush_interval: storage
                    .flush_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_FLUSH_INTERVAL),
            },
            tdma,
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.policy;
        if p.cores == 0 {
            bail!("node.cores must be at least 1");
        }
        if !(1..=100).contains(&p.threshold) {
            bail!(
                "node.schedulable_threshold must be in 1..=100, got {}",
                p.threshold
            );
        }
        if p.server_period_us == 0 {
            bail!("node.server_period_us must be positive");
        }
        if p.wcet_multiplier == 0 {
            bail!("node.wcet_multiplier must be at least 1");
        }
        if self.storage.flush_interval.is_zero() {
            bail!("storage.flush_interval_secs must be at least 1");
        }

        if let Some(t) = &self.tdma {
            if t.reserved_head_us < 0 || t.guard_band_us < 0 {
                bail!("tdma.reserved_head_us and tdma.guard_band_us must not be negative");
            }
            if t.guard_band_us % 2 != 0 {
                bail!("tdma.guard_band_us must be even, got {}", t.guard_band_us);
            }
            if t.major_cycle_us <= t.reserved_head_us {
                bail!(
                    "tdma.major_cycle_us ({}) must exceed tdma.reserved_head_us ({})",
                    t.major_cycle_us,
                    t.reserved_head_us
                );
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
