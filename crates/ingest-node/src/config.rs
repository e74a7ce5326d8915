//! # Node Configuration
//!
//! Unified configuration for the ingest node, layered as defaults first,
//! then `TL_*` environment variables.
//!
//! ## Security Requirements
//!
//! - `hmac_secret` MUST NOT be empty in production
//! - At least one channel must feed the ledger
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `TL_HMAC_SECRET` | Shared device secret | (none) |
//! | `TL_DATA_DIR` | Ledger and sequence files | `./data` |
//! | `TL_BIND_ADDR` | TCP bridge address, `off` to disable | `127.0.0.1:7878` |
//! | `TL_CHANNELS` | Authenticated `topic=device` pairs | `cesi/cafet=cafet,cesi/fablab=fablab` |
//! | `TL_UNAUTHENTICATED_CHANNELS` | Unauthenticated `topic=device` pairs | (none) |
//! | `TL_HANDSHAKE_TOPIC` | Handshake request topic | `devices/handshake` |
//! | `TL_FANOUT_TOPIC` | Topic committed blocks are re-published on | `ledger/blocks` |
//! | `TL_EVENT_CAPACITY` | Fan-out buffer per subscriber | `1000` |

use shared_types::{DeviceId, TrustTier};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub transport: TransportConfig,
    /// Topics feeding the ledger.
    pub channels: Vec<ChannelConfig>,
}

impl NodeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `TL_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = NodeConfig {
            channels: ChannelConfig::defaults(),
            ..NodeConfig::default()
        };

        if let Some(secret) = lookup("TL_HMAC_SECRET") {
            config.security.hmac_secret = secret;
        }
        if let Some(dir) = lookup("TL_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("TL_BIND_ADDR") {
            config.transport.bind_addr = parse_bind_addr(&addr)?;
        }
        if let Some(topic) = lookup("TL_HANDSHAKE_TOPIC") {
            config.transport.handshake_topic = topic;
        }
        if let Some(topic) = lookup("TL_FANOUT_TOPIC") {
            config.transport.fanout_topic = topic;
        }
        if let Some(capacity) = lookup("TL_EVENT_CAPACITY") {
            config.transport.event_capacity =
                capacity.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "TL_EVENT_CAPACITY",
                    value: capacity.clone(),
                })?;
        }

        if let Some(list) = lookup("TL_CHANNELS") {
            config.channels = ChannelConfig::parse_list(&list, TrustTier::Authenticated)?;
        }
        if let Some(list) = lookup("TL_UNAUTHENTICATED_CHANNELS") {
            config
                .channels
                .extend(ChannelConfig::parse_list(&list, TrustTier::Unauthenticated)?);
        }

        let mut seen = HashSet::new();
        for channel in &config.channels {
            if !seen.insert(channel.topic.as_str()) {
                return Err(ConfigError::DuplicateTopic {
                    topic: channel.topic.clone(),
                });
            }
        }

        Ok(config)
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the HMAC secret is empty
    /// - no channel is configured
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.security.hmac_secret.is_empty() {
            return Err(ConfigError::InsecureHmacSecret);
        }
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }

    /// Devices on authenticated channels.
    pub fn authenticated_devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.channels
            .iter()
            .filter(|c| c.trust == TrustTier::Authenticated)
            .map(|c| &c.device)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// HMAC secret is not set.
    #[error(
        "SECURITY VIOLATION: HMAC secret is empty. \
         Set TL_HMAC_SECRET environment variable or provide in config."
    )]
    InsecureHmacSecret,

    #[error("No channels configured; set TL_CHANNELS")]
    NoChannels,

    /// A channel entry is not `topic=device`.
    #[error("Invalid channel entry '{entry}', expected topic=device")]
    InvalidChannel { entry: String },

    #[error("Topic '{topic}' configured twice")]
    DuplicateTopic { topic: String },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Security configuration.
#[derive(Clone, Default)]
pub struct SecurityConfig {
    /// Secret shared with every device on authenticated channels.
    /// MUST NOT be empty in production.
    pub hmac_secret: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("hmac_secret", &"<redacted>")
            .finish()
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory for the ledger and the sequence record.
    pub data_dir: PathBuf,
    /// Verify the stored chain on startup.
    pub verify_on_start: bool,
}

impl StorageConfig {
    pub const LEDGER_FILE: &'static str = "ledger.jsonl";
    pub const SEQUENCE_FILE: &'static str = "sequences.json";

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(Self::LEDGER_FILE)
    }

    pub fn sequence_path(&self) -> PathBuf {
        self.data_dir.join(Self::SEQUENCE_FILE)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            verify_on_start: true,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// TCP bridge listen address; `None` runs the broker in-process only.
    pub bind_addr: Option<SocketAddr>,
    pub handshake_topic: String,
    pub fanout_topic: String,
    /// Buffer per subscriber on the fan-out bus.
    pub event_capacity: usize,
    /// Buffer per topic on the broker.
    pub broker_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: Some(SocketAddr::from(([127, 0, 0, 1], 7878))),
            handshake_topic: "devices/handshake".to_string(),
            fanout_topic: "ledger/blocks".to_string(),
            event_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            broker_capacity: 1024,
        }
    }
}

fn parse_bind_addr(value: &str) -> Result<Option<SocketAddr>, ConfigError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: "TL_BIND_ADDR",
            value: value.to_string(),
        })
}

/// One topic feeding the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub topic: String,
    /// Location every reading on `topic` is recorded under.
    pub device: DeviceId,
    pub trust: TrustTier,
}

impl ChannelConfig {
    pub fn new(topic: impl Into<String>, device: impl Into<DeviceId>, trust: TrustTier) -> Self {
        Self {
            topic: topic.into(),
            device: device.into(),
            trust,
        }
    }

    /// The two site sensors.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("cesi/cafet", "cafet", TrustTier::Authenticated),
            Self::new("cesi/fablab", "fablab", TrustTier::Authenticated),
        ]
    }

    /// Parse `topic=device,topic=device`.
    pub fn parse_list(list: &str, trust: TrustTier) -> Result<Vec<Self>, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (topic, device) = entry
                    .split_once('=')
                    .map(|(t, d)| (t.trim(), d.trim()))
                    .filter(|(t, d)| !t.is_empty() && !d.is_empty())
                    .ok_or_else(|| ConfigError::InvalidChannel {
                        entry: entry.to_string(),
                    })?;
                Ok(Self::new(topic, device, trust))
            })
            .collect()
    }
}
