//! Process configuration, loaded from a TOML file with environment
//! overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLedgerConfig {
    pub bus: BusConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
    pub notifier: NotifierConfig,
    pub auth: AuthConfig,
    pub retention: RetentionConfig,
    pub audit: AuditConfig,
    pub features: FeatureToggles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// In-process deployments point this at an in-memory adapter name;
    /// out-of-process deployments would point it at a durable broker.
    pub endpoint: String,
    pub max_deliver: u32,
    /// Retry backoff schedule in seconds, e.g. 1s, 5s, 15s, 60s.
    pub backoff_schedule_secs: Vec<u64>,
    /// Per-message ack deadline in seconds; unacked messages are redelivered.
    pub ack_deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub port: u16,
    pub max_room_members: usize,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_expiry_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub hot_days: i64,
    pub warm_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub merkle_window_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub compression: bool,
    pub rate_limiting: bool,
}

impl Default for TraceLedgerConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig {
                endpoint: "inproc://traceledger".to_string(),
                max_deliver: 3,
                backoff_schedule_secs: vec![1, 5, 15, 60],
                ack_deadline_secs: 30,
            },
            store: StoreConfig {
                endpoint: "sqlite://traceledger.db".to_string(),
            },
            http: HttpConfig { port: 8080 },
            notifier: NotifierConfig {
                port: 8081,
                max_room_members: 1000,
                write_timeout_ms: 5000,
            },
            auth: AuthConfig {
                token_secret: "change-me".to_string(),
                token_expiry_seconds: 3600,
            },
            retention: RetentionConfig { hot_days: 30, warm_days: 365 },
            audit: AuditConfig { merkle_window_minutes: 60 },
            features: FeatureToggles { compression: false, rate_limiting: false },
        }
    }
}

impl TraceLedgerConfig {
    /// Load from an optional TOML file, then layer `TRACELEDGER_*`
    /// environment variables on top (e.g. `TRACELEDGER_HTTP__PORT=9000`).
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&TraceLedgerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("TRACELEDGER")
                .separator("__")
                .try_parsing(true),
        );

        let config: TraceLedgerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retention.hot_days >= self.retention.warm_days {
            anyhow::bail!(
                "retention.hot_days ({}) must be strictly less than retention.warm_days ({})",
                self.retention.hot_days,
                self.retention.warm_days
            );
        }
        if self.audit.merkle_window_minutes <= 0 {
            anyhow::bail!("audit.merkle_window_minutes must be positive");
        }
        if self.bus.backoff_schedule_secs.is_empty() {
            anyhow::bail!("bus.backoff_schedule_secs must not be empty");
        }
        if self.notifier.max_room_members == 0 {
            anyhow::bail!("notifier.max_room_members must be positive");
        }
        Ok(())
    }
}
