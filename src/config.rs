//! Configuration for the visit pipeline.
//!
//! Loads from JSON or from environment variables, with defaults for every
//! field. The topology contract is validated on load so a misconfigured
//! exchange/prefix pair is caught before anything connects.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consumer::{
    ConsumerOptions, FailurePolicy, DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::publisher::DEFAULT_PUBLISH_TIMEOUT;
use crate::topology::{
    TopologyContract, TopologyError, PET_CLINIC_EXCHANGE, PET_CLINIC_VISITS_EXCHANGE,
};

pub const ENV_CONTRACT: &str = "PETCLINIC_BUS_CONTRACT";
pub const ENV_EXCHANGE: &str = "PETCLINIC_BUS_EXCHANGE";
pub const ENV_QUEUE: &str = "PETCLINIC_BUS_QUEUE";
pub const ENV_ROUTING_PREFIX: &str = "PETCLINIC_BUS_ROUTING_PREFIX";
pub const ENV_PUBLISH_TIMEOUT_MS: &str = "PETCLINIC_BUS_PUBLISH_TIMEOUT_MS";
pub const ENV_CONCURRENCY: &str = "PETCLINIC_BUS_CONCURRENCY";
pub const ENV_POLL_INTERVAL_MS: &str = "PETCLINIC_BUS_POLL_INTERVAL_MS";
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "PETCLINIC_BUS_SHUTDOWN_TIMEOUT_MS";
pub const ENV_FAILURE_POLICY: &str = "PETCLINIC_BUS_FAILURE_POLICY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Consumer section of [`BusConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Everything the pipeline needs to declare topology, publish and consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub topology: TopologyContract,
    pub publish_timeout_ms: u64,
    pub consumer: ConsumerConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topology: TopologyContract::default(),
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT.as_millis() as u64,
            consumer: ConsumerConfig::default(),
        }
    }
}

impl BusConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `PETCLINIC_BUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset keys keep their defaults.
    ///
    /// `PETCLINIC_BUS_CONTRACT` selects a built-in contract by exchange name
    /// (`pet-clinic` or `pet-clinic-exchange`); the exchange, queue and
    /// prefix variables then override individual parts of it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BusConfig::default();

        if let Some(name) = lookup(ENV_CONTRACT) {
            config.topology = match name.trim() {
                PET_CLINIC_EXCHANGE => TopologyContract::pet_clinic(),
                PET_CLINIC_VISITS_EXCHANGE => TopologyContract::pet_clinic_visits(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_CONTRACT,
                        value: name,
                        reason: "unknown contract".into(),
                    })
                }
            };
        }
        if let Some(exchange) = lookup(ENV_EXCHANGE) {
            config.topology.exchange = exchange;
        }
        if let Some(queue) = lookup(ENV_QUEUE) {
            config.topology.queue = queue;
        }
        if let Some(prefix) = lookup(ENV_ROUTING_PREFIX) {
            config.topology.routing_prefix = prefix;
        }
        if let Some(value) = lookup(ENV_PUBLISH_TIMEOUT_MS) {
            config.publish_timeout_ms = parse_number(ENV_PUBLISH_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_CONCURRENCY) {
            config.consumer.concurrency = parse_number(ENV_CONCURRENCY, value)? as usize;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.consumer.poll_interval_ms = parse_number(ENV_POLL_INTERVAL_MS, value)?;
        }
        if let Some(value) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            config.consumer.shutdown_timeout_ms = parse_number(ENV_SHUTDOWN_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_FAILURE_POLICY) {
            config.consumer.failure_policy =
                value
                    .parse()
                    .map_err(|reason| ConfigError::InvalidValue {
                        key: ENV_FAILURE_POLICY,
                        value: value.clone(),
                        reason,
                    })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.topology.validate()?;
        if self.consumer.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "consumer.concurrency",
                value: "0".into(),
                reason: "at least one worker is required".into(),
            });
        }
        if self.consumer.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "consumer.poll_interval_ms",
                value: "0".into(),
                reason: "workers would spin without waiting".into(),
            });
        }
        if self.consumer.poll_interval_ms > self.consumer.shutdown_timeout_ms {
            return Err(ConfigError::InvalidValue {
                key: "consumer.poll_interval_ms",
                value: self.consumer.poll_interval_ms.to_string(),
                reason: format!(
                    "must not exceed the shutdown timeout of {}ms",
                    self.consumer.shutdown_timeout_ms
                ),
            });
        }
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "publish_timeout_ms",
                value: "0".into(),
                reason: "publish must have a positive timeout".into(),
            });
        }
        Ok(())
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn consumer_options(&self) -> ConsumerOptions {
        ConsumerOptions {
            concurrency: self.consumer.concurrency,
            poll_interval: Duration::from_millis(self.consumer.poll_interval_ms),
            shutdown_timeout: Duration::from_millis(self.consumer.shutdown_timeout_ms),
            failure_policy: self.consumer.failure_policy,
        }
    }
}

fn parse_number(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: err.to_string(),
        })
}
