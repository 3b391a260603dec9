//! Layered configuration for the demo dispatcher.
//!
//! Priority, highest first:
//! 1. `COURIER_*` environment variables (`__` separates nesting, e.g.
//!    `COURIER_POOL__WORKER_COUNT=5`)
//! 2. `courier.toml` in the working directory
//! 3. built-in defaults

use anyhow::{Context, Result};
use courier_core::PoolConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "courier.toml";
const ENV_PREFIX: &str = "COURIER_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub mail: MailSettings,
    pub demo: DemoSettings,
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate().context("invalid pool configuration")?;
        self.mail.validate().context("invalid mail configuration")?;
        Ok(())
    }
}

/// Outgoing mail settings. Opaque to the queue; only the handler reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub smtp_host: String,
    pub port: u16,
    pub from: String,
    pub to: String,
    pub subject: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.example.com".into(),
            port: 587,
            from: "your-email@example.com".into(),
            to: "recipient@example.com".into(),
            subject: "Order Confirmation".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailSettingsError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} is not an email address: {value}")]
    NotAnAddress { field: &'static str, value: String },
}

impl MailSettings {
    pub fn validate(&self) -> Result<(), MailSettingsError> {
        let required = [
            ("smtp_host", &self.smtp_host),
            ("from", &self.from),
            ("to", &self.to),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MailSettingsError::Missing(field));
            }
        }
        if self.port == 0 {
            return Err(MailSettingsError::Missing("port"));
        }
        for (field, value) in [("from", &self.from), ("to", &self.to)] {
            if !value.contains('@') {
                return Err(MailSettingsError::NotAnAddress {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.smtp_host, self.port)
    }
}

/// Knobs for the demo producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// How many events to seed.
    pub events: usize,
    /// Deliveries that fail before the simulated server recovers.
    pub simulated_failures: u32,
    /// Upper bound on how long to let the pool run.
    pub run_for_ms: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            events: 3,
            simulated_failures: 2,
            run_for_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_core::ShutdownPolicy;
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn file_and_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                [pool]
                worker_count = 5
                shutdown_policy = "abandon"

                [mail]
                subject = "Shipped"
                "#,
            )?;
            jail.set_env("COURIER_POOL__WORKER_COUNT", "7");
            jail.set_env("COURIER_DEMO__EVENTS", "12");

            let config: Config = Config::figment().extract()?;
            assert_eq!(config.pool.worker_count, 7);
            assert_eq!(config.pool.shutdown_policy, ShutdownPolicy::Abandon);
            assert_eq!(config.mail.subject, "Shipped");
            assert_eq!(config.mail.port, 587);
            assert_eq!(config.demo.events, 12);
            Ok(())
        });
    }

    #[test]
    fn missing_host_is_rejected() {
        let mail = MailSettings {
            smtp_host: " ".into(),
            ..Default::default()
        };
        assert_eq!(mail.validate(), Err(MailSettingsError::Missing("smtp_host")));
    }

    #[test]
    fn malformed_recipient_is_rejected() {
        let mail = MailSettings {
            to: "nobody".into(),
            ..Default::default()
        };
        assert!(matches!(
            mail.validate(),
            Err(MailSettingsError::NotAnAddress { field: "to", .. })
        ));
    }

    #[test]
    fn load_rejects_invalid_pool() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_POOL__WORKER_COUNT", "0");
            assert!(Config::load().is_err());
            Ok(())
        });
    }
}
