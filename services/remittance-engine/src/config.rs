use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    /// Enable the periodic cycle-progression pass
    pub enabled: bool,
    /// Interval between passes in seconds (daily by default)
    pub interval_secs: u64,
}

/// GL accounts this engine posts settlement entries against. The chart of
/// accounts itself belongs to the external ledger.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub custodial_cash_account_id: Uuid,
    pub investor_payable_account_id: Uuid,
    pub servicer_fee_income_account_id: Uuid,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8084)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_secs", 86_400)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder
                .add_source(File::with_name(&format!("config/{}", environment)).required(false));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("REMITTANCE_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(port) = env::var("REMITTANCE_ENGINE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.scheduler.interval_secs == 0 {
            return Err("Scheduler interval must be positive".to_string());
        }

        let accounts = [
            self.ledger.custodial_cash_account_id,
            self.ledger.investor_payable_account_id,
            self.ledger.servicer_fee_income_account_id,
        ];
        if accounts.iter().any(|a| a.is_nil()) {
            return Err("All ledger account ids must be configured".to_string());
        }
        if accounts[0] == accounts[1] || accounts[1] == accounts[2] || accounts[0] == accounts[2] {
            return Err("Ledger account ids must be distinct".to_string());
        }

        Ok(())
    }
}
