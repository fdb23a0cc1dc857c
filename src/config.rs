use crate::domain::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub default_hourly_wage: Decimal,
    pub fortnight_bonus_rate: Decimal,
    pub commission_mode: CommissionMode,
    pub rank_reward_mode: RankRewardMode,
    pub catalog_cache_ttl: Duration,
    pub random_seed: Option<u64>,
}

/// How the commission percentage of a shift is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionMode {
    /// Monthly tier from the previous month's sales.
    Tiered,
    /// Employee base percentage plus the legacy month-to-date dynamic rate.
    Dynamic,
}

/// How rank-up rewards are paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankRewardMode {
    Bonus,
    Coins,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let default_hourly_wage = parse_non_negative(&env_map, "DEFAULT_HOURLY_WAGE", "15")?;
        let fortnight_bonus_rate = parse_non_negative(&env_map, "FORTNIGHT_BONUS_RATE", "0.01")?;

        let commission_mode = match env_map
            .get("COMMISSION_MODE")
            .map(|s| s.as_str())
            .unwrap_or("tiered")
        {
            "tiered" => CommissionMode::Tiered,
            "dynamic" => CommissionMode::Dynamic,
            other => {
                return Err(ConfigError::InvalidValue(
                    "COMMISSION_MODE".to_string(),
                    format!("must be tiered or dynamic, got {}", other),
                ))
            }
        };

        let rank_reward_mode = match env_map
            .get("RANK_REWARD_MODE")
            .map(|s| s.as_str())
            .unwrap_or("bonus")
        {
            "bonus" => RankRewardMode::Bonus,
            "coins" => RankRewardMode::Coins,
            other => {
                return Err(ConfigError::InvalidValue(
                    "RANK_REWARD_MODE".to_string(),
                    format!("must be bonus or coins, got {}", other),
                ))
            }
        };

        let catalog_cache_ttl = env_map
            .get("CATALOG_CACHE_TTL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("900")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "CATALOG_CACHE_TTL_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let random_seed = match env_map.get("RANDOM_SEED") {
            Some(s) => Some(s.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RANDOM_SEED".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?),
            None => None,
        };

        Ok(Config {
            port,
            database_path,
            default_hourly_wage,
            fortnight_bonus_rate,
            commission_mode,
            rank_reward_mode,
            catalog_cache_ttl,
            random_seed,
        })
    }

    /// Defaults for everything except the database path.
    pub fn with_database_path(database_path: impl Into<String>) -> Self {
        Config {
            port: 8080,
            database_path: database_path.into(),
            default_hourly_wage: Decimal::from_int(15),
            fortnight_bonus_rate: Decimal::from_scaled(1, 2),
            commission_mode: CommissionMode::Tiered,
            rank_reward_mode: RankRewardMode::Bonus,
            catalog_cache_ttl: Duration::from_secs(900),
            random_seed: None,
        }
    }
}

fn parse_non_negative(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    let value = Decimal::from_str(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })?;
    if value.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}
