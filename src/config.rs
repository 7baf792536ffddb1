use crate::application::RetryPolicy;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },
}

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub retry_policy: RetryPolicy,
    pub lock_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/library".to_string(),
            database_max_connections: 5,
            port: 4000,
            retry_policy: RetryPolicy::default(),
            lock_timeout: Duration::from_millis(2000),
        }
    }
}

/// 環境変数の形そのままの設定値
///
/// キーは環境変数名を小文字にしたもの。未設定の項目は既定値になる。
#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnvSettings {
    database_url: String,
    database_max_connections: u32,
    port: u16,
    lending_max_attempts: u32,
    lending_retry_base_delay_ms: u64,
    lending_lock_timeout_ms: u64,
}

impl Default for EnvSettings {
    fn default() -> Self {
        let defaults = AppConfig::default();
        Self {
            database_url: defaults.database_url,
            database_max_connections: defaults.database_max_connections,
            port: defaults.port,
            lending_max_attempts: defaults.retry_policy.max_attempts,
            lending_retry_base_delay_ms: defaults.retry_policy.base_delay.as_millis() as u64,
            lending_lock_timeout_ms: defaults.lock_timeout.as_millis() as u64,
        }
    }
}

impl TryFrom<EnvSettings> for AppConfig {
    type Error = ConfigError;

    fn try_from(settings: EnvSettings) -> Result<Self, Self::Error> {
        at_least_one("LENDING_MAX_ATTEMPTS", u64::from(settings.lending_max_attempts))?;
        at_least_one(
            "DATABASE_MAX_CONNECTIONS",
            u64::from(settings.database_max_connections),
        )?;
        // PostgreSQLはlock_timeout=0を「無制限」と解釈する
        at_least_one("LENDING_LOCK_TIMEOUT_MS", settings.lending_lock_timeout_ms)?;

        Ok(Self {
            database_url: settings.database_url,
            database_max_connections: settings.database_max_connections,
            port: settings.port,
            retry_policy: RetryPolicy {
                max_attempts: settings.lending_max_attempts,
                base_delay: Duration::from_millis(settings.lending_retry_base_delay_ms),
            },
            lock_timeout: Duration::from_millis(settings.lending_lock_timeout_ms),
        })
    }
}

impl AppConfig {
    /// プロセスの環境変数から読み込む（`.env`があれば先に取り込む）
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load(environment())
    }

    /// 既定値の上に環境変数ソースを重ねて読み込む
    fn load(source: Environment) -> Result<Self, ConfigError> {
        let settings: EnvSettings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        settings.try_into()
    }
}

fn environment() -> Environment {
    Environment::default().try_parsing(true)
}

fn at_least_one(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { name });
    }
    Ok(())
}
