use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::services::orders::BookingPolicy;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub holds: HoldConfig,
    pub booking: BookingConfig,
    pub notify: NotifyConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Redis опционален: без него карта мест читается напрямую из БД
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seatmap_ttl_seconds: u64,
}

// Холды и фоновая очистка
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub policy: BookingPolicy,
}

// Вебхук подтверждения заказа
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub failure_threshold: u32,
    pub backoff_seconds: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_booking=debug,tower_http=debug".to_string()),
                log_format: match env::var("LOG_FORMAT").as_deref() {
                    Ok("json") => LogFormat::Json,
                    Ok("pretty") | Err(_) => LogFormat::Pretty,
                    Ok(other) => {
                        return Err(ConfigError::Invalid { name: "LOG_FORMAT", value: other.to_string() })
                    }
                },
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
                pool_size: parse_var("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: optional_var("REDIS_URL"),
                seatmap_ttl_seconds: parse_var("SEATMAP_CACHE_TTL", 5)?,
            },
            holds: HoldConfig {
                ttl_seconds: positive_var("HOLD_TTL_SECONDS", 600)?,
                sweep_interval_seconds: positive_var("SWEEP_INTERVAL_SECONDS", 30)?,
            },
            booking: BookingConfig {
                policy: parse_var("BOOKING_POLICY", BookingPolicy::HoldRequired)?,
            },
            notify: NotifyConfig {
                webhook_url: optional_var("NOTIFY_WEBHOOK_URL"),
                failure_threshold: parse_var("NOTIFY_FAILURE_THRESHOLD", 5)?,
                backoff_seconds: parse_var("NOTIFY_BACKOFF_SECONDS", 60)?,
            },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

// Ноль и отрицательные значения недопустимы: холд с таким сроком истекает сразу
fn positive_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + ToString,
{
    let value = parse_var(name, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid { name, value: value.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let ttl: i64 = parse_var("SEAT_BOOKING_TEST_UNSET_VAR", 600).unwrap();
        assert_eq!(ttl, 600);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("SEAT_BOOKING_TEST_BAD_PORT", "eighty");
        let err = parse_var::<u16>("SEAT_BOOKING_TEST_BAD_PORT", 8000).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SEAT_BOOKING_TEST_BAD_PORT", .. }));
        env::remove_var("SEAT_BOOKING_TEST_BAD_PORT");
    }

    #[test]
    fn hold_ttl_and_sweep_interval_must_be_positive() {
        env::set_var("SEAT_BOOKING_TEST_NEGATIVE_TTL", "-30");
        let err = positive_var::<i64>("SEAT_BOOKING_TEST_NEGATIVE_TTL", 600).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SEAT_BOOKING_TEST_NEGATIVE_TTL", .. }));
        env::remove_var("SEAT_BOOKING_TEST_NEGATIVE_TTL");

        env::set_var("SEAT_BOOKING_TEST_ZERO_INTERVAL", "0");
        let err = positive_var::<u64>("SEAT_BOOKING_TEST_ZERO_INTERVAL", 30).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SEAT_BOOKING_TEST_ZERO_INTERVAL", .. }));
        env::remove_var("SEAT_BOOKING_TEST_ZERO_INTERVAL");

        env::set_var("SEAT_BOOKING_TEST_GOOD_TTL", "120");
        assert_eq!(positive_var::<i64>("SEAT_BOOKING_TEST_GOOD_TTL", 600).unwrap(), 120);
        env::remove_var("SEAT_BOOKING_TEST_GOOD_TTL");
        assert_eq!(positive_var::<u64>("SEAT_BOOKING_TEST_UNSET_INTERVAL", 30).unwrap(), 30);
    }

    #[test]
    fn policy_parses_from_env_value() {
        env::set_var("SEAT_BOOKING_TEST_POLICY", "direct");
        let policy = parse_var("SEAT_BOOKING_TEST_POLICY", BookingPolicy::HoldRequired).unwrap();
        assert_eq!(policy, BookingPolicy::Direct);
        env::remove_var("SEAT_BOOKING_TEST_POLICY");
    }
}
