use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Work calendar
    pub utc_offset_minutes: i32,
    pub day_end: NaiveTime,

    // Spreadsheet mirror
    pub export_dir: String,
    pub export_folder: String,
    pub export_queue_capacity: usize,

    // Employee directory cache
    pub employee_cache_ttl_secs: u64,
    pub employee_cache_capacity: u64,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{key} is not valid"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let day_end = env::var("ATTENDANCE_DAY_END").unwrap_or_else(|_| "18:00".to_string());
        let day_end = NaiveTime::parse_from_str(&day_end, "%H:%M")
            .with_context(|| format!("ATTENDANCE_DAY_END must be HH:MM, got {day_end}"))?;

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,

            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            utc_offset_minutes: parsed("ATTENDANCE_UTC_OFFSET_MINUTES", "0")?,
            day_end,

            export_dir: env::var("EXPORT_DIR").unwrap_or_else(|_| "exports".to_string()),
            export_folder: env::var("EXPORT_FOLDER").unwrap_or_else(|_| "attendance".to_string()),
            export_queue_capacity: parsed("EXPORT_QUEUE_CAPACITY", "64")?,

            employee_cache_ttl_secs: parsed("EMPLOYEE_CACHE_TTL_SECS", "300")?, // 5 min
            employee_cache_capacity: parsed("EMPLOYEE_CACHE_CAPACITY", "10000")?,
        };

        if config.export_queue_capacity == 0 {
            anyhow::bail!("EXPORT_QUEUE_CAPACITY must be greater than zero");
        }

        Ok(config)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            utc_offset_minutes: 0,
            day_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            export_dir: "exports".to_string(),
            export_folder: "attendance".to_string(),
            export_queue_capacity: 64,
            employee_cache_ttl_secs: 300,
            employee_cache_capacity: 100,
        }
    }
}
