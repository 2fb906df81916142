use std::env::var;
use std::time::Duration as StdDuration;

use chrono::Duration;
use dotenvy::dotenv;

use crate::application::{scheduler::SchedulerConfig, services::retry::RetryPolicy};

pub struct Config {
    pub port: u16,
    /// When unset the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub slack_base_url: String,
    pub scheduler: SchedulerConfig,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn try_parse() -> Result<Config, &'static str> {
        let _ = dotenv();

        Ok(Config {
            port: var("PORT")
                .map_err(|_| "An error occured while getting PORT env param")?
                .parse::<u16>()
                .map_err(|_| "An error occured while parsing PORT env param")?,
            database_url: var("DATABASE_URL").ok(),
            slack_base_url: var("SLACK_BASE_URL")
                .unwrap_or_else(|_| "https://slack.com".to_string()),
            scheduler: SchedulerConfig {
                tick_interval: StdDuration::from_secs(parse_or(
                    "SCHEDULER_TICK_SECONDS",
                    5,
                )?),
                batch_size: parse_or("SCHEDULER_BATCH_SIZE", 50)? as usize,
                max_concurrent: parse_or("SCHEDULER_MAX_CONCURRENT", 8)? as usize,
                lease_timeout: Duration::seconds(parse_or("SCHEDULER_LEASE_SECONDS", 300)? as i64),
            },
            retry: RetryPolicy {
                max_attempts: parse_or("DISPATCH_MAX_ATTEMPTS", 5)? as u32,
                base_delay: StdDuration::from_secs(parse_or("DISPATCH_RETRY_BASE_SECONDS", 30)?),
                max_delay: StdDuration::from_secs(parse_or("DISPATCH_RETRY_MAX_SECONDS", 900)?),
                attempt_timeout: StdDuration::from_secs(parse_or(
                    "DISPATCH_ATTEMPT_TIMEOUT_SECONDS",
                    30,
                )?),
            },
        })
    }
}

fn parse_or(key: &str, default: u64) -> Result<u64, &'static str> {
    match var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|_| "An error occured while parsing a numeric env param"),
        Err(_) => Ok(default),
    }
}
