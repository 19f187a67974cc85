use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;

use crate::detector::DetectorConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "wpcheck")]
#[command(about = "HTTP service that reports whether a site runs on WordPress")]
pub struct Args {
    // Interface to listen on
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    // Max checks per client IP per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 1000)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 86_400)]
    pub rate_window: u64,

    // Timeout for the page fetch, seconds
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = 10)]
    pub fetch_timeout: u64,

    // Timeout for the wp-admin probe, seconds
    #[arg(long, env = "PROBE_TIMEOUT", default_value_t = 5)]
    pub probe_timeout: u64,

    // User-Agent sent on outbound requests
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl Args {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            user_agent: self.user_agent.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
            probe_timeout: Duration::from_secs(self.probe_timeout),
        }
    }

    /// Window length as a signed delta for timestamp arithmetic.
    pub fn rate_window(&self) -> anyhow::Result<chrono::TimeDelta> {
        // the window must also fit when added to the current time
        i64::try_from(self.rate_window)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .filter(|window| chrono::Utc::now().checked_add_signed(*window).is_some())
            .ok_or_else(|| anyhow::anyhow!("rate window of {}s is out of range", self.rate_window))
    }
}
