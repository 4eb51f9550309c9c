use clap::Parser;
use std::time::Duration;

use hoptrace::Config;
use hoptrace::config::{DEFAULT_EVENT_CAPACITY, DEFAULT_PORT};

/// Unprivileged UDP traceroute with live hop output
#[derive(Parser, Debug, Clone)]
#[command(name = "hoptrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IPv4 address or hostname)
    pub target: String,

    /// Destination port for UDP probes
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// First TTL to probe
    #[arg(short = 'f', long = "first-ttl", default_value = "1")]
    pub first_ttl: u8,

    /// Maximum TTL (hops)
    #[arg(short = 'm', long = "max-ttl", default_value = "30")]
    pub max_ttl: u8,

    /// Per-hop timeout in seconds
    #[arg(short = 'w', long = "timeout", default_value = "3")]
    pub timeout: f64,

    /// Skip reverse DNS lookups
    #[arg(short = 'n', long = "no-dns")]
    pub no_dns: bool,

    /// Output JSON once the trace completes
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,

    /// Output CSV once the trace completes
    #[arg(long = "csv", conflicts_with = "report")]
    pub csv: bool,

    /// Output a text report once the trace completes
    #[arg(long = "report", conflicts_with = "json")]
    pub report: bool,
}

impl Args {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Check if running in batch mode (non-streaming)
    pub fn is_batch_mode(&self) -> bool {
        self.json || self.csv || self.report
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.target.trim().is_empty() {
            return Err("Target cannot be empty".into());
        }

        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }

        // Guard Duration::from_secs_f64 against absurd values
        const MAX_TIMEOUT_SECS: f64 = 3600.0;
        if self.timeout > MAX_TIMEOUT_SECS {
            return Err(format!("Timeout cannot exceed {} seconds", MAX_TIMEOUT_SECS));
        }

        if self.first_ttl == 0 {
            return Err("First TTL must be at least 1".into());
        }

        if self.max_ttl < self.first_ttl {
            return Err(format!(
                "Max TTL ({}) cannot be lower than first TTL ({})",
                self.max_ttl, self.first_ttl
            ));
        }

        if self.port == 0 {
            return Err("Port must be between 1 and 65535".into());
        }

        Ok(())
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            target: args.target.clone(),
            port: args.port,
            start_ttl: args.first_ttl,
            max_ttl: args.max_ttl,
            timeout: args.timeout_duration(),
            dns_enabled: !args.no_dns,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
