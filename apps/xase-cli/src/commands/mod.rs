//! CLI command implementations.

mod config;
mod record;

pub use config::show_config;
pub use record::{record, RecordArgs};

use clap::Args;
use std::time::Duration;
use xase_sdk::ClientConfig;

/// Connection settings shared by every command.
///
/// Flags win over `XASE_*` environment variables, which win over defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// API key (defaults to XASE_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// API base URL (defaults to XASE_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<f64>,

    /// Retries after the first attempt
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
}

impl ConnectionArgs {
    /// Client configuration from the environment, overridden by flags.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env();

        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::try_from_secs_f64(secs)
                .map_err(|_| anyhow::anyhow!("--timeout-secs must be a non-negative number"))?;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }

        Ok(config)
    }
}
