//! `xase config`: show the settings a client would run with.

use super::ConnectionArgs;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;

pub fn show_config(connection: &ConnectionArgs, format: &OutputFormat) -> Result<()> {
    let config = connection.client_config()?;
    let base_url = config.resolve_base_url()?;
    let api_key_set = !config.api_key.trim().is_empty();

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "base_url": base_url,
            "api_key_set": api_key_set,
            "timeout_secs": config.timeout.as_secs_f64(),
            "fire_and_forget": config.fire_and_forget,
            "max_retries": config.max_retries,
            "base_delay_ms": config.base_delay.as_millis() as u64,
            "max_delay_ms": config.max_delay.as_millis() as u64,
            "queue_max_size": config.queue_max_size,
        })),
        OutputFormat::Text => {
            output::print_row("Base URL", &base_url);
            output::print_row("API key", if api_key_set { "set" } else { "missing" });
            output::print_row("Timeout", &format!("{:?}", config.timeout));
            output::print_row("Fire and forget", &config.fire_and_forget.to_string());
            output::print_row("Max retries", &config.max_retries.to_string());
            output::print_row("Queue size", &config.queue_max_size.to_string());
        }
    }

    Ok(())
}
