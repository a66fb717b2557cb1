//! `xase record`: submit one decision.

use super::ConnectionArgs;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use xase_sdk::{
    DeliveryError, DeliveryHooks, DeliveryResult, JsonMap, Record, RecordOptions, XaseClient,
};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Policy or model identifier
    #[arg(long, required_unless_present = "file")]
    pub policy: Option<String>,

    /// Decision input as a JSON object
    #[arg(long, required_unless_present = "file")]
    pub input: Option<String>,

    /// Decision output as a JSON object
    #[arg(long, required_unless_present = "file")]
    pub output: Option<String>,

    /// Read the whole record from a JSON file instead
    #[arg(long, conflicts_with_all = ["policy", "input", "output"])]
    pub file: Option<PathBuf>,

    /// Model confidence in [0, 1]
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Extra context as a JSON object
    #[arg(long)]
    pub context: Option<String>,

    /// Caller transaction ID (also seeds the idempotency key)
    #[arg(long)]
    pub transaction_id: Option<String>,

    /// Explicit idempotency key
    #[arg(long)]
    pub idempotency_key: Option<String>,

    #[arg(long)]
    pub policy_version: Option<String>,

    #[arg(long)]
    pub decision_type: Option<String>,

    /// Ask the service to store the full payload
    #[arg(long)]
    pub store_payload: bool,

    /// Deliver before returning instead of queueing
    #[arg(long)]
    pub sync: bool,

    /// How long to wait for queued delivery before giving up
    #[arg(long, default_value = "10")]
    pub flush_timeout_secs: f64,
}

impl RecordArgs {
    fn build_record(&self) -> Result<Record> {
        let mut record = match &self.file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str::<Record>(&raw)
                    .with_context(|| format!("{} is not a valid record", path.display()))?
            }
            None => Record::new(
                self.policy.clone().unwrap_or_default(),
                parse_object("--input", self.input.as_deref())?,
                parse_object("--output", self.output.as_deref())?,
            ),
        };

        if let Some(confidence) = self.confidence {
            record.confidence = Some(confidence);
        }
        if let Some(context) = &self.context {
            record.context = Some(parse_object("--context", Some(context))?);
        }
        if let Some(transaction_id) = &self.transaction_id {
            record.transaction_id = Some(transaction_id.clone());
        }
        if let Some(policy_version) = &self.policy_version {
            record.policy_version = Some(policy_version.clone());
        }
        if let Some(decision_type) = &self.decision_type {
            record.decision_type = Some(decision_type.clone());
        }
        if self.store_payload {
            record.store_payload = Some(true);
        }

        Ok(record)
    }
}

fn parse_object(flag: &str, raw: Option<&str>) -> Result<JsonMap> {
    let raw = raw.with_context(|| format!("{} is required", flag))?;
    serde_json::from_str(raw).with_context(|| format!("{} must be a JSON object", flag))
}

/// Reports queued outcomes as they arrive from the delivery worker.
struct ReportingHooks {
    format: OutputFormat,
    failures: AtomicUsize,
}

impl DeliveryHooks for ReportingHooks {
    fn on_success(&self, result: &DeliveryResult) {
        info!(transaction_id = %result.transaction_id, "Queued record delivered");
        output::print_receipt(result, &self.format);
    }

    fn on_error(&self, error: &DeliveryError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        error!(code = %error.code, "Queued record failed");
        output::print_error(&error.to_string(), &self.format);
    }
}

pub async fn record(
    connection: &ConnectionArgs,
    args: RecordArgs,
    format: &OutputFormat,
) -> Result<()> {
    let record = args.build_record()?;
    let flush_timeout = Duration::try_from_secs_f64(args.flush_timeout_secs)
        .context("--flush-timeout-secs must be a non-negative number")?;

    let hooks = Arc::new(ReportingHooks {
        format: *format,
        failures: AtomicUsize::new(0),
    });

    let mut config = connection.client_config()?;
    config.fire_and_forget = !args.sync;
    let config = config.with_hooks(hooks.clone());

    let client = XaseClient::new(config)?;
    debug!(?client, "Client ready");

    let options = RecordOptions {
        idempotency_key: args.idempotency_key.clone(),
        skip_queue: args.sync,
        timeout: None,
    };

    match client.record(record, options).await? {
        Some(receipt) => output::print_receipt(&receipt, format),
        None => debug!("Record queued"),
    }

    let flushed = client.flush(flush_timeout).await;
    client.close().await?;
    flushed?;

    let failures = hooks.failures.load(Ordering::SeqCst);
    if failures > 0 {
        anyhow::bail!("{} queued record(s) failed", failures);
    }

    Ok(())
}
