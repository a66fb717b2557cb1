//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use xase_sdk::{ChainPosition, DeliveryResult};

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to encode output: {}", e),
    }
}

/// Print a delivery receipt.
pub fn print_receipt(receipt: &DeliveryResult, format: &OutputFormat) {
    match format {
        OutputFormat::Json => print_json(receipt),
        OutputFormat::Text => {
            println!("Record stored.");
            print_row("Transaction", &receipt.transaction_id);
            print_row("Receipt", &receipt.receipt_url);
            print_row("Record hash", &receipt.record_hash);
            print_row("Chain", chain_label(receipt.chain_position));
            print_row("Timestamp", &receipt.timestamp);
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!(
            "{}",
            serde_json::json!({ "status": "error", "message": message })
        ),
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

fn chain_label(position: ChainPosition) -> &'static str {
    match position {
        ChainPosition::Genesis => "genesis",
        ChainPosition::Chained => "chained",
    }
}
