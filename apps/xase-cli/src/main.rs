//! Xase CLI - record AI decisions from the command line.

mod commands;
mod output;

use clap::{Parser, Subcommand};

/// Xase CLI - submit decision evidence to the Xase API.
#[derive(Parser)]
#[command(name = "xase")]
#[command(about = "Record AI decisions as immutable evidence")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true, env = "XASE_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(flatten)]
    connection: commands::ConnectionArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a decision
    Record(commands::RecordArgs),

    /// Show the resolved client configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "xase-cli".into(),
        default_level: cli.log_level.clone(),
        json: cli.json_logs,
    });

    let result = match cli.command {
        Commands::Record(args) => commands::record(&cli.connection, args, &cli.format).await,
        Commands::Config => commands::show_config(&cli.connection, &cli.format),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}
