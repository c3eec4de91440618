//! Clap derive structures for the `ecoflow` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ecoflow -- query and monitor EcoFlow devices through the IoT open API
#[derive(Debug, Parser)]
#[command(
    name = "ecoflow",
    version,
    about = "Query and monitor EcoFlow devices from the command line",
    long_about = "Lists devices bound to an EcoFlow developer account, reads and writes\n\
        device parameters over the signed open API, and streams live telemetry\n\
        from the vendor broker.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "ECOFLOW_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API host (overrides profile)
    #[arg(long, env = "ECOFLOW_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Developer access key
    #[arg(long, env = "ECOFLOW_ACCESS_KEY", global = true)]
    pub access_key: Option<String>,

    /// Developer secret key
    #[arg(long, env = "ECOFLOW_SECRET_KEY", global = true, hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Account email (broker session only)
    #[arg(long, env = "ECOFLOW_EMAIL", global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "ECOFLOW_OUTPUT", default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ECOFLOW_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices bound to the developer account
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Read a device's current parameters
    Params(ParamsArgs),

    /// Set a micro-inverter's permanent output in watts
    SetWatts(SetWattsArgs),

    /// Stream live telemetry as JSON lines
    Listen(ListenArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ParamsArgs {
    /// Device serial number
    pub serial: String,

    /// Top-level response key to return; empty for the whole envelope
    #[arg(long, default_value = "data")]
    pub selector: String,
}

#[derive(Debug, Args)]
pub struct SetWattsArgs {
    /// Device serial number
    pub serial: String,

    /// Output in watts
    pub watts: f64,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Seconds between message-count reports on stderr (0 disables)
    #[arg(long, default_value = "60")]
    pub report_every: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current configuration with secrets masked
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
