//! Clap derive definitions for the `isapi` binary.
//!
//! Kept free of crate-internal imports so `build.rs` can include it to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// isapi: talk to Hikvision ISAPI devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "isapi",
    version,
    about = "Query, stream and download from Hikvision ISAPI devices",
    long_about = None,
    propagate_version = true
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "ISAPI_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device address or base URL (overrides profile)
    #[arg(long, env = "ISAPI_HOST", global = true)]
    pub host: Option<String>,

    /// Login name (overrides profile)
    #[arg(long, short = 'u', env = "ISAPI_LOGIN", global = true)]
    pub login: Option<String>,

    /// Password (overrides profile, keyring and config)
    #[arg(long, env = "ISAPI_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Root path segment (default: ISAPI)
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Request timeout in seconds
    #[arg(long, short = 't', env = "ISAPI_TIMEOUT", global = true)]
    pub timeout: Option<f64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// The device's XML, unmodified
    Xml,
}

/// Response handling requested with `--type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReturnKind {
    /// Read the whole body, then print it
    #[default]
    Buffered,
    /// Print multipart events as they arrive
    Stream,
    /// Write raw body bytes to stdout
    #[value(name = "opaque_data", alias = "opaque-data")]
    OpaqueData,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a resource with GET
    Get(GetArgs),

    /// Issue an arbitrary request
    Request(RequestArgs),

    /// Follow a multipart event stream
    Stream(StreamArgs),

    /// Save a binary resource to a file
    Download(DownloadArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Resource path below the prefix (e.g. System/deviceInfo)
    pub path: String,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// HTTP method (GET, PUT, POST, DELETE, ...)
    pub method: String,

    /// Resource path below the prefix
    pub path: String,

    /// Request body
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body from a file
    #[arg(long, value_name = "FILE")]
    pub data_file: Option<PathBuf>,

    /// Query parameter (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,

    /// Extra request header (repeatable)
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE", value_parser = parse_header_pair)]
    pub headers: Vec<(String, String)>,

    /// Response handling
    #[arg(long = "type", value_enum, default_value_t)]
    pub return_type: ReturnKind,

    /// Stop a stream after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Stream path below the prefix (e.g. Event/notification/alertStream)
    pub path: String,

    /// Stop after this many events (default: run until interrupted)
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Resource path below the prefix
    pub path: String,

    /// Destination file
    #[arg(long, short = 'O', value_name = "FILE")]
    pub out: PathBuf,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the current configuration (secrets redacted)
    Show,

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name (default: active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_query_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty query key in '{s}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn parse_header_pair(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{s}'"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}
