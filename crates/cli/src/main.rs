mod telemetry;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fetchkit_client::{ClientConfig, FetchKit};
use fetchkit_core::{MutationMethod, QueryParams};
use serde_json::Value;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "fetchkit")]
#[command(about = "Cached, normalized HTTP requests against a JSON API")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./fetchkit.toml, then $XDG_CONFIG_HOME/fetchkit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL that relative paths are resolved against
    #[arg(short, long, global = true)]
    base_url: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cached GET; repeated calls within the TTL are served from the cache
    Get {
        path: String,

        /// Query parameter as key=value, may be repeated
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Freshness window in milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,

        /// Issue the same GET this many times
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    Post(MutationArgs),
    Put(MutationArgs),
    Patch(MutationArgs),
    Delete(MutationArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct MutationArgs {
    path: String,

    /// JSON request body
    #[arg(short, long)]
    json: Option<String>,

    /// Query parameter as key=value, only sent with DELETE
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn to_params(pairs: Vec<(String, String)>) -> Option<QueryParams> {
    if pairs.is_empty() {
        return None;
    }
    let mut params = QueryParams::new();
    for (key, value) in pairs {
        params.insert(key, value);
    }
    Some(params)
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fetchkit.toml");
    if local.exists() {
        return Some(local);
    }

    let config_dir = dirs::config_dir()?;
    let path = config_dir.join("fetchkit").join("config.toml");
    path.exists().then_some(path)
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli.config.clone().or_else(find_config_file);
    build_config(cli, path.as_deref(), |name| std::env::var(name).ok())
}

/// File, then `FETCHKIT_*` variables from `lookup`, then command line flags
fn build_config<F>(cli: &Cli, path: Option<&Path>, lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_overrides(lookup)?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;

    Ok(config)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_get(
    kit: &FetchKit,
    path: &str,
    params: Option<QueryParams>,
    ttl: Option<Duration>,
    repeat: u32,
) -> Result<()> {
    for attempt in 1..=repeat.max(1) {
        debug!(attempt, path, "Issuing GET");
        let value: Value = kit.get(path, params.clone(), ttl).await?;
        print_json(&value)?;
    }

    let stats = kit.store().stats().await;
    eprintln!(
        "cache: hits={} misses={} writes={} size={}/{} hit_rate={:.1}%",
        stats.hits,
        stats.misses,
        stats.writes,
        stats.size,
        stats.capacity,
        stats.hit_rate()
    );
    Ok(())
}

async fn run_mutation(kit: &FetchKit, method: MutationMethod, args: MutationArgs) -> Result<()> {
    let mut handle = kit.mutation::<Value>(method, &args.path);
    if let Some(params) = to_params(args.params) {
        handle = handle.with_params(params);
    }

    let value = match args.json {
        Some(raw) => {
            let body: Value = serde_json::from_str(&raw).context("--json is not valid JSON")?;
            handle.mutate(&body).await?
        }
        None => handle.send().await?,
    };
    print_json(&value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    telemetry::init(&config.logging)?;

    if config.base_url.is_none() {
        debug!("No base URL configured; paths must be absolute");
    }
    let kit = FetchKit::from_config(&config)?;

    let outcome = match cli.command {
        Command::Get {
            path,
            params,
            ttl_ms,
            repeat,
        } => {
            run_get(
                &kit,
                &path,
                to_params(params),
                ttl_ms.map(Duration::from_millis),
                repeat,
            )
            .await
        }
        Command::Post(args) => run_mutation(&kit, MutationMethod::Post, args).await,
        Command::Put(args) => run_mutation(&kit, MutationMethod::Put, args).await,
        Command::Patch(args) => run_mutation(&kit, MutationMethod::Patch, args).await,
        Command::Delete(args) => run_mutation(&kit, MutationMethod::Delete, args).await,
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    };

    kit.shutdown().await;
    outcome
}
