use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anstream::eprintln;
use anyhow::{Context, Result, bail};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use crate::config::{ProxySpec, RunContext};

mod config;
mod crawl;
mod fetch;
mod http;
mod index;
mod object;
mod oid;
mod pack;
mod queue;
mod sanitize;
mod scan;
mod store;
mod validate;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:78.0) Gecko/20100101 Firefox/78.0";

/// Dump a git repository from a website.
#[derive(Parser)]
#[command(about, version, name = "gitrip")]
struct App {
    /// The URL of the site hosting the exposed `.git/` directory.
    #[arg(value_name = "URL")]
    url: String,

    /// The directory to reconstruct the repository into.
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Use the specified proxy: socks5://, socks4://, http://, or a bare
    /// host:port (SOCKS5). Credentials go in as user:pass@host.
    #[arg(long, value_parser = ProxySpec::from_clap)]
    proxy: Option<ProxySpec>,

    /// Number of simultaneous requests.
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    jobs: u64,

    /// Number of request attempts before giving up.
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    retry: u32,

    /// Maximum time in seconds before giving up on a request.
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// User-Agent to use for requests.
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Additional HTTP header, e.g. `NAME=VALUE`.
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE", value_parser = config::header_from_clap)]
    headers: Vec<(String, String)>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn run() -> Result<ExitCode> {
    let app = App::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(app.verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if !app.directory.exists() {
        fs::create_dir_all(&app.directory)
            .with_context(|| format!("couldn't create {}", app.directory.display()))?;
    }
    if !app.directory.is_dir() {
        bail!("`{}` is not a directory", app.directory.display());
    }

    let ctx = RunContext {
        base_url: config::normalize_url(&app.url),
        output: app.directory,
        jobs: app.jobs as usize,
        retry: app.retry,
        timeout: Duration::from_secs(app.timeout),
        user_agent: app.user_agent,
        headers: app.headers,
        proxy: app.proxy,
    };

    crawl::run(&ctx)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // Returning an ExitCode keeps the exit clean; probe and argument
    // failures surface here, per-task failures never do.
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {err:#}", "error".red());
            ExitCode::FAILURE
        }
    }
}
