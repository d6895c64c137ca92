//! Mesh neighbour discovery daemon
//!
//! Prints one JSON discovery report to stdout, or one per interval with
//! `--watch`. Logs go to stderr.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AU-3: Content of Audit Records - Structured logging
//! - CM-6: Configuration Settings - File plus command line overrides
//! - SI-4: System Monitoring - Periodic neighbour discovery

use anyhow::Context;
use clap::Parser;
use meshneighd::config::DEFAULT_CONFIG_PATH;
use meshneighd::{
    Discovery, DirectorySource, InterfaceDirectory, JsonPayloadFilter, MeshConfig,
    NeighbourAggregator, RtnlLinkDump, StaticDirectory, UbusDirectory,
};
use respondd::RespondClient;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Discover one-hop mesh neighbours via respondd and report our own link addresses
#[derive(Parser, Debug)]
#[command(name = "meshneighd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// respondd UDP port on the peers
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Per-interface request budget in milliseconds
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// Query string to send
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Query this device instead of asking netifd (repeatable)
    #[arg(short = 'i', long = "interface", value_name = "DEVICE")]
    interfaces: Vec<String>,

    /// Skip the link dump
    #[arg(long)]
    no_links: bool,

    /// Skip respondd requests
    #[arg(long)]
    no_neighbours: bool,

    /// Repeat discovery every SECS seconds until interrupted
    #[arg(short = 'w', long, value_name = "SECS")]
    watch: Option<u64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Everything one discovery run needs, owned so it can move to a worker thread
#[derive(Debug, Clone)]
struct RunOptions {
    config: MeshConfig,
    links: bool,
    neighbours: bool,
    pretty: bool,
}

impl RunOptions {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut config = MeshConfig::load_or_default(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?;

        if let Some(port) = args.port {
            config.respondd.port = port;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            config.respondd.timeout_ms = timeout_ms;
        }
        if let Some(query) = &args.query {
            config.respondd.query = query.clone();
        }
        if !args.interfaces.is_empty() {
            config.directory.source = DirectorySource::Static;
            config.directory.interfaces = args.interfaces.clone();
        }
        config.validate()?;

        Ok(Self {
            config,
            links: !args.no_links,
            neighbours: !args.no_neighbours,
            pretty: args.pretty,
        })
    }

    fn discovery(&self) -> Discovery {
        let config = &self.config;
        let directory: Box<dyn InterfaceDirectory> = match config.directory.source {
            DirectorySource::Ubus => Box::new(UbusDirectory::new(
                config.directory.ubus_command.as_str(),
                config.directory.ubus_object.as_str(),
                config.directory.mesh_protocols.clone(),
            )),
            DirectorySource::Static => {
                Box::new(StaticDirectory::new(config.directory.interfaces.clone()))
            }
        };

        let client = RespondClient::new().with_receive_buffer(config.respondd.receive_buffer);
        let aggregator = NeighbourAggregator::with_client(client)
            .port(config.respondd.port)
            .query(config.respondd.query.as_str())
            .timeout(config.respondd_timeout());

        let mut discovery = Discovery::with_aggregator(directory, aggregator);
        if config.report.require_json {
            discovery = discovery.filter(JsonPayloadFilter);
        }
        if self.links {
            discovery = discovery.link_dump(RtnlLinkDump::new());
        }
        if !self.neighbours {
            discovery = discovery.without_neighbours();
        }
        discovery
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("meshneighd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging on stderr
fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = RunOptions::from_args(&args)?;

    let Some(secs) = args.watch else {
        return discover(options).await;
    };

    info!(interval_secs = secs, "meshneighd: Watching mesh neighbours");
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("meshneighd: Failed to listen for SIGINT: {}", e);
        }
    };
    watch(
        Duration::from_secs(secs.max(1)),
        || discover(options.clone()),
        shutdown,
    )
    .await;

    info!("meshneighd: Received SIGINT, exiting");
    Ok(())
}

/// Runs `round` every `period` until `shutdown` completes.
///
/// Ticks missed while a round is still running are skipped. `shutdown` also
/// abandons a round in progress.
async fn watch<F, Fut>(period: Duration, mut round: F, shutdown: impl Future<Output = ()>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => break,
        }
        tokio::select! {
            result = round() => {
                if let Err(e) = result {
                    warn!("meshneighd: Discovery run failed: {:#}", e);
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

/// Runs one discovery on the blocking pool and prints its report
async fn discover(options: RunOptions) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let run = options.discovery().run()?;
        if run.has_errors() {
            warn!("meshneighd: Discovery finished with errors, report is partial");
        }
        let json = run.report().to_json(options.pretty)?;
        println!("{}", json);
        Ok(())
    })
    .await
    .context("discovery task failed")?
}
