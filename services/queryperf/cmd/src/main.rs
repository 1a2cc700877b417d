//! queryperf binary.
//!
//! Replays a file of DNS queries against one server for a fixed time, keeping
//! a fixed number of queries in flight, and prints throughput statistics.

use anyhow::Context;
use clap::Parser;
use qperf_session::Dispatcher;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;
mod report;

use config::PerfConfig;
use logging::PerfLogFormatter;
use report::Report;

/// Closed-loop DNS query workload generator
#[derive(Parser, Debug)]
#[command(name = "queryperf", version, about = "Closed-loop DNS query workload generator")]
struct Args {
    /// Query input file, one `<name> [<type>]` per line
    #[arg(short = 'd', long)]
    data_file: Option<PathBuf>,

    /// Server address or host name (default ::1)
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Server port (default 53)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Queries kept in flight (default 20)
    #[arg(short = 'q', long)]
    window: Option<usize>,

    /// Session length in seconds (default 10)
    #[arg(short = 'l', long)]
    duration: Option<u64>,

    /// Per-query timeout, e.g. 5s or 500ms
    #[arg(short = 't', long)]
    timeout: Option<humantime::Duration>,

    /// Load the whole input file before sending
    #[arg(long)]
    preload: bool,

    /// Clear the RD bit in queries
    #[arg(long)]
    no_recurse: bool,

    /// Attach an EDNS0 OPT record
    #[arg(short = 'e', long)]
    edns: bool,

    /// Set the DNSSEC OK bit (implies --edns)
    #[arg(short = 'D', long)]
    dnssec: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Command-line flags take precedence over file and environment
    fn apply_to(&self, config: &mut PerfConfig) {
        if let Some(data_file) = &self.data_file {
            config.data_file = Some(data_file.clone());
        }
        if let Some(server) = &self.server {
            config.server_address = server.clone();
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(timeout) = self.timeout {
            config.query_timeout = Duration::from(timeout);
        }
        if self.preload {
            config.preload = true;
        }
        if self.no_recurse {
            config.query.recursion_desired = false;
        }
        if self.edns {
            config.query.edns = true;
        }
        if self.dnssec {
            config.query.dnssec = true;
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("queryperf={}", args.log_level).parse()?)
        .add_directive(format!("qperf_session={}", args.log_level).parse()?)
        .add_directive(format!("qperf_corpus={}", args.log_level).parse()?)
        .add_directive(format!("qperf_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(PerfLogFormatter::new("queryperf"))
        .init();

    info!("Starting queryperf v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => PerfConfig::load_from_file(path)?,
        None => PerfConfig::from_environment(),
    };
    args.apply_to(&mut config);

    let data_file = config
        .data_file
        .clone()
        .context("no query input file given (use --data-file or queries.data_file)")?;

    component_info!(
        "config",
        "Server {}:{}, window {}, duration {}s, timeout {:?}, data file {}",
        config.server_address,
        config.server_port,
        config.window,
        config.duration,
        config.query_timeout,
        data_file.display()
    );
    if config.query.dnssec && !config.query.edns {
        component_warn!("config", "DNSSEC OK requested without EDNS; enabling EDNS");
    }

    let mut dispatcher = Dispatcher::from_data_file(data_file.clone(), config.preload, config.query.to_options())
        .with_context(|| format!("failed to load queries from {}", data_file.display()))?;
    dispatcher.set_server_address(config.server_address.clone())?;
    dispatcher.set_server_port(config.server_port)?;
    dispatcher.set_window(config.window)?;
    dispatcher.set_test_duration(config.duration)?;
    dispatcher.set_query_timeout(config.query_timeout)?;

    let result = dispatcher.run().await;

    if dispatcher.start_time().is_some() {
        let report = Report::new(
            config.server_address.clone(),
            config.server_port,
            data_file,
            config.window,
            dispatcher.stats(),
        );
        print!("{}", report);
    }

    if let Err(e) = &result {
        component_error!("session", "Run failed: {}", e);
    }
    result.context("query session failed")
}
