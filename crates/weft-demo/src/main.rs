#![forbid(unsafe_code)]

//! Peer-connection control panel composed with Weft.
//!
//! Builds the panel over the headless backend, binds it to a simulated peer
//! session, and prints the widget tree after every tick while the session
//! connects and starts sending data-channel messages.
//!
//! ```text
//! weft-demo --url https://tunnel.example --ticks 8
//! RUST_LOG=weft_reactive=debug weft-demo --log-format json
//! ```

mod panel;
mod session;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};
use weft::prelude::*;
use weft::ConfigError;

use crate::session::{PeerSession, SessionError};

#[derive(Debug, Parser)]
#[command(
    name = "weft-demo",
    version,
    about = "Drive a simulated peer connection through a Weft-bound control panel"
)]
struct Cli {
    /// Number of ticks to run after the initial frame.
    #[arg(long, default_value_t = 8)]
    ticks: u32,

    /// TOML file with composer settings. WEFT_* variables still apply on top.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Signaling URL typed into the URL field before connecting.
    #[arg(long)]
    url: Option<String>,

    /// Ticks between data-channel messages once connected.
    #[arg(long, default_value_t = 1)]
    send_interval: u32,

    /// Disconnect at this tick.
    #[arg(long, value_name = "TICK")]
    disconnect_at: Option<u32>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("session member `{member}` could not be bound")]
    Unbound { member: &'static str },
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// `RUST_LOG` wins; otherwise show warnings plus the demo's own info lines.
fn init_logging(format: LogFormat) -> Result<(), DemoError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,weft_demo=info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| DemoError::Logging(e.to_string()))
}

fn load_config(path: Option<&PathBuf>) -> Result<ComposeConfig, DemoError> {
    let config = match path {
        Some(path) => ComposeConfig::load(path)?,
        None => ComposeConfig::from_env()?,
    };
    Ok(config)
}

fn print_frame(label: &str, root: &Node) {
    println!("-- {label} --");
    print!("{}", render_tree(root.widget()));
}

fn run(cli: &Cli) -> Result<(), DemoError> {
    let config = load_config(cli.config.as_ref())?;
    let composer = Composer::with_config(HeadlessBackend::new(), config);
    let session = Rc::new(RefCell::new(PeerSession::new(
        session::DEFAULT_URL,
        cli.send_interval,
    )));
    let panel = panel::build(&composer, &session)?;

    if let Some(url) = &cli.url {
        panel.url.set_value(url.clone());
    }
    composer.tick();
    print_frame("initial", &panel.root);

    for tick in 1..=cli.ticks {
        session.borrow_mut().advance();
        if tick == 1 {
            match session.borrow_mut().connect() {
                Ok(()) | Err(SessionError::AlreadyConnected) => {}
                Err(err) => tracing::warn!(tick, "connect failed: {err}"),
            }
        }
        if cli.disconnect_at == Some(tick) {
            session.borrow_mut().disconnect();
        }

        let report = composer.tick();
        if !report.is_clean() {
            tracing::warn!(
                tick,
                failures = report.failures.len(),
                "tick finished with binding failures"
            );
        }
        tracing::debug!(
            tick,
            changed = report.changed,
            status = %panel.status.text(),
            sent = %panel.sent.value(),
            connect = panel.connect.enabled(),
            disconnect = panel.disconnect.enabled(),
            "frame"
        );
        print_frame(&format!("tick {tick}"), &panel.root);
    }

    tracing::info!(
        sent = session.borrow().sent(),
        state = %session.borrow().state(),
        log_lines = panel.log.text().lines().count(),
        bindings = composer.binding_count(),
        "demo finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_format) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
