//! muse binary entry point
//!
//! Loads configuration, wires the provider, API client, and controller
//! together, then hands the terminal to [`App`]. Configuration problems are
//! reported on stderr before any terminal mode changes.

use std::fs::{self, File};
use std::io;
use std::sync::Arc;

use anyhow::Context;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use muse_core::{
    Controller, ControllerConfig, DeviceFlowProvider, HttpCreativeApi, SessionStore,
};
use muse_tui::App;

/// Route tracing to a log file; stdout belongs to the TUI
fn init_logging() {
    let Some(log_path) = dirs::data_dir().map(|dir| dir.join("muse").join("muse.log")) else {
        return;
    };
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = File::create(&log_path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MUSE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fatal before any UI: a broken config gets a plain error, not a TUI
    let config = match muse_core::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("muse: {e}");
            std::process::exit(1);
        }
    };

    init_logging();
    tracing::info!(api = %config.api_base_url, "Starting muse");

    let provider = Arc::new(DeviceFlowProvider::new(
        config.auth_domain.clone(),
        config.client_id.clone(),
        config.audience.clone(),
    ));
    {
        // Resolve cached credentials while the loading screen shows
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.resolve().await });
    }

    let api = Arc::new(HttpCreativeApi::new(config.api_base_url.as_str()));
    let store_path = SessionStore::default_path().context("could not determine data directory")?;
    let store = SessionStore::new(store_path);

    let (events_tx, events_rx) = mpsc::channel(100);
    let controller = Controller::new(
        provider,
        api,
        store,
        ControllerConfig {
            audience: config.audience,
        },
        events_tx,
    );

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(controller, events_rx);
    let result = app.run(&mut terminal).await;

    // Restore the terminal even when the loop errored
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    result
}
