mod app;
mod handler;
mod tui;
mod ui;

use std::fs;
use std::sync::Mutex;

use anyhow::{Context, Result};
use manimator_core::{Config, RealtimeChannel, RealtimeHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::App;
use tui::{AppEvent, EventHandler};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "falling back to default config");
            Config::new().with_env_overrides(|key| std::env::var(key).ok())
        }
    };
    info!(
        submission = %config.submission_endpoint,
        realtime = %config.realtime_endpoint,
        "starting manimator"
    );

    // One realtime connection for the life of the UI
    let realtime = RealtimeChannel::new(&config.realtime_endpoint)
        .subscribe_all()
        .connect()
        .context("failed to start realtime channel")?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &config, realtime).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, config: &Config, mut realtime: RealtimeHandle) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());

    loop {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        let event = tokio::select! {
            event = events.next() => event,
            Some(channel_event) = realtime.recv() => Some(AppEvent::Realtime(channel_event)),
        };

        match event {
            Some(event) => handler::handle_event(&mut app, event),
            None => break,
        }

        if app.should_quit {
            break;
        }
    }

    realtime.disconnect().await;
    Ok(())
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() {
    let filter = EnvFilter::try_from_env("MANIMATOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = dirs::cache_dir()
        .map(|dir| dir.join("manimator"))
        .and_then(|dir| {
            fs::create_dir_all(&dir).ok()?;
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("manimator.log"))
                .ok()
        });

    match log_file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .try_init();
        }
    }
}
