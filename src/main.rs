use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use horde_viewer::config::ViewerConfig;
use horde_viewer::net::{ConnectionManager, ConnectionState, ViewerSession};
use horde_viewer::render::Presenter;
use horde_viewer::util::vec::Vector2i;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Horde Viewer v{}", env!("CARGO_PKG_VERSION"));

    let config = ViewerConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: server={}, viewport={}, auto_reconnect={}",
        config.server_addr(),
        config.viewport,
        config.auto_reconnect
    );

    // Boot straight into the first connect attempt
    let session = Arc::new(ViewerSession::new(ConnectionState::Reconnecting));

    let manager = ConnectionManager::new(config.clone(), session.clone());
    let mut network = tokio::spawn(async move { manager.run().await });

    let shutdown = Arc::new(AtomicBool::new(false));
    let presenter = spawn_presenter(
        session.clone(),
        config.viewport,
        config.render_interval,
        shutdown.clone(),
    )?;

    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel();
    spawn_control(session.clone(), quit_tx)?;
    info!("Commands: reconnect (r), stats, quit (q)");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
        Some(()) = quit_rx.recv() => {
            info!("Quit requested");
        }
        result = &mut network => {
            if let Err(e) = result {
                error!("Connection task failed: {}", e);
            }
        }
    }

    network.abort();
    shutdown.store(true, Ordering::Relaxed);
    session.notify_refresh();
    if presenter.join().is_err() {
        error!("Presenter thread panicked");
    }

    info!(stats = %session.stats().snapshot().to_json(), "Viewer stopped");
    Ok(())
}

/// Presentation loop on its own thread. Redraws on every refresh signal and
/// at least once per `interval`, logging only when the view changes.
fn spawn_presenter(
    session: Arc<ViewerSession>,
    viewport: Vector2i,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("presenter".to_string())
        .spawn(move || {
            let refresh = session.refresh_receiver();
            let mut presenter = Presenter::new(session, viewport);
            let mut last_line = String::new();

            while !shutdown.load(Ordering::Relaxed) {
                let line = presenter.frame().describe();
                if line != last_line {
                    info!("{}", line);
                    last_line = line;
                }

                match refresh.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
}

/// Reads commands from stdin. EOF ends the thread but not the viewer.
fn spawn_control(
    session: Arc<ViewerSession>,
    quit: mpsc::UnboundedSender<()>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                match line.trim() {
                    "" => {}
                    "reconnect" | "r" => {
                        if !session.request_reconnect() {
                            warn!("Cannot reconnect while {}", session.state());
                        }
                    }
                    "stats" => {
                        let snapshot = session.stats().snapshot();
                        info!("{}", snapshot.to_json());
                        if let Some(e) = session.last_error() {
                            info!("Last error: {}", e);
                        }
                    }
                    "quit" | "q" => {
                        let _ = quit.send(());
                        break;
                    }
                    other => warn!("Unknown command '{}'", other),
                }
            }
        })
}
