//! NextGCore MME EMM daemon
//!
//! Hosts the EMM engine between two event channels. S1AP, S6a and ESM
//! adapters post their events on the inbound queue and take the engine's
//! requests from the outbound receiver.

use anyhow::Result;
use clap::Parser;
use nextgcore_mme_emm::config::ConfigError;
use nextgcore_mme_emm::{EventQueue, MmeConfig, MmeEmm, MmeEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// NextGCore MME EMM - EPS Mobility Management
#[derive(Parser, Debug)]
#[command(name = "nextgcore-mme-emmd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "EPC MME EPS Mobility Management engine")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/nextgcore/mme.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// MME EMM application state
pub struct MmeEmmApp {
    /// Running flag
    running: Arc<AtomicBool>,
    /// EMM engine
    engine: MmeEmm,
    /// Inbound event receiver
    event_rx: mpsc::UnboundedReceiver<MmeEvent>,
    /// Inbound event sender, cloned into adapters
    queue: EventQueue,
    /// Engine requests, until an adapter takes them over
    outbound_rx: Option<mpsc::UnboundedReceiver<MmeEvent>>,
}

impl MmeEmmApp {
    /// Create a new application around `config`
    pub fn new(config: MmeConfig) -> Self {
        let (tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let outbound = EventQueue::new(outbound_tx);
        let engine = MmeEmm::new(
            config,
            Box::new(outbound.clone()),
            Box::new(outbound.clone()),
            Box::new(outbound),
        );
        Self {
            running: Arc::new(AtomicBool::new(true)),
            engine,
            event_rx,
            queue: EventQueue::new(tx),
            outbound_rx: Some(outbound_rx),
        }
    }

    /// Sender side of the inbound channel
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    /// Hand the engine's outbound requests to an adapter. Only the first
    /// caller gets the receiver.
    pub fn take_outbound(&mut self) -> Option<mpsc::UnboundedReceiver<MmeEvent>> {
        self.outbound_rx.take()
    }

    /// Drain pending events. Returns the number of inbound events handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            if event.is_inbound() {
                self.engine.dispatch(event);
                handled += 1;
            } else {
                log::warn!("{} posted on the inbound queue, dropped", event.name());
            }
        }

        // nobody attached to the outbound side
        if let Some(outbound_rx) = self.outbound_rx.as_mut() {
            while let Ok(event) = outbound_rx.try_recv() {
                log::warn!("No adapter for {}, dropped", event.name());
            }
        }
        handled
    }

    /// Run the main loop
    pub async fn run(&mut self) -> Result<()> {
        log::info!("MME EMM running...");

        while self.running.load(Ordering::SeqCst) {
            self.poll();

            // Brief yield to allow other tasks
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }

        log::info!("MME EMM main loop exited");
        Ok(())
    }

    /// Shutdown the application
    pub fn shutdown(&mut self) {
        log::info!("Shutting down MME EMM...");
        self.event_rx.close();
        log::info!(
            "MME EMM shutdown complete ({} UE contexts left)",
            self.engine.context().mme_ue_count()
        );
    }

    /// Signal the application to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

fn load_config(path: &str) -> Result<MmeConfig> {
    log::info!("Loading configuration from: {}", path);

    match MmeConfig::from_file(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::Io { path, source }) => {
            log::warn!("Could not read config file '{}': {}. Using defaults.", path, source);
            Ok(MmeConfig::default())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to load config: {}", e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    log::info!("NextGCore MME EMM v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    log::info!(
        "Serving PLMN {} TAC {} (MME GID {} code {})",
        config.plmn_id,
        config.tac,
        config.mme_gid,
        config.mme_code
    );

    let mut app = MmeEmmApp::new(config);

    // Setup signal handlers
    let running = app.running_flag();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    app.run().await?;
    app.shutdown();

    log::info!("NextGCore MME EMM terminated");
    Ok(())
}
