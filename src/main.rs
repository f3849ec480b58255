use std::path::Path;
use std::sync::Arc;

use gnmi_stream::gather_metrics;
use gnmi_stream::interface_subscriptions;
use gnmi_stream::DecodedEvent;
use gnmi_stream::Error;
use gnmi_stream::EventKind;
use gnmi_stream::GrpcTransport;
use gnmi_stream::Result;
use gnmi_stream::Session;
use gnmi_stream::SessionConfig;
use gnmi_stream::SessionStatus;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let mut settings = SessionConfig::new()?;
    if settings.subscriptions.is_empty() {
        settings.subscriptions = interface_subscriptions();
    }
    let settings = settings.validate()?;

    // Initializing Logs
    let _guard = init_observability(std::env::var("LOG_DIR").ok().as_deref())?;

    let session = Session::new(settings, Arc::new(GrpcTransport))?;
    let mut handle = session.start()?;
    info!(session = session.id(), "Session started. Waiting for CTRL+C signal...");

    let mut status = handle.status;
    tokio::spawn(async move {
        while let Ok(notification) = status.recv().await {
            match notification {
                SessionStatus::ReconnectScheduled { attempt, delay, reason } => {
                    warn!(attempt, ?delay, "reconnecting: {}", reason)
                }
                SessionStatus::EventsDropped { total } => warn!(total, "consumer is lagging"),
                other => info!("{:?}", other),
            }
        }
    });

    tokio::select! {
        result = consume(&mut handle.events) => {
            if let Err(e) = result {
                error!("session failed: {}", e);
            }
        }
        result = graceful_shutdown() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signals: {:?}", e);
            }
        }
    }

    session.stop().await?;
    info!("{:?}", session.stats());
    info!("final metrics:\n{}", gather_metrics());

    println!("Exiting program.");
    Ok(())
}

/// Log every event until the session ends
async fn consume(events: &mut gnmi_stream::EventStream) -> Result<()> {
    while let Some(event) = events.recv().await {
        log_event(&event?);
    }
    Ok(())
}

fn log_event(event: &DecodedEvent) {
    match event.kind {
        EventKind::Counter => info!(
            subscription = %event.subscription_id,
            keys = ?event.keys,
            leaf = event.path.leaf().unwrap_or_default(),
            value = event.counter(),
            "counter"
        ),
        EventKind::Status => info!(
            subscription = %event.subscription_id,
            keys = ?event.keys,
            leaf = event.path.leaf().unwrap_or_default(),
            value = event.status(),
            "status"
        ),
        EventKind::Sync => info!(subscription = %event.subscription_id, "initial sync complete"),
        EventKind::Heartbeat => info!(subscription = %event.subscription_id, "heartbeat"),
        EventKind::Other => info!(path = %event.path, value = ?event.value, "update"),
    }
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    info!("Shutdown session..");
    Ok(())
}

/// Logs go to stdout, or to `<log_dir>/gnmi-stream.log` when a directory
/// is given
pub fn init_observability(log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let Some(log_dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        return Ok(None);
    };

    let file_appender = tracing_appender::rolling::never(Path::new(log_dir), "gnmi-stream.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(Some(guard))
}
