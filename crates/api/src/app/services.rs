use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::http::StatusCode;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use stockhold_core::SystemClock;
use stockhold_events::EventEnvelope;
use stockhold_infra::{
    EngineConfig, ExpirySweeperHandle, InMemoryInventoryStore, InventoryEngine, InventoryStore,
    PostgresInventoryStore, SweeperStats,
};

use crate::app::errors;

/// Everything the handlers need: the engine, the realtime feed and the
/// sweeper runner (when the host started one).
#[derive(Debug)]
pub struct AppServices {
    engine: InventoryEngine,
    realtime_tx: broadcast::Sender<EventEnvelope<JsonValue>>,
    sweeper: Mutex<Option<ExpirySweeperHandle>>,
}

impl AppServices {
    /// Wrap an engine and start forwarding its committed events to SSE
    /// subscribers.
    pub fn new(engine: InventoryEngine) -> Self {
        let (realtime_tx, _) = broadcast::channel(1024);

        let subscription = engine.subscribe();
        let tx = realtime_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("realtime-forwarder".to_string())
            .spawn(move || {
                // Ends when the engine (and its bus) is dropped.
                while let Ok(envelope) = subscription.recv() {
                    // Lossy: no subscribers is fine.
                    let _ = tx.send(envelope);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to start realtime forwarder; SSE feed disabled");
        }

        Self {
            engine,
            realtime_tx,
            sweeper: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &InventoryEngine {
        &self.engine
    }

    /// Start the background expiry sweeper; a second call is a no-op.
    pub fn start_sweeper(&self) -> std::io::Result<()> {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(self.engine.spawn_sweeper()?);
        }
        Ok(())
    }

    pub fn trigger_sweeper(&self) -> bool {
        let slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(handle) => {
                handle.trigger();
                true
            }
            None => false,
        }
    }

    pub fn sweeper_stats(&self) -> Option<SweeperStats> {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ExpirySweeperHandle::stats)
    }

    pub fn shutdown_sweeper(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }

    /// Run an engine call on the blocking pool.
    ///
    /// Engine operations take per-item mutexes and (with Postgres) drive the
    /// pool through a runtime handle, so they must not run on an async worker.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, axum::response::Response>
    where
        T: Send + 'static,
        F: FnOnce(&InventoryEngine) -> T + Send + 'static,
    {
        let services = self.clone();
        tokio::task::spawn_blocking(move || f(&services.engine))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "engine task failed");
                errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "engine task failed")
            })
    }
}

/// Build services from the environment.
///
/// `DATABASE_URL` selects the Postgres store (schema created on startup);
/// without it everything lives in memory.
pub async fn build_services(config: EngineConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn InventoryStore> = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            let store = PostgresInventoryStore::connect(&url).await?;
            store.ensure_schema().await?;
            tracing::info!("using postgres inventory store");
            Arc::new(store)
        }
        _ => {
            tracing::info!("DATABASE_URL not set; using in-memory inventory store");
            Arc::new(InMemoryInventoryStore::new())
        }
    };

    let engine = InventoryEngine::new(store, Arc::new(SystemClock), config);
    Ok(AppServices::new(engine))
}

/// SSE stream of committed engine events.
pub fn sse_stream(
    services: &AppServices,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>> + use<>> {
    let rx = services.realtime_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(envelope) => {
            let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(envelope.event_type().to_string()).data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
