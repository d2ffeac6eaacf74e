//! Async service wrapper for RPC transports.
//!
//! Engine operations are short and blocking (mutexes plus store I/O), so
//! each request runs on tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::{Engine, EngineError, EngineResult, RequestContext};
use crate::runtime::api::{Request, Response};

/// Asynchronous entry point used by transports.
#[async_trait]
pub trait ParkingService: Send + Sync {
    /// Execute one request on behalf of `ctx`.
    async fn call(&self, ctx: RequestContext, request: Request) -> EngineResult<Response>;
}

/// Tokio-backed [`ParkingService`] over a shared engine.
#[derive(Clone)]
pub struct EngineService {
    engine: Arc<Engine>,
    handle: Handle,
}

impl EngineService {
    /// Service running on the given runtime.
    pub const fn new(engine: Arc<Engine>, handle: Handle) -> Self {
        Self { engine, handle }
    }

    /// Service running on the runtime of the calling task.
    pub fn current(engine: Arc<Engine>) -> EngineResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| EngineError::Internal(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(engine, handle))
    }

    /// Shared engine.
    pub const fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Periodically cancel reservations whose activation window has closed.
    pub fn spawn_expiry_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let handle = self.handle.clone();
        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let engine = Arc::clone(&engine);
                if let Err(e) = handle
                    .spawn_blocking(move || engine.prune_expired_reservations())
                    .await
                {
                    tracing::error!(error = %e, "expiry sweep failed");
                }
            }
        })
    }
}

#[async_trait]
impl ParkingService for EngineService {
    async fn call(&self, ctx: RequestContext, request: Request) -> EngineResult<Response> {
        let engine = Arc::clone(&self.engine);
        self.handle
            .spawn_blocking(move || engine.handle(&ctx, request))
            .await
            .map_err(|e| EngineError::Internal(format!("request task failed: {e}")))?
    }
}
