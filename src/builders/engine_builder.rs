//! Engine construction from [`EngineConfig`].

use std::sync::Arc;

use anyhow::{anyhow, Context};

use crate::config::{EngineConfig, StoreBackendConfig};
use crate::core::{AppResult, AuditSink, Engine, StoreBackend};
use crate::infra::{InMemoryBackend, JournalBackend};
use crate::util::{Clock, SystemClock};

/// Assembles an [`Engine`] from configuration plus optional overrides.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    backend: Option<Arc<dyn StoreBackend>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Start from a configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: None,
            backend: None,
            audit: None,
        }
    }

    /// Use a specific clock instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a specific backend instead of the configured one.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn StoreBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Record engine events into an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the configuration, open the backend, restore state and
    /// register seed subscribers.
    pub fn build(self) -> AppResult<Engine> {
        self.config
            .validate()
            .map_err(|e| anyhow!("config invalid: {e}"))?;

        let backend: Arc<dyn StoreBackend> = match self.backend {
            Some(backend) => backend,
            None => match &self.config.store {
                StoreBackendConfig::InMemory => Arc::new(InMemoryBackend::new()),
                StoreBackendConfig::Journal { path } => Arc::new(
                    JournalBackend::new(path)
                        .with_context(|| format!("opening journal {}", path.display()))?,
                ),
            },
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let mut engine = Engine::new(&self.config.lot, self.config.policy.clone(), backend, clock)
            .context("restoring engine state")?;
        for seed in self.config.subscribers {
            let id = seed.id;
            engine
                .seed_subscriber(id, seed.subscriber_code, seed.profile)
                .with_context(|| format!("seeding subscriber {id}"))?;
        }
        if let Some(audit) = self.audit {
            engine = engine.with_audit(audit);
        }

        let availability = engine.availability();
        tracing::info!(
            total_spots = availability.total,
            available = availability.available,
            "engine ready"
        );
        Ok(engine)
    }
}

/// Build an engine from configuration with the system clock.
pub fn build_engine(config: EngineConfig) -> AppResult<Engine> {
    EngineBuilder::new(config).build()
}
