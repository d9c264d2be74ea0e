//! CheckinEngine - the entry point for check-in clients.
//!
//! Wires config, the session store, and the redemption gateway together so a
//! client only has to supply decode events. Session credentials are re-read
//! from the store on every call; the auth flow may have written since.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use checkin_core::CheckinEngine;
//!
//! let engine = CheckinEngine::new()?;
//! if let Some(outcome) = engine.redeem_once("T:abc123|E:9").await {
//!     println!("{}", outcome.summary());
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{load_config, CheckinConfig};
use crate::error::Result;
use crate::payload::{self, Detection};
use crate::redeem::{HttpTransport, RedeemTransport, RedemptionGateway, RedemptionOutcome};
use crate::scan::{DetachedScanner, ScanControl};
use crate::scan_loop::ScanLoop;
use crate::session::{resolve_session_with_keys, SessionAuth};
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore};

pub struct CheckinEngine<T: RedeemTransport + 'static = HttpTransport> {
    config: CheckinConfig,
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<RedemptionGateway<T>>,
}

impl CheckinEngine<HttpTransport> {
    /// Loads `~/.checkin/config.toml` (or `$CHECKIN_CONFIG`) and talks HTTP.
    pub fn new() -> Result<Self> {
        Self::from_config_path(None)
    }

    pub fn from_config_path(path: Option<PathBuf>) -> Result<Self> {
        Ok(Self::from_config(load_config(path)?))
    }

    /// Reads the session from `config.session.store_path` when set.
    pub fn from_config(config: CheckinConfig) -> Self {
        let store = default_store(&config);
        Self::with_parts(config, store, HttpTransport::new())
    }
}

impl<T: RedeemTransport + 'static> CheckinEngine<T> {
    /// Builds an engine from explicit parts. Used by tests and embedders.
    pub fn with_parts(config: CheckinConfig, store: Arc<dyn KeyValueStore>, transport: T) -> Self {
        let gateway = Arc::new(RedemptionGateway::new(transport, &config.base_url));
        Self {
            config,
            store,
            gateway,
        }
    }

    pub fn config(&self) -> &CheckinConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<RedemptionGateway<T>> {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payloads & Sessions
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn resolve_payload(&self, raw: &str) -> Detection {
        payload::detect(raw)
    }

    /// The caller's credentials as currently stored.
    pub fn session(&self) -> SessionAuth {
        resolve_session_with_keys(self.store.as_ref(), &self.config.session)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Redemption
    // ─────────────────────────────────────────────────────────────────────────────

    /// Redeems a single payload with no scanner to coordinate.
    pub async fn redeem_once(&self, raw: &str) -> Option<RedemptionOutcome> {
        let auth = self.session();
        self.gateway.redeem(raw, &auth, &DetachedScanner).await
    }

    /// A loop that redeems events from `scanner`, reading the session from
    /// the store as each event arrives.
    pub fn scan_loop<S: ScanControl + 'static>(&self, scanner: Arc<S>) -> ScanLoop<T, S> {
        ScanLoop::new(
            Arc::clone(&self.gateway),
            scanner,
            Arc::clone(&self.store),
            self.config.session.clone(),
        )
    }
}

fn default_store(config: &CheckinConfig) -> Arc<dyn KeyValueStore> {
    match &config.session.store_path {
        Some(path) => {
            let store = JsonFileStore::open(path);
            tracing::debug!(path = %path.display(), entries = store.len(), "Opened session store");
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    }
}
