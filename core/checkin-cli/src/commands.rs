use std::path::PathBuf;
use std::sync::Arc;

use checkin_core::{load_config, CaptureSession, CheckinConfig, CheckinEngine, RedemptionOutcome};
use serde::Serialize;

use crate::stdin_device::LineDevice;
use crate::Overrides;

pub fn resolve(payload: &str) -> Result<(), String> {
    let detection = checkin_core::detect(payload);
    tracing::debug!(format = %detection.format, "Resolved payload");
    print_json(&detection)
}

pub fn session(config_path: Option<PathBuf>, store: Option<PathBuf>) -> Result<(), String> {
    let overrides = Overrides {
        store,
        base_url: None,
    };
    let engine = CheckinEngine::from_config(build_config(config_path, &overrides)?);
    let auth = engine.session();
    if auth.token.is_none() {
        tracing::info!("No session token found; redemptions will be sent unauthenticated");
    }

    let expired = auth.is_expired(chrono::Utc::now());
    print_json(&serde_json::json!({
        "session": auth,
        "expired": expired,
    }))
}

pub async fn redeem(
    config_path: Option<PathBuf>,
    overrides: Overrides,
    payload: &str,
) -> Result<(), String> {
    let engine = CheckinEngine::from_config(build_config(config_path, &overrides)?);
    let outcome = engine
        .redeem_once(payload)
        .await
        .ok_or_else(|| "Another redemption is already in flight".to_string())?;

    print_json(&outcome)?;
    match outcome {
        RedemptionOutcome::Redeemed { .. } => Ok(()),
        RedemptionOutcome::Failed { message, .. } => Err(message),
    }
}

pub async fn watch(config_path: Option<PathBuf>, overrides: Overrides) -> Result<(), String> {
    let engine = CheckinEngine::from_config(build_config(config_path, &overrides)?);
    let session = Arc::new(CaptureSession::new(LineDevice::stdin()));
    let events = session
        .start()
        .await
        .map_err(|e| format!("Failed to start scanner: {}", e))?;

    tracing::info!(endpoint = %engine.gateway().endpoint(), "Watching stdin for payloads");
    let report = engine
        .scan_loop(Arc::clone(&session))
        .run(events, |outcome| {
            if let Err(e) = print_json(outcome) {
                tracing::warn!(error = %e, "Failed to print outcome");
            }
        })
        .await;
    session.shutdown().await;

    tracing::info!(
        redeemed = report.redeemed,
        failed = report.failed,
        dropped = report.dropped,
        "Scanner closed"
    );
    Ok(())
}

fn build_config(path: Option<PathBuf>, overrides: &Overrides) -> Result<CheckinConfig, String> {
    let mut config = load_config(path)?;
    if let Some(store) = &overrides.store {
        config.session.store_path = Some(store.clone());
    }
    if let Some(base_url) = &overrides.base_url {
        config.base_url = base_url.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value).map_err(|e| format!("Failed to encode output: {}", e))?;
    println!("{}", line);
    Ok(())
}
