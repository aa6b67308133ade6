use std::time::Duration;

use chrono::Utc;
use rakshak_core::{RiskConfig, TrackZone};
use rakshak_engine::Scenario;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::util::{Engine, exit_error, print_json_line, resolve_zone};

/// Streams push envelopes and escalations as JSON lines until Ctrl-C or
/// `max_ticks`. Each tick runs one cycle for the next zone in rotation.
pub async fn run(
    config: &RiskConfig,
    zone_id: Option<&str>,
    scenario: Option<Scenario>,
    interval_secs: u64,
    max_ticks: Option<u64>,
    seed: Option<u64>,
) -> i32 {
    if interval_secs == 0 {
        exit_error(
            "--interval-secs must be at least 1",
            Some("rakshak watch --interval-secs 5"),
        );
    }
    let zones: Vec<TrackZone> = match zone_id {
        Some(id) => match resolve_zone(config, id) {
            Ok(zone) => vec![zone.clone()],
            Err(code) => return code,
        },
        None => config.zones.clone(),
    };
    if zones.is_empty() {
        exit_error("no track zones configured", Some("Add [[zones]] entries to the config file."));
    }

    let engine = Engine::simulated(config, seed);

    let mut updates = engine.push.subscribe();
    let stream = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(envelope) => print_json_line(&envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "push stream lagged, updates dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    let mut tick: u64 = 0;
    tracing::info!(zones = zones.len(), interval_secs, "watch started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(ticks = tick, "watch interrupted");
                break;
            }
        }

        let zone = &zones[(tick as usize) % zones.len()];
        let outcome = engine.controller.run_single(&zone.id, scenario).await;
        if let Some(error) = &outcome.error {
            print_json_line(&json!({
                "type": "CYCLE_FAILED",
                "zone_id": zone.id,
                "error": error,
                "timestamp": Utc::now(),
            }));
            engine.controller.reset().await;
        }

        for alert in engine.alerts.check_escalations().await {
            print_json_line(&json!({
                "type": "ALERT_ESCALATED",
                "payload": alert,
                "timestamp": Utc::now(),
            }));
        }

        tick += 1;
        if max_ticks.is_some_and(|max| tick >= max) {
            break;
        }
    }

    // Give the stream task a moment to flush envelopes already queued.
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.abort();

    print_json_line(&json!({
        "type": "WATCH_SUMMARY",
        "ticks": tick,
        "controller": engine.controller.status().await,
        "alerts": engine.alerts.status_summary().await,
        "audit": engine.audit.stats().await,
    }));
    0
}
