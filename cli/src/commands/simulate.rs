use std::time::Duration;

use rakshak_core::RiskConfig;
use rakshak_engine::Scenario;
use serde_json::json;

use crate::util::{EXIT_CYCLE_FAILED, Engine, exit_error, print_json, resolve_zone};

pub async fn run(
    config: &RiskConfig,
    zone_id: &str,
    scenario: Option<Scenario>,
    cycles: u32,
    seed: Option<u64>,
    evidence_timeout_ms: Option<u64>,
) -> i32 {
    if cycles == 0 {
        exit_error("--cycles must be at least 1", Some("rakshak simulate --cycles 3"));
    }
    let zone = match resolve_zone(config, zone_id) {
        Ok(zone) => zone,
        Err(code) => return code,
    };

    let engine = Engine::simulated(config, seed);
    let mut runs = Vec::with_capacity(cycles as usize);
    let mut failed = 0usize;
    for _ in 0..cycles {
        let outcome = engine
            .controller
            .run_single_within(
                &zone.id,
                scenario,
                evidence_timeout_ms.map(Duration::from_millis),
            )
            .await;
        if !outcome.success {
            failed += 1;
            // Next cycle needs a STOPPED controller.
            engine.controller.reset().await;
        }
        runs.push(outcome);
    }

    let body = json!({
        "zone": zone,
        "scenario": scenario,
        "seed": seed,
        "runs": runs,
        "failed_runs": failed,
        "controller": engine.controller.status().await,
        "alerts": engine.alerts.status_summary().await,
        "audit": engine.audit.stats().await,
        "audit_chain": engine.audit.verify_chain().await,
    });

    let code = print_json(&body);
    if code == 0 && failed > 0 {
        EXIT_CYCLE_FAILED
    } else {
        code
    }
}
