use std::path::Path;
use std::sync::Arc;

use rakshak_core::{ErrorReport, RiskConfig, TrackZone, codes};
use rakshak_engine::{
    AlertManager, AuditLog, BroadcastPushSink, Pipeline, RunController, SimulatedImageProvider,
    SimulatedSensorProvider,
};
use serde::Serialize;
use serde_json::json;

/// Exit code for caller mistakes (bad zone, bad config).
pub const EXIT_USAGE: i32 = 1;
/// Exit code for failed classification cycles.
pub const EXIT_CYCLE_FAILED: i32 = 2;

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(EXIT_USAGE);
}

/// Prints a structured error on stderr and returns `exit_code`.
pub fn report_error(report: &ErrorReport, exit_code: i32) -> i32 {
    eprintln!("{}", pretty(report));
    exit_code
}

pub fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            println!("{body}");
            0
        }
        Err(e) => {
            let report = ErrorReport::new(
                codes::INTERNAL_ERROR,
                format!("failed to serialize output: {e}"),
            );
            report_error(&report, EXIT_CYCLE_FAILED)
        }
    }
}

/// One JSON document per line, for streaming output.
pub fn print_json_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to serialize stream item"),
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Loads and validates the configuration, exiting with a structured error on failure.
pub fn load_config(path: Option<&Path>) -> RiskConfig {
    match RiskConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            let report = ErrorReport::new(codes::CONFIG_INVALID, e.to_string()).with_docs_hint(
                "Check the file passed via --config / RAKSHAK_CONFIG and any RAKSHAK_* overrides.",
            );
            std::process::exit(report_error(&report, EXIT_USAGE));
        }
    }
}

/// Resolves a zone id against the configuration, or returns the exit code
/// after reporting the failure.
pub fn resolve_zone<'a>(config: &'a RiskConfig, zone_id: &str) -> Result<&'a TrackZone, i32> {
    config.zone(zone_id).map_err(|e| {
        let report = ErrorReport::new(codes::NOT_FOUND, e.to_string())
            .with_field("zone")
            .with_received(json!(zone_id))
            .with_docs_hint("Run `rakshak zones` to list the configured zone ids.");
        report_error(&report, EXIT_USAGE)
    })
}

/// Everything a command needs to drive cycles against simulated evidence.
pub struct Engine {
    pub controller: RunController,
    pub alerts: Arc<AlertManager>,
    pub audit: Arc<AuditLog>,
    pub push: Arc<BroadcastPushSink>,
}

impl Engine {
    pub fn simulated(config: &RiskConfig, seed: Option<u64>) -> Self {
        let audit = Arc::new(AuditLog::new(config.audit.max_entries));
        let push = Arc::new(BroadcastPushSink::new(config.pipeline.push_channel_capacity));
        let alerts = Arc::new(AlertManager::new(config).with_audit_sink(audit.clone()));

        let camera = Arc::new(SimulatedImageProvider::new(config.vision.clone(), seed));
        let sensors = Arc::new(SimulatedSensorProvider::new(seed.map(|s| s.wrapping_add(1))));
        let pipeline = Pipeline::new(config, camera, sensors, alerts.clone())
            .with_push_sink(push.clone())
            .with_audit_sink(audit.clone());

        Self {
            controller: RunController::new(Arc::new(pipeline)),
            alerts,
            audit,
            push,
        }
    }
}
