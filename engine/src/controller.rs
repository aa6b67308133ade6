//! Single-flight run controller.
//!
//! `run_gate` is held for a whole cycle so runs never overlap; the run record
//! lock is only held for state transitions so `status()` stays responsive
//! while a cycle is in flight. Both are owned by the spawned run task, not by
//! the caller's future.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rakshak_core::ErrorReport;
use rakshak_core::error::codes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinError;

use crate::pipeline::{CycleError, CycleOutcome, Pipeline};
use crate::simulation::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Stopped,
    Running,
    Error,
}

#[derive(Debug, Clone)]
struct RunRecord {
    state: RunState,
    started_at: Option<DateTime<Utc>>,
    last_run_at: Option<DateTime<Utc>>,
    run_count: u64,
    last_error: Option<String>,
}

impl Default for RunRecord {
    fn default() -> Self {
        Self {
            state: RunState::Stopped,
            started_at: None,
            last_run_at: None,
            run_count: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    pub run_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&RunRecord> for RunStatus {
    fn from(record: &RunRecord) -> Self {
        let message = match record.state {
            RunState::Stopped => "Run controller is stopped. Ready to start.".to_string(),
            RunState::Running => match record.started_at {
                Some(at) => format!("Cycle running since {}", at.to_rfc3339()),
                None => "Cycle running".to_string(),
            },
            RunState::Error => format!(
                "Run controller in ERROR state: {}",
                record.last_error.as_deref().unwrap_or("Unknown error")
            ),
        };
        Self {
            state: record.state,
            message,
            started_at: record.started_at,
            last_run_at: record.last_run_at,
            run_count: record.run_count,
            last_error: record.last_error.clone(),
        }
    }
}

/// Result of one `run_single` call. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<CycleOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    pub state: RunState,
}

pub struct RunController {
    pipeline: Arc<Pipeline>,
    run_gate: Arc<Mutex<()>>,
    record: Arc<Mutex<RunRecord>>,
}

impl RunController {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            run_gate: Arc::new(Mutex::new(())),
            record: Arc::new(Mutex::new(RunRecord::default())),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub async fn run_single(&self, zone_id: &str, scenario: Option<Scenario>) -> RunOutcome {
        self.run_single_within(zone_id, scenario, None).await
    }

    /// Runs one cycle. Callers arriving while a cycle is in flight wait for
    /// it to finish. Every failure, including a panic inside the cycle, is
    /// returned as a failed outcome and leaves the controller in ERROR.
    ///
    /// The gate and every state transition live in a spawned task, so a
    /// caller dropped mid-cycle neither releases the gate early nor leaves
    /// the controller stuck in RUNNING.
    pub async fn run_single_within(
        &self,
        zone_id: &str,
        scenario: Option<Scenario>,
        evidence_timeout: Option<Duration>,
    ) -> RunOutcome {
        let gate = Arc::clone(&self.run_gate).lock_owned().await;
        let pipeline = Arc::clone(&self.pipeline);
        let record = Arc::clone(&self.record);
        let zone = zone_id.to_string();

        let run = tokio::spawn(async move {
            let _gate = gate;
            {
                let mut record = record.lock().await;
                record.state = RunState::Running;
                record.started_at = Some(Utc::now());
                record.last_error = None;
            }
            tracing::info!(
                zone_id = %zone,
                scenario = scenario.map(Scenario::as_str),
                "cycle started"
            );

            let cycle_zone = zone.clone();
            let cycle = tokio::spawn(async move {
                pipeline
                    .run_cycle_at(&cycle_zone, scenario, Utc::now(), evidence_timeout)
                    .await
            })
            .await;
            finish(&record, &zone, cycle).await
        });

        match run.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let failure = ErrorReport::new(
                    codes::INTERNAL_ERROR,
                    format!("run controller task aborted: {join_err}"),
                );
                fail(&self.record, zone_id, failure).await
            }
        }
    }

    /// ERROR → STOPPED. No-op otherwise.
    pub async fn reset(&self) -> RunStatus {
        let mut record = self.record.lock().await;
        match record.state {
            RunState::Error => {
                record.state = RunState::Stopped;
                record.last_error = None;
                tracing::info!("run controller reset from ERROR");
            }
            RunState::Running => {
                tracing::warn!("reset ignored, a cycle is in flight");
            }
            RunState::Stopped => {}
        }
        RunStatus::from(&*record)
    }

    pub async fn status(&self) -> RunStatus {
        let record = self.record.lock().await;
        RunStatus::from(&*record)
    }
}

async fn finish(
    record: &Mutex<RunRecord>,
    zone_id: &str,
    cycle: Result<Result<CycleOutcome, CycleError>, JoinError>,
) -> RunOutcome {
    let failure = match cycle {
        Ok(Ok(outcome)) => {
            let mut record = record.lock().await;
            record.state = RunState::Stopped;
            record.last_run_at = Some(Utc::now());
            record.run_count += 1;
            tracing::info!(
                zone_id,
                run_count = record.run_count,
                classification = %outcome.classification.classification,
                alert_created = outcome.alert.is_some(),
                "cycle finished"
            );
            return RunOutcome {
                success: true,
                result: Some(Box::new(outcome)),
                error: None,
                state: record.state,
            };
        }
        Ok(Err(err)) => err.to_report(),
        Err(join_err) => ErrorReport::new(
            codes::INTERNAL_ERROR,
            format!("classification cycle aborted: {join_err}"),
        ),
    };
    fail(record, zone_id, failure).await
}

async fn fail(record: &Mutex<RunRecord>, zone_id: &str, failure: ErrorReport) -> RunOutcome {
    let mut record = record.lock().await;
    record.state = RunState::Error;
    record.last_error = Some(failure.message.clone());
    tracing::warn!(
        zone_id,
        error = %failure.message,
        code = %failure.error,
        "cycle failed, controller in ERROR"
    );
    RunOutcome {
        success: false,
        result: None,
        error: Some(failure),
        state: record.state,
    }
}
