//! Metrics collection.
//!
//! Prometheus-compatible counters for phase outcomes, strikes and attempt
//! results. Every label value comes from a closed enum, so cardinality is
//! fixed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::DefuseError;
use crate::phase::{Outcome, PhaseId};
use crate::verdict::Overall;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// With `Some(port)` a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`; with `None` the recorder is installed without an
/// endpoint. Later calls are no-ops.
///
/// # Errors
///
/// Returns `DefuseError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), DefuseError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| DefuseError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "defuse_phase_outcomes_total",
        "Phases that reached a terminal outcome"
    );
    describe_counter!("defuse_strikes_total", "Strikes charged");
    describe_gauge!("defuse_strikes_remaining", "Strikes left in the current attempt");
    describe_counter!("defuse_attempts_total", "Finished attempts by outcome");
    describe_histogram!(
        "defuse_attempt_duration_ms",
        "Wall time of finished attempts in milliseconds"
    );
}

/// Records a phase settling on `outcome`.
pub fn record_phase_outcome(phase: PhaseId, outcome: Outcome) {
    let outcome = match outcome {
        Outcome::Solved => "solved",
        Outcome::Failed => "failed",
        Outcome::Running => return,
    };
    counter!(
        "defuse_phase_outcomes_total",
        "phase" => phase.as_str(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Records a strike and the budget left after it.
pub fn record_strike(strikes_remaining: u32) {
    counter!("defuse_strikes_total").increment(1);
    gauge!("defuse_strikes_remaining").set(f64::from(strikes_remaining));
}

/// Sets the strikes gauge at attempt start.
pub fn set_strikes_remaining(strikes_remaining: u32) {
    gauge!("defuse_strikes_remaining").set(f64::from(strikes_remaining));
}

/// Records a finished attempt.
pub fn record_attempt(overall: Overall, elapsed: Duration) {
    counter!("defuse_attempts_total", "overall" => overall.as_str()).increment(1);
    histogram!("defuse_attempt_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}
