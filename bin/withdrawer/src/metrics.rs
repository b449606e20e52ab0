//! Prometheus metrics for the withdrawer.
//!
//! All metrics are aggregated in the [`Metrics`] struct.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;
use withdrawal::{WithdrawalError, WithdrawalState};

/// Aggregated metrics for the withdrawer.
///
/// Metric descriptions are registered with the global registry on creation.
/// Without an installed exporter every record is a no-op.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        describe_counter!(
            "withdrawer_status_checks_total",
            "Withdrawal status derivations by resulting state"
        );
        describe_gauge!(
            "withdrawer_challenge_remaining_seconds",
            "Seconds left in the challenge period of the last watched withdrawal"
        );

        describe_counter!(
            "withdrawer_submissions_total",
            "Prove and finalize submissions by call and outcome"
        );

        describe_histogram!(
            "withdrawer_command_duration_seconds",
            "Duration of each command in seconds"
        );
        describe_gauge!(
            "withdrawer_history_transfers",
            "Transfers found by the last history scan"
        );
    }

    /// Record a derived withdrawal state.
    pub fn record_status(&self, state: &WithdrawalState) {
        counter!("withdrawer_status_checks_total", "state" => state.name()).increment(1);
    }

    /// Set the remaining challenge period.
    pub fn set_challenge_remaining(&self, secs: u64) {
        gauge!("withdrawer_challenge_remaining_seconds").set(secs as f64);
    }

    /// Record the outcome of a prove or finalize submission.
    pub fn record_submission<T>(&self, call: &'static str, result: &Result<T, WithdrawalError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(err) if err.is_user_rejection() => "rejected",
            Err(WithdrawalError::NotReady(_)) => "not_ready",
            Err(WithdrawalError::AlreadyProven(_) | WithdrawalError::AlreadyFinalized(_)) => {
                "already_done"
            }
            Err(_) => "failure",
        };
        counter!("withdrawer_submissions_total", "call" => call, "outcome" => outcome)
            .increment(1);
    }

    /// Record a finished command.
    pub fn record_command(&self, command: &'static str, duration: Duration) {
        histogram!("withdrawer_command_duration_seconds", "command" => command)
            .record(duration.as_secs_f64());
    }

    /// Set the transfer count of the last history scan.
    pub fn set_history_transfers(&self, count: usize) {
        gauge!("withdrawer_history_transfers").set(count as f64);
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
