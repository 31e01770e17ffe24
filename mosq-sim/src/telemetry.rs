//! Per-operation counters and timings

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Count and cumulative wall time per operation label
///
/// Labels are gate names for `gate` records, `fused_<k>` for dense matrices on
/// `k` qubits, `diagonal` for diagonal matrices, and the operation kind
/// otherwise.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ExecutionTelemetry {
    pub op_counts: BTreeMap<String, usize>,
    pub op_times: BTreeMap<String, Duration>,
    pub total_time: Duration,
    pub error_events: Vec<String>,
}

impl ExecutionTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &str, elapsed: Duration) {
        *self.op_counts.entry(label.to_string()).or_insert(0) += 1;
        *self.op_times.entry(label.to_string()).or_default() += elapsed;
        self.total_time += elapsed;
    }

    pub fn log_error(&mut self, msg: impl Into<String>) {
        self.error_events.push(msg.into());
    }

    pub fn count(&self, label: &str) -> usize {
        self.op_counts.get(label).copied().unwrap_or(0)
    }

    pub fn time(&self, label: &str) -> Duration {
        self.op_times.get(label).copied().unwrap_or_default()
    }

    /// Mean time per recorded operation
    pub fn average_time(&self) -> Duration {
        let total: usize = self.op_counts.values().sum();
        if total == 0 {
            Duration::ZERO
        } else {
            self.total_time / total as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut telemetry = ExecutionTelemetry::new();
        telemetry.record("MOSQ", Duration::from_micros(10));
        telemetry.record("MOSQ", Duration::from_micros(30));
        telemetry.record("fused_2", Duration::from_micros(20));
        assert_eq!(telemetry.count("MOSQ"), 2);
        assert_eq!(telemetry.time("MOSQ"), Duration::from_micros(40));
        assert_eq!(telemetry.total_time, Duration::from_micros(60));
        assert_eq!(telemetry.average_time(), Duration::from_micros(20));
        assert_eq!(telemetry.count("MOSQ_CR"), 0);

        telemetry.log_error("MOSQ_CR: masks overlap");
        assert_eq!(telemetry.error_events.len(), 1);
    }
}
