//! telemetry/snapshot.rs
//!
//! Immutable summary produced when a stream or pipeline finishes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::telemetry::counters::StreamCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};
use crate::types::StreamError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub counters: StreamCounters,
    /// `bytes_out / bytes_in`; 0 when nothing was read.
    pub size_ratio: f64,
    pub throughput_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
    pub workers: usize,
}

impl TelemetrySnapshot {
    pub fn from(counters: &StreamCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();

        let size_ratio = if counters.bytes_in > 0 {
            counters.bytes_out as f64 / counters.bytes_in as f64
        } else {
            0.0
        };
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_in as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            counters: counters.clone(),
            size_ratio,
            throughput_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn to_json(&self) -> Result<String, StreamError> {
        serde_json::to_string(self).map_err(|e| StreamError::Validation(format!("telemetry serialization: {e}")))
    }
}
