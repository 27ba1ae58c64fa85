use parking_lot::Mutex;
use serde::Serialize;

/// 保持するレイテンシ記録の上限
const MAX_LATENCY_RECORDS: usize = 1000;

/// ローカルメトリクス収集器
pub struct Metrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    runs_started: u64,
    runs_completed: u64,
    runs_aborted: u64,
    chunks_translated: u64,
    chunks_failed: u64,
    summaries_generated: u64,
    summaries_skipped: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー（実行終了時の表示用）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_aborted: u64,
    pub chunks_translated: u64,
    pub chunks_failed: u64,
    pub summaries_generated: u64,
    pub summaries_skipped: u64,
    pub avg_latency_ms: AvgLatency,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvgLatency {
    pub chunk: Option<f64>,
    pub summary: Option<f64>,
}

pub const PHASE_CHUNK: &str = "chunk";
pub const PHASE_SUMMARY: &str = "summary";

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_runs_started(&self) {
        self.counters.lock().runs_started += 1;
    }

    pub fn inc_runs_completed(&self) {
        self.counters.lock().runs_completed += 1;
    }

    pub fn inc_runs_aborted(&self) {
        self.counters.lock().runs_aborted += 1;
    }

    pub fn inc_chunks_translated(&self) {
        self.counters.lock().chunks_translated += 1;
    }

    pub fn inc_chunks_failed(&self) {
        self.counters.lock().chunks_failed += 1;
    }

    pub fn inc_summaries_generated(&self) {
        self.counters.lock().summaries_generated += 1;
    }

    pub fn inc_summaries_skipped(&self) {
        self.counters.lock().summaries_skipped += 1;
    }

    pub fn record_latency(&self, phase: &str, duration_ms: u64) {
        let record = LatencyRecord {
            phase: phase.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let avg = |phase: &str| -> Option<f64> {
            let vals: Vec<f64> = latencies
                .iter()
                .filter(|r| r.phase == phase)
                .map(|r| r.duration_ms as f64)
                .collect();
            if vals.is_empty() {
                None
            } else {
                Some(vals.iter().sum::<f64>() / vals.len() as f64)
            }
        };

        let recent: Vec<LatencyRecord> = latencies.iter().rev().take(20).cloned().collect();

        MetricsSummary {
            runs_started: c.runs_started,
            runs_completed: c.runs_completed,
            runs_aborted: c.runs_aborted,
            chunks_translated: c.chunks_translated,
            chunks_failed: c.chunks_failed,
            summaries_generated: c.summaries_generated,
            summaries_skipped: c.summaries_skipped,
            avg_latency_ms: AvgLatency {
                chunk: avg(PHASE_CHUNK),
                summary: avg(PHASE_SUMMARY),
            },
            recent_latencies: recent,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
