//! Process usage logging.

use crate::runner::BoundedRunner;
use tracing::info;

// statm reports pages; 4 KiB covers the platforms we deploy on.
const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSnapshot {
    pub in_flight_uploads: usize,
    /// `None` where `/proc/self/statm` is unavailable.
    pub resident_mib: Option<f64>,
}

pub fn snapshot(runner: &BoundedRunner) -> UsageSnapshot {
    UsageSnapshot {
        in_flight_uploads: runner.in_flight(),
        resident_mib: resident_bytes().map(|b| b as f64 / (1024.0 * 1024.0)),
    }
}

/// Log a usage snapshot as one `info` event and return it.
pub fn log_usage(runner: &BoundedRunner) -> UsageSnapshot {
    let usage = snapshot(runner);
    info!(
        in_flight_uploads = usage.in_flight_uploads,
        resident_mib = usage.resident_mib,
        "usage"
    );
    usage
}

fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm_resident(&statm).map(|pages| pages * PAGE_SIZE)
}

fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}
