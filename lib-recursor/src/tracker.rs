//! Per-nameserver performance statistics and selection, after BIND:
//! smoothed RTT with mean deviation, failure backoff with a timed
//! negative hold, and bucketed selection biased towards fast, lightly
//! loaded, recently exercised servers.
//!
//! Time is threaded through the `_at` functions as milliseconds so the
//! backoff and idle behaviour can be tested without real sleeps; the
//! un-suffixed functions read the system clock.

use dashmap::DashMap;
use rand::Rng;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Assumed RTT of a server that has never been measured.
pub const RTT_INITIAL: f64 = 2000.0;

/// Upper bound of the RTT range the selection buckets span.
pub const RTT_MAX: f64 = 4000.0;

/// Weight of the new sample in the SRTT update.
///
/// Note this weights the *new* sample at 0.875, a far higher learning
/// rate than the classical Jacobson-Karels estimator (which puts 0.125
/// on the sample).  The behaviour is kept as-is: the estimator
/// converges near-instantly and the bucketing below only needs a
/// coarse ordering.
pub const RTT_ALPHA: f64 = 0.875;

/// Weight of the new deviation sample in the RTTVAR update.
pub const RTT_BETA: f64 = 0.25;

/// Multiplier applied to SRTT on each failure.
pub const FAILURE_PENALTY: f64 = 2.0;

/// Consecutive failures before a server is marked negative.
pub const MAX_FAILURES: u32 = 3;

/// How long a negative server is held out before it may be retried.
pub const RETRY_INTERVAL_MS: u64 = 30_000;

/// Number of selection buckets spanning `[0, RTT_MAX)`.
pub const BUCKET_COUNT: usize = 64;

/// Percent chance of appending an untested server when the selection
/// is not empty.
pub const UNTESTED_CHANCE: u32 = 10;

/// Idle time beyond which a server's effective RTT starts inflating,
/// so it eventually gets re-probed.
pub const IDLE_THRESHOLD_MS: u64 = 60_000;

/// Effective-RTT inflation per outstanding query.
pub const ACTIVE_LOAD: f64 = 0.1;

/// Effective-RTT inflation per idle threshold elapsed.
pub const IDLE_LOAD: f64 = 0.1;

/// How many servers one selection returns at most.
pub const SELECT_COUNT: usize = 2;

/// What we currently believe about a server.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ServerStatus {
    /// Never exchanged with successfully.
    Untested,
    /// Measured and usable.
    Available,
    /// Failed too often; held out until the deadline passes.
    Negative { until_ms: u64 },
}

/// Statistics for one server.
///
/// The counters are atomic so `start_query` / `end_query` and the
/// selection path can touch an entry through a shared reference; the
/// estimators and status are only mutated under the entry's exclusive
/// guard.  Two concurrent updates settle on one valid interleaving -
/// nothing stronger is needed.
#[derive(Debug)]
pub struct ServerStats {
    srtt: f64,
    rttvar: f64,
    status: ServerStatus,
    last_query_ms: u64,
    failures: AtomicU32,
    active_queries: AtomicU32,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            srtt: RTT_INITIAL,
            rttvar: RTT_INITIAL / 2.0,
            status: ServerStatus::Untested,
            last_query_ms: 0,
            failures: AtomicU32::new(0),
            active_queries: AtomicU32::new(0),
        }
    }
}

impl ServerStats {
    /// Whether the server may be queried, transitioning an expired
    /// negative hold back to available.
    fn is_available_at(&mut self, now_ms: u64) -> bool {
        match self.status {
            ServerStatus::Negative { until_ms } => {
                if now_ms >= until_ms {
                    self.status = ServerStatus::Available;
                    self.failures.store(0, Ordering::Release);
                    true
                } else {
                    false
                }
            }
            _ => true,
        }
    }

    /// The score used for bucketing: base estimate, inflated by
    /// outstanding queries and by time spent idle beyond the
    /// threshold.
    fn effective_rtt_at(&self, now_ms: u64) -> f64 {
        let base = self.srtt + 4.0 * self.rttvar;
        let active = f64::from(self.active_queries.load(Ordering::Acquire));
        let idle_ms = now_ms
            .saturating_sub(self.last_query_ms)
            .saturating_sub(IDLE_THRESHOLD_MS);

        base * (1.0 + active * ACTIVE_LOAD)
            * (1.0 + idle_ms as f64 / IDLE_THRESHOLD_MS as f64 * IDLE_LOAD)
    }
}

fn bucket_index(effective_rtt: f64) -> usize {
    ((effective_rtt * BUCKET_COUNT as f64 / RTT_MAX) as usize).min(BUCKET_COUNT - 1)
}

fn clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The process-wide tracker.  Entries are created lazily the first
/// time a server is observed.
#[derive(Debug, Default)]
pub struct ServerTracker {
    stats: DashMap<Ipv4Addr, ServerStats>,
}

impl ServerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful exchange and its measured RTT.
    pub fn record_success(&self, server: Ipv4Addr, rtt_ms: u64) {
        self.record_success_at(server, rtt_ms, clock_ms());
    }

    pub fn record_success_at(&self, server: Ipv4Addr, rtt_ms: u64, now_ms: u64) {
        let mut entry = self.stats.entry(server).or_default();
        let stats = entry.value_mut();
        let rtt = rtt_ms as f64;

        if matches!(stats.status, ServerStatus::Untested) {
            stats.srtt = rtt;
            stats.rttvar = rtt / 2.0;
        } else {
            let diff = stats.srtt - rtt;
            stats.rttvar = (1.0 - RTT_BETA) * stats.rttvar + RTT_BETA * diff.abs();
            stats.srtt = (1.0 - RTT_ALPHA) * stats.srtt + RTT_ALPHA * rtt;
        }

        stats.status = ServerStatus::Available;
        stats.failures.store(0, Ordering::Release);
        stats.last_query_ms = now_ms;
        tracing::trace!(%server, srtt = stats.srtt, rttvar = stats.rttvar, "rtt updated");
    }

    /// Record a failed exchange: penalise the estimate and, past the
    /// failure limit, hold the server out.
    pub fn record_failure(&self, server: Ipv4Addr) {
        self.record_failure_at(server, clock_ms());
    }

    pub fn record_failure_at(&self, server: Ipv4Addr, now_ms: u64) {
        let mut entry = self.stats.entry(server).or_default();
        let stats = entry.value_mut();

        let failures = stats.failures.fetch_add(1, Ordering::AcqRel) + 1;
        stats.srtt *= FAILURE_PENALTY;
        if failures >= MAX_FAILURES {
            stats.status = ServerStatus::Negative {
                until_ms: now_ms + RETRY_INTERVAL_MS,
            };
            tracing::debug!(%server, %failures, "server marked negative");
        }
        stats.last_query_ms = now_ms;
    }

    /// Note an exchange starting against a server.  Must be balanced
    /// by `end_query` on every path.
    pub fn start_query(&self, server: Ipv4Addr) {
        self.stats
            .entry(server)
            .or_default()
            .active_queries
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Note an exchange against a server completing, however it went.
    pub fn end_query(&self, server: Ipv4Addr) {
        if let Some(stats) = self.stats.get(&server) {
            stats.active_queries.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Pick up to [`SELECT_COUNT`] servers to try, best first:
    ///
    /// 1. Partition candidates into untested and tested-available
    ///    (expired negative holds flip back to available here).
    /// 2. Spread the tested over [`BUCKET_COUNT`] buckets by effective
    ///    RTT and walk the buckets in ascending order, drawing
    ///    uniformly without replacement.
    /// 3. With room left over, append one random untested server:
    ///    always if nothing is selected yet, else with
    ///    [`UNTESTED_CHANCE`] percent probability.
    /// 4. If still empty, fall back to one uniformly random candidate.
    pub fn select(&self, candidates: &[Ipv4Addr]) -> Vec<Ipv4Addr> {
        self.select_at(candidates, clock_ms())
    }

    pub fn select_at(&self, candidates: &[Ipv4Addr], now_ms: u64) -> Vec<Ipv4Addr> {
        let mut rng = rand::rng();
        let mut untested = Vec::new();
        let mut tested = Vec::new();

        for &candidate in candidates {
            if let Some(mut entry) = self.stats.get_mut(&candidate) {
                let stats = entry.value_mut();
                if matches!(stats.status, ServerStatus::Untested) {
                    untested.push(candidate);
                } else if stats.is_available_at(now_ms) {
                    tested.push((candidate, stats.effective_rtt_at(now_ms)));
                }
            } else {
                untested.push(candidate);
            }
        }

        let mut selected = Vec::with_capacity(SELECT_COUNT);

        if !tested.is_empty() {
            let mut buckets: Vec<Vec<Ipv4Addr>> = vec![Vec::new(); BUCKET_COUNT];
            for (candidate, effective_rtt) in tested {
                buckets[bucket_index(effective_rtt)].push(candidate);
            }

            'buckets: for bucket in &mut buckets {
                while !bucket.is_empty() {
                    if selected.len() == SELECT_COUNT {
                        break 'buckets;
                    }
                    let index = rng.random_range(0..bucket.len());
                    selected.push(bucket.swap_remove(index));
                }
            }
        }

        if selected.len() < SELECT_COUNT && !untested.is_empty() {
            if selected.is_empty() || rng.random_range(0..100) < UNTESTED_CHANCE {
                let index = rng.random_range(0..untested.len());
                selected.push(untested[index]);
            }
        }

        if selected.is_empty() && !candidates.is_empty() {
            selected.push(candidates[rng.random_range(0..candidates.len())]);
            tracing::debug!(server = %selected[0], "falling back to a random candidate");
        }

        selected
    }

    /// The current status of a server, if it has ever been observed.
    pub fn status(&self, server: Ipv4Addr) -> Option<ServerStatus> {
        self.stats.get(&server).map(|stats| stats.status)
    }

    /// How many exchanges are outstanding against a server.
    pub fn active_queries(&self, server: Ipv4Addr) -> u32 {
        self.stats
            .get(&server)
            .map_or(0, |stats| stats.active_queries.load(Ordering::Acquire))
    }
}
