//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Submission path metrics
pub struct Metrics {
    registry: Registry,

    // Counters
    pub instructions_appended: IntCounter,
    pub broadcast_attempts: IntCounter,
    pub broadcast_failures: IntCounter,
    pub submissions_exhausted: IntCounter,
    pub reconciled_broadcasts: IntCounter,
    pub confirmations_finalized: IntCounter,
    pub confirmations_abandoned: IntCounter,
    pub transactions_failed: IntCounter,

    // Histograms
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let instructions_appended = IntCounter::with_opts(Opts::new(
            "flash_loan_instructions_appended_total",
            "Flash borrow/repay instructions appended to batches",
        ))?;

        let broadcast_attempts = IntCounter::with_opts(Opts::new(
            "flash_loan_broadcast_attempts_total",
            "Broadcast attempts, including retries",
        ))?;

        let broadcast_failures = IntCounter::with_opts(Opts::new(
            "flash_loan_broadcast_failures_total",
            "Broadcast attempts that returned an error",
        ))?;

        let submissions_exhausted = IntCounter::with_opts(Opts::new(
            "flash_loan_submissions_exhausted_total",
            "Submissions that used up every broadcast attempt",
        ))?;

        let reconciled_broadcasts = IntCounter::with_opts(Opts::new(
            "flash_loan_reconciled_broadcasts_total",
            "Failed broadcasts later found on the ledger",
        ))?;

        let confirmations_finalized = IntCounter::with_opts(Opts::new(
            "flash_loan_confirmations_finalized_total",
            "Transactions observed at finalized commitment",
        ))?;

        let confirmations_abandoned = IntCounter::with_opts(Opts::new(
            "flash_loan_confirmations_abandoned_total",
            "Confirmation waits cancelled or timed out",
        ))?;

        let transactions_failed = IntCounter::with_opts(Opts::new(
            "flash_loan_transactions_failed_total",
            "Finalized transactions that carried an execution error",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "flash_loan_confirmation_latency_seconds",
                "Time from successful broadcast to finalized status",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 120.0]),
        )?;

        registry.register(Box::new(instructions_appended.clone()))?;
        registry.register(Box::new(broadcast_attempts.clone()))?;
        registry.register(Box::new(broadcast_failures.clone()))?;
        registry.register(Box::new(submissions_exhausted.clone()))?;
        registry.register(Box::new(reconciled_broadcasts.clone()))?;
        registry.register(Box::new(confirmations_finalized.clone()))?;
        registry.register(Box::new(confirmations_abandoned.clone()))?;
        registry.register(Box::new(transactions_failed.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            instructions_appended,
            broadcast_attempts,
            broadcast_failures,
            submissions_exhausted,
            reconciled_broadcasts,
            confirmations_finalized,
            confirmations_abandoned,
            transactions_failed,
            confirmation_latency,
        })
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}
