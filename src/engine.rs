//! Poll loop: the engine's single sequential worker.
//!
//! Each cycle fetches a lookback window of readings, classifies them, and
//! reconciles matches against the alert ledger. Adjacent windows overlap
//! (enforced at config load), so a reading near a cycle boundary is seen
//! twice rather than never; the `(source_reading_id, kind)` dedup key makes
//! that reprocessing a no-op.
//!
//! Failure isolation happens at two levels: a failed reading is logged and
//! skipped without aborting the rest of the batch, and a failed cycle is
//! logged at the loop boundary and retried on the next tick. Nothing short
//! of a shutdown signal terminates the loop.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::feed::ReadingFeed;
use crate::ledger::AlertLedger;
use crate::models::{NewAlert, Reading};
use crate::rules;
use crate::Config;

// ---

/// Outcome counters for one poll cycle, logged at the cycle boundary.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    // ---
    /// Readings returned by the windowed fetch.
    pub fetched: usize,
    /// Readings the classifier matched to a rule.
    pub matched: usize,
    /// Alerts actually inserted (matches minus dedup hits).
    pub created: usize,
    /// Readings whose reconcile step errored and was skipped.
    pub failed: usize,
}

/// Long-running scheduler that drives fetch → classify → reconcile cycles.
pub struct PollLoop<F, L> {
    // ---
    feed: F,
    ledger: L,
    lookback: chrono::Duration,
    interval: Duration,
    startup_delay: Duration,
    fetch_timeout: Duration,
}

impl<F, L> PollLoop<F, L>
where
    F: ReadingFeed,
    L: AlertLedger,
{
    pub fn new(feed: F, ledger: L, cfg: &Config) -> Self {
        // ---
        Self {
            feed,
            ledger,
            lookback: chrono::Duration::seconds(cfg.lookback_window_secs as i64),
            interval: Duration::from_secs(cfg.poll_interval_secs as u64),
            startup_delay: Duration::from_secs(cfg.startup_delay_secs as u64),
            fetch_timeout: Duration::from_secs(cfg.fetch_timeout_secs as u64),
        }
    }

    /// Run cycles forever until the shutdown channel fires.
    ///
    /// A one-time startup delay precedes the first fetch so a fresh
    /// deployment does not burst alerts off stale buffered readings.
    /// Both the delay and the inter-cycle sleep are cancellable.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        // ---
        info!(
            lookback_secs = self.lookback.num_seconds(),
            interval_secs = self.interval.as_secs(),
            startup_delay_secs = self.startup_delay.as_secs(),
            "Alert engine poll loop starting"
        );

        if !self.sleep_or_shutdown(self.startup_delay, &mut shutdown).await {
            info!("Shutdown requested during startup delay");
            return;
        }

        loop {
            match self.run_cycle().await {
                Ok(stats) => {
                    if stats.created > 0 || stats.failed > 0 {
                        info!(
                            fetched = stats.fetched,
                            matched = stats.matched,
                            created = stats.created,
                            failed = stats.failed,
                            "Poll cycle complete"
                        );
                    } else {
                        debug!(fetched = stats.fetched, "Poll cycle complete, no new alerts");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Poll cycle failed; retrying next cycle");
                }
            }

            if !self.sleep_or_shutdown(self.interval, &mut shutdown).await {
                info!("Shutdown requested, poll loop stopping");
                return;
            }
        }
    }

    /// Execute one fetch → classify → reconcile cycle.
    ///
    /// Per-reading errors are isolated (counted in `failed`, logged, the
    /// batch continues); only fetch-level failures abort the cycle.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        // ---
        let cutoff = Utc::now() - self.lookback;

        let readings = tokio::time::timeout(self.fetch_timeout, self.feed.fetch_since(cutoff))
            .await
            .map_err(|_| {
                anyhow!(
                    "reading fetch timed out after {}s",
                    self.fetch_timeout.as_secs()
                )
            })??;

        let mut stats = CycleStats {
            fetched: readings.len(),
            ..CycleStats::default()
        };

        for reading in &readings {
            match self.reconcile(reading).await {
                Ok(Reconciled::NoMatch) => {}
                Ok(Reconciled::Duplicate) => {
                    stats.matched += 1;
                }
                Ok(Reconciled::Created) => {
                    stats.matched += 1;
                    stats.created += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        reading_id = %reading.id,
                        apartment_id = %reading.apartment_id,
                        error = %e,
                        "Failed to reconcile reading; skipping"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Classify one reading and insert an alert if none exists for its
    /// dedup key.
    async fn reconcile(&self, reading: &Reading) -> Result<Reconciled> {
        // ---
        let Some(classification) = rules::classify(reading) else {
            return Ok(Reconciled::NoMatch);
        };

        let kind = classification.kind;
        if self.ledger.alert_exists(reading.id, kind).await? {
            return Ok(Reconciled::Duplicate);
        }

        let alert = NewAlert::from_classification(reading, classification);
        if self.ledger.insert_alert(&alert).await? {
            info!(
                apartment_id = %alert.apartment_id,
                room = %alert.room,
                kind = alert.kind.as_str(),
                severity = alert.severity.as_str(),
                "Alert: {}",
                alert.message
            );
            Ok(Reconciled::Created)
        } else {
            // Another writer won the race; the unique index absorbed it.
            debug!(
                reading_id = %reading.id,
                kind = kind.as_str(),
                "Insert swallowed by dedup constraint"
            );
            Ok(Reconciled::Duplicate)
        }
    }

    /// Sleep for `duration` unless shutdown fires first.
    /// Returns false when the loop should stop.
    async fn sleep_or_shutdown(
        &self,
        duration: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        // ---
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = shutdown.changed() => false,
        }
    }
}

/// Per-reading reconcile outcome.
enum Reconciled {
    NoMatch,
    Duplicate,
    Created,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::AlertKind;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    // In-memory collaborators standing in for the PostgreSQL store.

    struct FakeFeed {
        // One Vec<Reading> per cycle; errors simulate store outages.
        batches: Mutex<Vec<Result<Vec<Reading>>>>,
    }

    impl FakeFeed {
        fn new(batches: Vec<Result<Vec<Reading>>>) -> Self {
            Self {
                batches: Mutex::new(batches),
            }
        }
    }

    #[async_trait]
    impl ReadingFeed for FakeFeed {
        async fn fetch_since(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Reading>> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                return Ok(Vec::new());
            }
            batches.remove(0)
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        alerts: Mutex<Vec<NewAlert>>,
        keys: Mutex<HashSet<(Uuid, AlertKind)>>,
        exists_calls: AtomicUsize,
    }

    #[async_trait]
    impl AlertLedger for FakeLedger {
        async fn alert_exists(&self, source_reading_id: Uuid, kind: AlertKind) -> Result<bool> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.keys.lock().unwrap().contains(&(source_reading_id, kind)))
        }

        async fn insert_alert(&self, alert: &NewAlert) -> Result<bool> {
            let mut keys = self.keys.lock().unwrap();
            if !keys.insert((alert.source_reading_id, alert.kind)) {
                return Ok(false);
            }
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(true)
        }
    }

    /// Ledger whose existence check always errors, for per-reading isolation.
    struct BrokenLedger;

    #[async_trait]
    impl AlertLedger for BrokenLedger {
        async fn alert_exists(&self, _: Uuid, _: AlertKind) -> Result<bool> {
            Err(anyhow!("connection reset"))
        }

        async fn insert_alert(&self, _: &NewAlert) -> Result<bool> {
            Err(anyhow!("connection reset"))
        }
    }

    fn test_config() -> Config {
        // ---
        Config {
            db_url: "postgres://unused".to_string(),
            db_pool_max: 1,
            lookback_window_secs: 10,
            poll_interval_secs: 5,
            startup_delay_secs: 0,
            fetch_timeout_secs: 1,
            http_port: 0,
        }
    }

    fn reading(sensor_type: &str, value: serde_json::Value) -> Reading {
        // ---
        Reading {
            id: Uuid::new_v4(),
            apartment_id: "A-101".to_string(),
            room: Some("room-1".to_string()),
            sensor_type: sensor_type.to_string(),
            value,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn mixed_batch_creates_alerts_only_for_matches() {
        // ---
        let batch = vec![
            reading("smoke", json!(1)),
            reading("temperature", json!(40.0)),
            reading("temperature", json!(5.0)),
            reading("humidity", json!(50.0)),
        ];
        let feed = FakeFeed::new(vec![Ok(batch)]);
        let ledger = FakeLedger::default();
        let engine = PollLoop::new(feed, ledger, &test_config());

        let stats = engine.run_cycle().await.unwrap();

        assert_eq!(stats.fetched, 4);
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.created, 3);
        assert_eq!(stats.failed, 0);

        let kinds: Vec<AlertKind> = engine
            .ledger
            .alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.kind)
            .collect();
        assert!(kinds.contains(&AlertKind::FireSafety));
        assert!(kinds.contains(&AlertKind::HighTemp));
        assert!(kinds.contains(&AlertKind::LowTemp));
        assert!(!kinds.contains(&AlertKind::Humidity));
    }

    #[tokio::test]
    async fn same_reading_across_overlapping_cycles_yields_one_alert() {
        // ---
        let smoke = reading("smoke", json!(1));
        let feed = FakeFeed::new(vec![Ok(vec![smoke.clone()]), Ok(vec![smoke.clone()])]);
        let ledger = FakeLedger::default();
        let engine = PollLoop::new(feed, ledger, &test_config());

        let first = engine.run_cycle().await.unwrap();
        let second = engine.run_cycle().await.unwrap();

        assert_eq!(first.created, 1);
        assert_eq!(second.created, 0);
        assert_eq!(second.matched, 1); // classified again, deduped

        let alerts = engine.ledger.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source_reading_id, smoke.id);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_cycle_but_next_cycle_recovers() {
        // ---
        let feed = FakeFeed::new(vec![
            Err(anyhow!("store unreachable")),
            Ok(vec![reading("smoke", json!(true))]),
        ]);
        let ledger = FakeLedger::default();
        let engine = PollLoop::new(feed, ledger, &test_config());

        let first = engine.run_cycle().await;
        assert!(first.is_err());

        let second = engine.run_cycle().await.unwrap();
        assert_eq!(second.created, 1);
    }

    #[tokio::test]
    async fn ledger_failure_isolates_per_reading() {
        // ---
        let batch = vec![
            reading("smoke", json!(1)),
            reading("temperature", json!(40.0)),
            reading("noise", json!(80.0)),
        ];
        let feed = FakeFeed::new(vec![Ok(batch)]);
        let engine = PollLoop::new(feed, BrokenLedger, &test_config());

        // The two rule matches fail at the ledger; the no-match reading
        // never touches it. The cycle itself still completes.
        let stats = engine.run_cycle().await.unwrap();
        assert_eq!(stats.fetched, 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.created, 0);
    }

    #[tokio::test]
    async fn reading_without_room_still_produces_alert() {
        // ---
        let mut smoke = reading("smoke", json!(1));
        smoke.room = None;
        let feed = FakeFeed::new(vec![Ok(vec![smoke])]);
        let ledger = FakeLedger::default();
        let engine = PollLoop::new(feed, ledger, &test_config());

        let stats = engine.run_cycle().await.unwrap();
        assert_eq!(stats.created, 1);

        let alerts = engine.ledger.alerts.lock().unwrap();
        assert_eq!(alerts[0].room, "");
        assert_eq!(alerts[0].message, "CRITICAL: Smoke detected in !");
    }

    #[tokio::test]
    async fn slow_fetch_hits_the_cycle_timeout() {
        // ---
        struct SlowFeed;

        #[async_trait]
        impl ReadingFeed for SlowFeed {
            async fn fetch_since(&self, _cutoff: DateTime<Utc>) -> Result<Vec<Reading>> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }

        let engine = PollLoop::new(SlowFeed, FakeLedger::default(), &test_config());

        // Paused clock: the timeout fires via auto-advance, no real waiting.
        tokio::time::pause();
        let result = engine.run_cycle().await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn run_honors_shutdown_during_sleep() {
        // ---
        let feed = FakeFeed::new(vec![]);
        let ledger = FakeLedger::default();
        let mut cfg = test_config();
        cfg.startup_delay_secs = 3600;
        let engine = PollLoop::new(feed, ledger, &cfg);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            engine.run(rx).await;
        });

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop promptly on shutdown")
            .unwrap();
    }
}
