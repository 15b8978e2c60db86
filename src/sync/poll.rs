use crate::sync::{PullOutcome, SyncEngine};
use crate::Result;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Counts of what happened while polling.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct PollSummary {
    pub pulls: u32,
    pub applied: u32,
    pub up_to_date: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl PollSummary {
    fn record(&mut self, result: Result<PullOutcome>) {
        self.pulls += 1;
        match result {
            Ok(PullOutcome::Applied { entries, .. }) => {
                info!("Applied {entries} entries from the remote record");
                self.applied += 1;
            }
            Ok(PullOutcome::UpToDate { .. }) | Ok(PullOutcome::NoRemoteRecord) => {
                self.up_to_date += 1
            }
            Ok(PullOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                warn!("Pull failed: {e:#}");
                self.failed += 1;
            }
        }
    }
}

/// Pulls once with `force` set, then pulls every `period` until `shutdown` completes.
///
/// Each tick runs on its own task. A tick that fires while an earlier pull is still retrying is
/// turned away by the engine's in-flight flag and counted as skipped. Pulls still running when
/// `shutdown` completes are awaited before returning.
pub async fn run_polling<F>(
    engine: Arc<SyncEngine>,
    period: Duration,
    shutdown: F,
) -> Result<PollSummary>
where
    F: Future<Output = ()>,
{
    let mut summary = PollSummary::default();
    summary.record(engine.pull_with_retry(true).await);

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pulls = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Polling stopped");
                break;
            }
            _ = ticker.tick() => {
                let engine = engine.clone();
                pulls.spawn(async move { engine.pull_with_retry(false).await });
            }
            Some(joined) = pulls.join_next() => {
                summary.record(joined?);
            }
        }
    }

    while let Some(joined) = pulls.join_next().await {
        summary.record(joined?);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DailyEntry, RemoteSnapshot};
    use crate::remote::RemoteStore;
    use crate::sync::RetryPolicy;
    use crate::test::TestEnv;
    use std::collections::BTreeMap;

    const DEADLINE: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_polling_picks_up_remote_changes() {
        let env = TestEnv::new().await;
        let store = env.memory_store();
        let engine = Arc::new(env.engine(RetryPolicy::none()));
        let entry = DailyEntry::new("2025-06-01", BTreeMap::new(), vec![], 1).unwrap();

        // Not polled until the forced first pull is done, so that pull finds no record.
        let shutdown = async {
            store
                .replace(&RemoteSnapshot::new(vec![entry.clone()], 1_000))
                .await
                .unwrap();
            while env.entries().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let summary = tokio::time::timeout(
            DEADLINE,
            run_polling(engine, Duration::from_millis(10), shutdown),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(summary.pulls >= 2);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(env.entries().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_polling_survives_failures() {
        let env = TestEnv::new().await;
        let store = env.memory_store();
        store.fail_next(2);
        let engine = Arc::new(env.engine(RetryPolicy::none()));

        // The first two fetches fail, the next two find no record.
        let shutdown = async {
            while store.request_counts().0 < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let summary = tokio::time::timeout(
            DEADLINE,
            run_polling(engine, Duration::from_millis(10), shutdown),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary.failed, 2);
        assert!(summary.up_to_date >= 2);
        assert_eq!(summary.applied, 0);
    }
}
