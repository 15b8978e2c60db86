use crate::commands::{require_user, Out};
use crate::remote::Mode;
use crate::sync::{self, PollSummary, PullOutcome, PushOutcome, SyncEngine};
use crate::{Config, Result};
use anyhow::bail;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Handles `ledger sync up`: replaces the shared record with the local entries.
///
/// # Errors
/// - Returns an error when nobody is logged in, the local ledger is empty, or the push fails.
pub async fn sync_up(config: Config, mode: Mode) -> Result<Out<PushOutcome>> {
    let user = require_user(&config).await?;
    // Precondition: pushing an empty ledger would wipe the shared record.
    if config.db().count_entries().await? == 0 {
        bail!("The local ledger has no entries, run 'ledger sync down' to get data");
    }
    let engine = SyncEngine::new(&config, &user, mode)?;
    let outcome = engine.push().await?;
    let message = match outcome {
        PushOutcome::Pushed { entries, .. } => {
            format!("Pushed {entries} entries to {}", engine.location())
        }
        PushOutcome::Skipped => "Another sync is running, nothing was pushed".to_string(),
    };
    Ok(Out::new(message, outcome))
}

/// Handles `ledger sync down`: pulls the shared record, retrying on failure. With `force` the
/// local entries are replaced even when the shared record is not newer.
pub async fn sync_down(config: Config, mode: Mode, force: bool) -> Result<Out<PullOutcome>> {
    let user = require_user(&config).await?;
    let engine = SyncEngine::new(&config, &user, mode)?;
    let outcome = engine.pull_with_retry(force).await?;
    let message = match outcome {
        PullOutcome::Applied { entries, .. } => {
            format!("Pulled {entries} entries from {}", engine.location())
        }
        PullOutcome::UpToDate { .. } => "Already up to date".to_string(),
        PullOutcome::NoRemoteRecord => {
            format!("There is no record at {} yet", engine.location())
        }
        PullOutcome::Skipped => "Another sync is running, nothing was pulled".to_string(),
    };
    Ok(Out::new(message, outcome))
}

/// Handles `ledger watch`: polls the shared record until `shutdown` completes. The CLI passes
/// Ctrl-C as `shutdown`.
pub async fn watch<F>(
    config: Config,
    mode: Mode,
    interval: Option<Duration>,
    shutdown: F,
) -> Result<Out<PollSummary>>
where
    F: Future<Output = ()>,
{
    let user = require_user(&config).await?;
    let period = interval.unwrap_or_else(|| config.poll_interval());
    let engine = Arc::new(SyncEngine::new(&config, &user, mode)?);
    info!(
        "Watching {} every {}s, press Ctrl-C to stop",
        engine.location(),
        period.as_secs()
    );
    let summary = sync::run_polling(engine, period, shutdown).await?;
    Ok(Out::new(
        format!(
            "Stopped after {} pulls: {} applied, {} failed",
            summary.pulls, summary.applied, summary.failed
        ),
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DailyEntry, RemoteSnapshot};
    use crate::remote::RemoteStore;
    use crate::test::TestEnv;
    use std::collections::BTreeMap;

    fn entry(date: &str) -> DailyEntry {
        DailyEntry::new(date, BTreeMap::new(), vec![], 1).unwrap()
    }

    #[tokio::test]
    async fn test_sync_up_requires_entries() {
        let env = TestEnv::new().await;
        let err = sync_up(env.config(), Mode::Testing).await.unwrap_err();
        assert!(err.to_string().contains("no entries"));
        assert!(env.memory_store().raw().is_none());
    }

    #[tokio::test]
    async fn test_sync_up_then_down_on_another_device() {
        let phone = TestEnv::new().await;
        let laptop = TestEnv::sharing_remote_with(&phone).await;
        phone.set_entries(&[entry("2025-05-01")]).await;

        let out = sync_up(phone.config(), Mode::Testing).await.unwrap();
        assert!(matches!(
            out.structure(),
            Some(PushOutcome::Pushed { entries: 1, .. })
        ));

        let out = sync_down(laptop.config(), Mode::Testing, false).await.unwrap();
        assert!(out.message().starts_with("Pulled 1 entries"));
        assert_eq!(laptop.entries().await, phone.entries().await);

        let out = sync_down(laptop.config(), Mode::Testing, false).await.unwrap();
        assert_eq!(out.message(), "Already up to date");
    }

    #[tokio::test]
    async fn test_sync_down_uses_sync_token() {
        let env = TestEnv::new().await;
        let mut user = env.config().db().load_user().await.unwrap().unwrap();
        user.sync_token = Some("family-secret".to_string());
        env.config().db().save_user(Some(&user)).await.unwrap();

        // The shared record under the default key is not the one this user reads.
        env.memory_store()
            .replace(&RemoteSnapshot::new(vec![entry("2025-05-01")], 5))
            .await
            .unwrap();
        let out = sync_down(env.config(), Mode::Testing, true).await.unwrap();
        assert!(out.message().starts_with("There is no record"));
        assert!(out.message().contains("family-secret"));
        assert!(env.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let env = TestEnv::new().await;
        let store = env.memory_store();
        let shutdown = async {
            while store.request_counts().0 < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        let out = tokio::time::timeout(
            Duration::from_secs(10),
            watch(
                env.config(),
                Mode::Testing,
                Some(Duration::from_millis(10)),
                shutdown,
            ),
        )
        .await
        .unwrap()
        .unwrap();
        let summary = out.structure().unwrap();
        assert!(summary.pulls >= 2);
        assert_eq!(summary.failed, 0);
    }
}
