use tracing::{debug, warn};

use super::retention::Horizon;
use super::retry::{ErrorBudget, RetryPolicy};
use super::PurgeError;
use crate::slack::SlackApi;

/// Outcome counts for the file sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileTally {
    pub deleted: u64,
    pub errors: u64,
}

/// Sweep uploaded files older than the horizon: one files.list pass, then
/// sequential deletes. File volume is tiny next to messages, so no pool.
pub async fn purge_files(
    api: &dyn SlackApi,
    horizon: Horizon,
    retry: RetryPolicy,
    budget: &mut ErrorBudget,
    now_secs: f64,
) -> Result<FileTally, PurgeError> {
    let mut tally = FileTally::default();
    let ts_to = horizon.cutoff_secs(now_secs) as i64;

    let listed = retry
        .run("files.list", budget, move || api.list_files(ts_to))
        .await?;
    tally.errors += u64::from(listed.failures);

    for file in listed.value {
        // files.list's ts_to bound is inclusive; re-check the strict boundary.
        if !horizon.is_expired(now_secs, file.created as f64) {
            continue;
        }
        match api.delete_file(&file.id).await {
            Ok(()) => tally.deleted += 1,
            Err(err) if err.is_file_gone() => {
                debug!("file {} was already gone", file.id);
            }
            Err(err) => {
                warn!("files.delete {} failed: {err}", file.id);
                tally.errors += 1;
                budget.charge()?;
                retry.pause(&err).await;

                let file_id = file.id.as_str();
                let retried = retry
                    .run("files.delete", budget, move || async move {
                        match api.delete_file(file_id).await {
                            Ok(()) => Ok(true),
                            Err(e) if e.is_file_gone() => Ok(false),
                            Err(e) => Err(e),
                        }
                    })
                    .await?;
                tally.errors += u64::from(retried.failures);
                if retried.value {
                    tally.deleted += 1;
                }
            }
        }
    }

    Ok(tally)
}
