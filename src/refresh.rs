// src/refresh.rs
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::{self, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::report::ReportAssembler;

const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Owner of a running background refresh. Dropping it also stops the task.
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task and wait for its loop to exit. A reload still running
    /// on the blocking pool is left to finish on its own.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "refresh task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Reload the assembler's tables every `every`, then republish the artifacts
/// when a `page_id` is given. The first reload happens one period after the
/// call. Failures are logged and retried on the next tick.
pub fn spawn_refresh(
    assembler: Arc<ReportAssembler>,
    every: Duration,
    page_id: Option<String>,
) -> RefreshHandle {
    let (stop, mut stop_rx) = watch::channel(false);
    let every = every.max(MIN_PERIOD);

    let join = tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately
        ticker.tick().await;
        info!(period_secs = every.as_secs_f64(), "background refresh started");

        let mut cycle = 0u64;
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
            }
            cycle += 1;

            let assembler = Arc::clone(&assembler);
            let page_id = page_id.clone();
            let work = task::spawn_blocking(move || {
                assembler.refresh()?;
                if let Some(page_id) = page_id.as_deref() {
                    assembler.publish_all(page_id)?;
                }
                Ok::<_, crate::ReportError>(())
            });

            tokio::select! {
                _ = stop_rx.changed() => {
                    warn!(cycle, "stopping with a refresh still in flight");
                    break;
                }
                res = work => match res {
                    Ok(Ok(())) => debug!(cycle, "refresh cycle complete"),
                    Ok(Err(e)) => error!(cycle, error = %e, "refresh failed; retrying next tick"),
                    Err(e) => error!(cycle, error = %e, "refresh cycle panicked"),
                },
            }
        }
        info!(cycles = cycle, "background refresh stopped");
    });

    RefreshHandle { stop, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::TableCache,
        source::{RowSourceAdapter, SourceLocation},
    };
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn write_page(path: &Path, likes: u32) {
        fs::write(
            path,
            format!(
                "Date,Lifetime Total Likes\n\
                 Date,Lifetime likes\n\
                 2020-03-01,{likes}\n"
            ),
        )
        .unwrap();
    }

    fn likes(assembler: &ReportAssembler) -> Option<f64> {
        let report = assembler
            .build_page_report(assembler.page_source())
            .unwrap();
        report.likes.metrics[0].values[0]
    }

    #[tokio::test]
    async fn reloads_on_tick_and_stops() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let page = dir.path().join("page.csv");
        let posts = dir.path().join("posts.csv");
        write_page(&page, 10);
        fs::write(&posts, "Post Message,Lifetime Post Total Reach\nMessage,Lifetime\n")?;

        let assembler = Arc::new(ReportAssembler::new(
            Arc::new(TableCache::new()),
            RowSourceAdapter::files(),
            SourceLocation::File(page.clone()),
            SourceLocation::File(posts),
        ));
        assert_eq!(likes(&assembler), Some(10.0));

        write_page(&page, 25);
        let handle = spawn_refresh(Arc::clone(&assembler), Duration::from_millis(20), None);
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(likes(&assembler), Some(25.0));

        handle.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn failures_do_not_end_the_task() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let page = dir.path().join("page.csv");
        write_page(&page, 1);

        let assembler = Arc::new(ReportAssembler::new(
            Arc::new(TableCache::new()),
            RowSourceAdapter::files(),
            SourceLocation::File(page.clone()),
            SourceLocation::File(dir.path().join("missing.csv")),
        ));
        assert_eq!(likes(&assembler), Some(1.0));

        write_page(&page, 2);
        let handle = spawn_refresh(Arc::clone(&assembler), Duration::from_millis(20), None);
        time::sleep(Duration::from_millis(300)).await;

        // the page reload lands before the posts reload fails
        assert_eq!(likes(&assembler), Some(2.0));
        assert!(!handle.is_finished());
        handle.stop().await;
        Ok(())
    }
}
