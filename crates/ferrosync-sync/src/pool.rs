//! Bounded task pool with named groups
//!
//! `Fetch` and `Copy` share one semaphore each across the whole run, so the
//! number of store calls in flight per group never exceeds its cap no matter
//! how wide the tree fans out. `Descend` is a per-namespace width: a join
//! drives at most that many child visits at once and returns their results
//! in submission order.

use crate::options::SyncOptions;
use ferrosync_types::{Error, Result};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;
use tokio::sync::Semaphore;

/// Named task groups with independent caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskGroup {
    /// Metadata fetches
    Fetch,
    /// Content copies, namespace writes and removals
    Copy,
    /// Child visits of one namespace
    Descend,
}

impl fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Copy => write!(f, "copy"),
            Self::Descend => write!(f, "descend"),
        }
    }
}

/// Task pool shared by every entry of one run
#[derive(Debug)]
pub struct TaskPool {
    fetch: Semaphore,
    copy: Semaphore,
    descend_width: usize,
}

impl TaskPool {
    /// Create a pool with explicit caps; zero is raised to one
    pub fn new(fetch: usize, copy: usize, descend: usize) -> Self {
        Self {
            fetch: Semaphore::new(fetch.max(1)),
            copy: Semaphore::new(copy.max(1)),
            descend_width: descend.max(1),
        }
    }

    /// Create a pool from run options; serial mode gives every group a cap of one
    pub fn from_options(options: &SyncOptions) -> Self {
        Self::new(
            options.fetch_limit(),
            options.copy_limit(),
            options.descend_limit(),
        )
    }

    /// Run one task in `group`, holding a permit only while it runs
    pub async fn run<F, T>(&self, group: TaskGroup, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let semaphore = match group {
            TaskGroup::Fetch => &self.fetch,
            TaskGroup::Copy => &self.copy,
            TaskGroup::Descend => return task.await,
        };
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| Error::other(format!("{} pool closed: {}", group, e)))?;
        task.await
    }

    /// Drive `tasks` at most `descend` at a time; results keep submission order
    pub async fn join<I, F, T>(&self, tasks: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        stream::iter(tasks)
            .buffered(self.descend_width)
            .collect()
            .await
    }

    /// Fan-out width of one namespace
    #[cfg(test)]
    pub(crate) fn descend_width(&self) -> usize {
        self.descend_width
    }

    /// Permits currently free in a semaphore-backed group
    #[cfg(test)]
    pub(crate) fn available(&self, group: TaskGroup) -> usize {
        match group {
            TaskGroup::Fetch => self.fetch.available_permits(),
            TaskGroup::Copy => self.copy.available_permits(),
            TaskGroup::Descend => self.descend_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_keeps_submission_order() {
        let pool = TaskPool::new(4, 4, 4);
        let tasks = (0..10u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(10 - i)).await;
            i
        });
        let results = pool.join(tasks).await;
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fetch_cap_is_respected() {
        let pool = Arc::new(TaskPool::new(2, 1, 8));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let pool = Arc::clone(&pool);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                pool.run(TaskGroup::Fetch, async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }
        });
        let results = pool.join(tasks).await;

        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(TaskGroup::Fetch), 2);
    }

    #[tokio::test]
    async fn test_serial_pool() {
        let options = SyncOptions::new().serial(true);
        let pool = TaskPool::from_options(&options);
        assert_eq!(pool.descend_width(), 1);
        assert_eq!(pool.available(TaskGroup::Copy), 1);

        let value = pool.run(TaskGroup::Copy, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
