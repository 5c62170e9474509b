//! Supervised task spawner
//!
//! Owns every spawned delivery task so that none is detached. Each task carries
//! a context value that is handed back with its result, including when the task
//! panicked or was cancelled.

use std::collections::HashMap;
use std::future::Future;
use tokio::task::{Id, JoinError, JoinSet};

/// A finished task: its context and how it ended
pub type Finished<C, T> = (C, Result<T, JoinError>);

pub struct TaskSupervisor<C, T> {
    tasks: JoinSet<T>,
    contexts: HashMap<Id, C>,
}

impl<C, T> TaskSupervisor<C, T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            contexts: HashMap::new(),
        }
    }

    /// Spawn `task` on the current runtime and remember `context` for it.
    pub fn spawn<F>(&mut self, context: C, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.contexts.insert(handle.id(), context);
    }

    /// Number of tasks not yet reaped
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Collect tasks that already finished without waiting.
    pub fn reap(&mut self) -> Vec<Finished<C, T>> {
        let mut finished = Vec::new();
        while let Some(result) = self.tasks.try_join_next_with_id() {
            if let Some(done) = self.attach(result) {
                finished.push(done);
            }
        }
        finished
    }

    /// Wait for the next task to finish; `None` once all are reaped.
    pub async fn join_next(&mut self) -> Option<Finished<C, T>> {
        loop {
            let result = self.tasks.join_next_with_id().await?;
            if let Some(done) = self.attach(result) {
                return Some(done);
            }
        }
    }

    /// Wait for every outstanding task.
    pub async fn drain(&mut self) -> Vec<Finished<C, T>> {
        let mut finished = Vec::with_capacity(self.len());
        while let Some(done) = self.join_next().await {
            finished.push(done);
        }
        finished
    }

    fn attach(&mut self, result: Result<(Id, T), JoinError>) -> Option<Finished<C, T>> {
        match result {
            Ok((id, value)) => self.contexts.remove(&id).map(|ctx| (ctx, Ok(value))),
            Err(e) => self.contexts.remove(&e.id()).map(|ctx| (ctx, Err(e))),
        }
    }
}

impl<C, T> Default for TaskSupervisor<C, T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_returns_every_context() {
        let mut supervisor = TaskSupervisor::new();
        for i in 0..5u32 {
            supervisor.spawn(i, async move {
                tokio::time::sleep(Duration::from_millis(5 * u64::from(i))).await;
                i * 10
            });
        }
        assert_eq!(supervisor.len(), 5);

        let mut finished = supervisor.drain().await;
        finished.sort_by_key(|(ctx, _)| *ctx);

        assert!(supervisor.is_empty());
        assert_eq!(finished.len(), 5);
        for (ctx, result) in finished {
            assert_eq!(result.unwrap(), ctx * 10);
        }
    }

    #[tokio::test]
    async fn test_panic_is_reported_with_context() {
        let mut supervisor: TaskSupervisor<&str, ()> = TaskSupervisor::new();
        supervisor.spawn("bad", async { panic!("boom") });
        supervisor.spawn("good", async {});

        let finished = supervisor.drain().await;
        let bad = finished.iter().find(|(ctx, _)| *ctx == "bad").unwrap();
        let good = finished.iter().find(|(ctx, _)| *ctx == "good").unwrap();

        assert!(bad.1.as_ref().unwrap_err().is_panic());
        assert!(good.1.is_ok());
    }

    #[tokio::test]
    async fn test_reap_does_not_wait() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        assert!(supervisor.reap().is_empty());
        assert_eq!(supervisor.len(), 1);
    }
}
