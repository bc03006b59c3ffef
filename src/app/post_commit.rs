//! Best-effort secondary writes run after a primary write commits.
//!
//! Tasks run one after another; a failing task is logged and skipped, never
//! propagated to the caller of the primary write.

use crate::storage::StoreError;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PostCommitSummary {
    pub completed: usize,
    pub failed: Vec<String>,
}

#[derive(Default)]
pub struct PostCommitTasks<'a> {
    tasks: Vec<(String, TaskFuture<'a>)>,
}

impl<'a> PostCommitTasks<'a> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn push<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'a,
    {
        self.tasks.push((label.into(), Box::pin(task)));
    }

    pub async fn run(self) -> PostCommitSummary {
        let mut summary = PostCommitSummary::default();
        for (label, task) in self.tasks {
            match task.await {
                Ok(()) => summary.completed += 1,
                Err(e) => {
                    warn!(task = %label, error = %e, "post-commit task failed");
                    summary.failed.push(label);
                }
            }
        }
        summary
    }
}
