//! Best-effort work that must never fail or hold up the flow that caused it:
//! scan history, admin notifications, view audits.
//!
//! Jobs run one at a time on a single worker, in submission order, so two
//! side effects from the same client never interleave with each other.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

use super::AppError;

enum Job {
    Run {
        label: &'static str,
        task: BoxFuture<'static, Result<(), AppError>>,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SideEffects {
    sender: mpsc::UnboundedSender<Job>,
}

impl SideEffects {
    /// Spawn the worker on the current tokio runtime.
    pub fn start() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match job {
                    Job::Run { label, task } => {
                        if let Err(e) = task.await {
                            tracing::warn!(
                                side_effect = label,
                                error.message = %e,
                                error.cause = ?e.cause,
                                "side effect failed, ignoring"
                            );
                        }
                    }
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { sender }
    }

    pub fn submit<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let job = Job::Run {
            label,
            task: task.boxed(),
        };
        if self.sender.send(job).is_err() {
            tracing::warn!(side_effect = label, "side effect worker stopped, dropping job");
        }
    }

    /// Wait until every job submitted before this call has finished.
    pub async fn settle(&self) {
        let (done, finished) = oneshot::channel();
        if self.sender.send(Job::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }
}
