//! Tracked background work.
//!
//! Generation calls, pacing delays and delayed comment replies all run as
//! fire-once tasks. Each task names the entity it will mutate so the session
//! can skip it when that entity is gone by the time the task runs.

use std::fmt;
use std::future::Future;

use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{error, Instrument};

use crate::id::{CharacterId, MessageId, MomentId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTarget {
    Character(CharacterId),
    Message(MessageId),
    Moment(MomentId),
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskTarget::Character(id) => write!(f, "character:{id}"),
            TaskTarget::Message(id) => write!(f, "message:{id}"),
            TaskTarget::Moment(id) => write!(f, "moment:{id}"),
        }
    }
}

#[derive(Clone, Default)]
pub struct TaskQueue {
    tracker: TaskTracker,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn onto the current tokio runtime. Outside a runtime the task is
    /// dropped and `false` is returned.
    pub fn spawn<F>(&self, target: &TaskTarget, label: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            error!(name = label, %target, "No tokio runtime, dropping task");
            return false;
        };
        let span = tracing::info_span!("task", name = label, target = %target);
        self.tracker.spawn_on(task.instrument(span), &handle);
        true
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every tracked task, including tasks spawned while waiting,
    /// has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
