use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::Callback;
use crate::network::{
    ActionKind, CancelMessage, Context, OrderMessage, Request, SearchMessage, StatusMessage,
};
use crate::staging::StagedApplication;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Accepted action plus whatever Phase 1 already committed on its behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProtocolTask {
    Search {
        request: Request<SearchMessage>,
    },
    Select {
        request: Request<OrderMessage>,
    },
    Init {
        request: Request<OrderMessage>,
    },
    /// `staged` was removed from the stage store when the confirm was acknowledged.
    Confirm {
        request: Request<OrderMessage>,
        staged: StagedApplication,
    },
    Status {
        request: Request<StatusMessage>,
    },
    Cancel {
        request: Request<CancelMessage>,
    },
}

impl ProtocolTask {
    pub fn kind(&self) -> ActionKind {
        match self {
            ProtocolTask::Search { .. } => ActionKind::Search,
            ProtocolTask::Select { .. } => ActionKind::Select,
            ProtocolTask::Init { .. } => ActionKind::Init,
            ProtocolTask::Confirm { .. } => ActionKind::Confirm,
            ProtocolTask::Status { .. } => ActionKind::Status,
            ProtocolTask::Cancel { .. } => ActionKind::Cancel,
        }
    }

    pub fn context(&self) -> &Context {
        match self {
            ProtocolTask::Search { request } => &request.context,
            ProtocolTask::Select { request }
            | ProtocolTask::Init { request }
            | ProtocolTask::Confirm { request, .. } => &request.context,
            ProtocolTask::Status { request } => &request.context,
            ProtocolTask::Cancel { request } => &request.context,
        }
    }
}

/// Where a task resumes when it is next claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "callback", rename_all = "snake_case")]
pub enum TaskPhase {
    /// Run the Phase-2 mutation and build the callback.
    Process,
    /// Mutation committed; only the callback post remains.
    Deliver(Callback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InFlight,
    Completed,
    DeadLettered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task: ProtocolTask,
    pub phase: TaskPhase,
    pub status: TaskStatus,
    /// Number of times the task has been claimed.
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task: ProtocolTask, at: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            task,
            phase: TaskPhase::Process,
            status: TaskStatus::Queued,
            attempts: 0,
            next_attempt_at: at,
            last_error: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Queued && self.next_attempt_at <= now
    }
}
