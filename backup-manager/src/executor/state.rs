//! Lifecycle of a single orchestrated operation.

use crate::utils::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Initialize,
    Create,
    Download,
}

impl OperationKind {
    /// Verb used in failure messages ("could not create")
    pub fn verb(self) -> &'static str {
        match self {
            OperationKind::Initialize => "list",
            OperationKind::Create => "create",
            OperationKind::Download => "download",
        }
    }

    /// Past tense used in success messages ("successfully created")
    pub fn past_tense(self) -> &'static str {
        match self {
            OperationKind::Initialize => "listed",
            OperationKind::Create => "created",
            OperationKind::Download => "downloaded",
        }
    }
}

/// `Idle -> Running -> {Succeeded, Failed}`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationState::Idle => "idle",
            OperationState::Running => "running",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OperationKind,
    state: OperationState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: OperationState::Idle,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(OperationState::Idle, OperationState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<()> {
        self.transition(OperationState::Running, OperationState::Succeeded)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        self.transition(OperationState::Running, OperationState::Failed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, from: OperationState, to: OperationState) -> Result<()> {
        if self.state != from {
            return Err(BackupError::InvalidTransition {
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        self.state = to;
        Ok(())
    }
}
