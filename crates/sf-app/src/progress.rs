use sf_exec::{ExecutionProgress, ExecutionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    BuildingInputs,
    Submitting,
    Polling,
    Normalizing,
    Recording,
    Completed,
}

impl RunStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BuildingInputs => "building inputs",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Normalizing => "normalizing",
            Self::Recording => "recording",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PollProgress {
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: Option<ExecutionStatus>,
    pub nodes: Option<ExecutionProgress>,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub poll: Option<PollProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            poll: None,
        }
    }
}
