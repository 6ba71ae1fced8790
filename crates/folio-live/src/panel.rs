//! Live panel state machine.

use serde::{Deserialize, Serialize};

use crate::evaluator::{EvaluationError, RenderedOutput};

/// Where a panel is in its edit / evaluate cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    /// Mounted, nothing evaluated yet
    Idle { text: String },
    /// Waiting on the evaluation of `text`
    Evaluating { text: String },
    /// Latest evaluation succeeded
    Shown { text: String, output: RenderedOutput },
    /// Latest evaluation failed
    Errored { text: String, message: String },
}

impl PanelState {
    /// The editor text this state belongs to.
    pub fn text(&self) -> &str {
        match self {
            Self::Idle { text }
            | Self::Evaluating { text }
            | Self::Shown { text, .. }
            | Self::Errored { text, .. } => text,
        }
    }

    pub fn status(&self) -> PanelStatus {
        match self {
            Self::Idle { .. } => PanelStatus::Idle,
            Self::Evaluating { .. } => PanelStatus::Evaluating,
            Self::Shown { .. } => PanelStatus::Shown,
            Self::Errored { .. } => PanelStatus::Errored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    Idle,
    Evaluating,
    Shown,
    Errored,
}

/// What the error and preview regions display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelView {
    pub status: PanelStatus,
    /// Message of the latest failed evaluation, if the latest one failed
    pub error: Option<String>,
    /// Output of the most recent successful evaluation
    pub preview: Option<String>,
}

/// An evaluation the owner of the panel must run and report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub generation: u64,
    pub text: String,
}

/// State of one mounted live panel.
///
/// Each edit starts a new generation; a completion is applied only when it
/// belongs to the current generation, so a slow evaluation of older text can
/// never overwrite the result for newer text.
#[derive(Debug, Clone)]
pub struct LivePanel {
    state: PanelState,
    last_output: Option<RenderedOutput>,
    generation: u64,
}

impl LivePanel {
    /// Mount a panel seeded with the block source.
    pub fn mount(seed: impl Into<String>) -> Self {
        Self {
            state: PanelState::Idle { text: seed.into() },
            last_output: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn text(&self) -> &str {
        self.state.text()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the editor text, superseding any in-flight evaluation.
    pub fn edit(&mut self, text: impl Into<String>) -> Evaluation {
        self.begin(text.into())
    }

    /// Evaluate the seed text. Only valid before the first evaluation.
    pub fn evaluate_seed(&mut self) -> Option<Evaluation> {
        match &self.state {
            PanelState::Idle { text } => {
                let text = text.clone();
                Some(self.begin(text))
            }
            _ => None,
        }
    }

    fn begin(&mut self, text: String) -> Evaluation {
        self.generation += 1;
        self.state = PanelState::Evaluating { text: text.clone() };
        Evaluation {
            generation: self.generation,
            text,
        }
    }

    /// Apply an evaluation result. Returns false when the result is stale.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<RenderedOutput, EvaluationError>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }

        let PanelState::Evaluating { text } = &self.state else {
            return false;
        };
        let text = text.clone();

        self.state = match result {
            Ok(output) => {
                self.last_output = Some(output.clone());
                PanelState::Shown { text, output }
            }
            Err(e) => PanelState::Errored {
                text,
                message: e.message,
            },
        };

        true
    }

    pub fn view(&self) -> PanelView {
        let error = match &self.state {
            PanelState::Errored { message, .. } => Some(message.clone()),
            _ => None,
        };

        PanelView {
            status: self.state.status(),
            error,
            preview: self.last_output.as_ref().map(|o| o.as_str().to_string()),
        }
    }
}
