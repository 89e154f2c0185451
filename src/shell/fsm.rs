use crate::{
    Error, Result,
    caption::Caption,
    ingest::Bitmap,
    qa::{Answer, Question},
};
use serde::Serialize;
use tracing::{debug, info, warn};

// Shell states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellState {
    Idle,
    ImageLoaded,
    CaptionReady,
    AnswerDisplayed,
}

// Shell events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEvent {
    Reset,
    ImageDecoded,
    CaptionGenerated,
    AnswerExtracted,
    AnswerDismissed,
}

/// A question together with the answer that was shown for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaExchange {
    pub question: Question,
    pub answer: Answer,
}

// Shell context (per-session data)
#[derive(Debug, Clone, Default)]
pub struct ShellContext {
    pub bitmap: Option<Bitmap>,
    pub caption: Option<Caption>,
    pub last_exchange: Option<QaExchange>,
    pub last_error: Option<Error>,
}

impl ShellContext {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set_error(&mut self, error: Error) {
        self.last_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

pub struct ShellStateMachine {
    state: ShellState,
    pub context: ShellContext,
}

impl Default for ShellStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellStateMachine {
    pub fn new() -> Self {
        Self {
            state: ShellState::Idle,
            context: ShellContext::default(),
        }
    }

    pub fn current_state(&self) -> ShellState {
        self.state
    }

    pub fn transition(&mut self, event: ShellEvent) -> Result<()> {
        let old_state = self.state;
        debug!("FSM processing event {:?} in state {:?}", event, old_state);

        let new_state = match (self.state, event) {
            (_, ShellEvent::Reset) => ShellState::Idle,
            (ShellState::Idle, ShellEvent::ImageDecoded) => ShellState::ImageLoaded,
            (ShellState::ImageLoaded, ShellEvent::CaptionGenerated) => ShellState::CaptionReady,
            (ShellState::CaptionReady, ShellEvent::AnswerExtracted) => ShellState::AnswerDisplayed,
            (ShellState::AnswerDisplayed, ShellEvent::AnswerDismissed) => ShellState::CaptionReady,
            _ => {
                warn!(
                    "Invalid FSM transition from {:?} with event {:?}",
                    self.state, event
                );
                return Err(Error::InvalidTransition {
                    current: format!("{:?}", self.state),
                    requested: format!("{:?}", event),
                });
            }
        };

        if old_state != new_state {
            info!(
                "FSM state transition: {:?} -> {:?} (event: {:?})",
                old_state, new_state, event
            );
        }

        self.state = new_state;
        Ok(())
    }

    /// Drops everything derived from the previous upload and returns to `Idle`.
    pub fn reset(&mut self) {
        // Reset is valid from every state
        let _ = self.transition(ShellEvent::Reset);
        self.context.clear();
    }

    pub fn accepts_questions(&self) -> bool {
        matches!(
            self.state,
            ShellState::CaptionReady | ShellState::AnswerDisplayed
        )
    }

    pub fn caption(&self) -> Option<&Caption> {
        self.context.caption.as_ref()
    }

    pub fn get_last_error(&self) -> Option<&Error> {
        self.context.last_error.as_ref()
    }
}
