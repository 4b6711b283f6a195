use crate::error::SessionError;
use crate::label::Label;
use log::info;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Initializing,
    AwaitingTrainNegative,
    TrainingNegative,
    AwaitingTrainPositive,
    TrainingPositive,
    RunningInference,
}

impl Phase {
    /// The only phase reachable from `self`, if any.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Initializing => Some(Phase::AwaitingTrainNegative),
            Phase::AwaitingTrainNegative => Some(Phase::TrainingNegative),
            Phase::TrainingNegative => Some(Phase::AwaitingTrainPositive),
            Phase::AwaitingTrainPositive => Some(Phase::TrainingPositive),
            Phase::TrainingPositive => Some(Phase::RunningInference),
            Phase::RunningInference => None,
        }
    }

    /// Label collected while in this phase.
    pub fn training_label(self) -> Option<Label> {
        match self {
            Phase::TrainingNegative => Some(Label::NotTouched),
            Phase::TrainingPositive => Some(Label::Touched),
            _ => None,
        }
    }

    pub(crate) fn training_phase_for(label: Label) -> Phase {
        match label {
            Label::NotTouched => Phase::TrainingNegative,
            Label::Touched => Phase::TrainingPositive,
        }
    }
}

/// Holds the current phase and only ever moves it one step along the chain.
#[derive(Debug)]
pub struct PhaseMachine {
    phase: Phase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        PhaseMachine { phase: Phase::Initializing }
    }
}

impl PhaseMachine {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self) -> Result<Phase, SessionError> {
        let next = self.phase.next().ok_or(SessionError::InvalidTransition(self.phase))?;
        info!("Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(next)
    }

    /// Advances only when the current phase is `from`. Returns whether it moved.
    pub fn advance_from(&mut self, from: Phase) -> Result<bool, SessionError> {
        if self.phase != from {
            return Ok(false);
        }
        self.advance().map(|_| true)
    }

    pub fn require(&self, expected: Phase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::PhaseMismatch {
                expected,
                actual: self.phase,
            })
        }
    }
}
