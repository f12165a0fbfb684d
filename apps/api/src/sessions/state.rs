use serde::Serialize;
use thiserror::Error;

/// Where a session is in the single-request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingState {
    Idle,
    Processing,
    Errored { message: String },
}

/// Events that move a session between states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The user triggered a parse.
    Dispatch,
    /// The outbound call returned decodable JSON.
    Succeed,
    /// Validation, transport or decode failed.
    Fail(String),
    /// New content arrived from a successful upload; any previous error is cleared.
    Acknowledge,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot apply {event:?} while {from:?}")]
pub struct InvalidTransition {
    pub from: ProcessingState,
    pub event: Transition,
}

impl ProcessingState {
    pub fn is_processing(&self) -> bool {
        matches!(self, ProcessingState::Processing)
    }

    /// Returns the next state, or an error for transitions that cannot happen.
    pub fn apply(&self, event: Transition) -> Result<ProcessingState, InvalidTransition> {
        use ProcessingState::*;

        match (self, &event) {
            (Idle | Errored { .. }, Transition::Dispatch) => Ok(Processing),
            (Processing, Transition::Succeed) => Ok(Idle),
            (Processing, Transition::Fail(message)) => Ok(Errored {
                message: message.clone(),
            }),
            (Idle | Errored { .. }, Transition::Acknowledge) => Ok(Idle),
            (Processing, Transition::Acknowledge) => Ok(Processing),
            (Processing, Transition::Dispatch)
            | (Idle | Errored { .. }, Transition::Succeed | Transition::Fail(_)) => {
                Err(InvalidTransition {
                    from: self.clone(),
                    event: event.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = ProcessingState::Idle;
        let state = state.apply(Transition::Dispatch).unwrap();
        assert_eq!(state, ProcessingState::Processing);
        assert_eq!(state.apply(Transition::Succeed).unwrap(), ProcessingState::Idle);
    }

    #[test]
    fn test_failure_then_retry() {
        let state = ProcessingState::Processing
            .apply(Transition::Fail("boom".to_string()))
            .unwrap();
        assert_eq!(
            state,
            ProcessingState::Errored {
                message: "boom".to_string()
            }
        );
        assert_eq!(
            state.apply(Transition::Dispatch).unwrap(),
            ProcessingState::Processing
        );
    }

    #[test]
    fn test_double_dispatch_rejected() {
        let err = ProcessingState::Processing
            .apply(Transition::Dispatch)
            .unwrap_err();
        assert_eq!(err.from, ProcessingState::Processing);
        assert_eq!(err.event, Transition::Dispatch);
    }

    #[test]
    fn test_outcomes_require_processing() {
        assert!(ProcessingState::Idle.apply(Transition::Succeed).is_err());
        assert!(ProcessingState::Idle
            .apply(Transition::Fail("x".to_string()))
            .is_err());
    }

    #[test]
    fn test_acknowledge_clears_error_but_not_processing() {
        let errored = ProcessingState::Errored {
            message: "x".to_string(),
        };
        assert_eq!(
            errored.apply(Transition::Acknowledge).unwrap(),
            ProcessingState::Idle
        );
        assert_eq!(
            ProcessingState::Processing
                .apply(Transition::Acknowledge)
                .unwrap(),
            ProcessingState::Processing
        );
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let json = serde_json::to_value(ProcessingState::Errored {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "errored");
        assert_eq!(json["message"], "nope");
    }
}
