use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::capture::StreamInfo;
use crate::faces::{BoundingBox, MatchOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    LoadingModels,
    CameraPermission,
    CameraReady,
    Scanning,
    Success,
    Failure,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::LoadingModels => "LOADING_MODELS",
            SessionState::CameraPermission => "CAMERA_PERMISSION",
            SessionState::CameraReady => "CAMERA_READY",
            SessionState::Scanning => "SCANNING",
            SessionState::Success => "SUCCESS",
            SessionState::Failure => "FAILURE",
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, SessionState::Scanning)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SessionState::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SessionState::Failure)
    }

    pub fn is_camera_ready(&self) -> bool {
        matches!(self, SessionState::CameraReady)
    }

    /// `Success` or `Failure`: a result is on screen and `reset` applies.
    pub fn is_result(&self) -> bool {
        matches!(self, SessionState::Success | SessionState::Failure)
    }

    /// Whether the view should show the live feed rather than a spinner.
    pub fn camera_visible(&self) -> bool {
        !matches!(
            self,
            SessionState::LoadingModels | SessionState::CameraPermission
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelLoad,
    CameraAccess,
    NoFaceDetected,
    NoRegisteredTemplate,
    MatchRejected,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::CameraAccess => "camera_access",
            ErrorKind::NoFaceDetected => "no_face_detected",
            ErrorKind::NoRegisteredTemplate => "no_registered_template",
            ErrorKind::MatchRejected => "match_rejected",
            ErrorKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// User-facing failure attached to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptResult {
    pub outcome: MatchOutcome,
    pub distance: Option<f64>,
    pub reason: Option<ErrorKind>,
}

impl AttemptResult {
    pub fn is_accept(&self) -> bool {
        self.outcome == MatchOutcome::Accept
    }
}

/// Out-of-band confirmation of a successful registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationReceipt {
    pub extractor: String,
    pub dimension: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Registered(RegistrationReceipt),
    Failed(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    StartCamera,
    CaptureAndLogin,
    CaptureAndRegister,
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Initialize => "initialize",
            Operation::StartCamera => "start_camera",
            Operation::CaptureAndLogin => "capture_and_login",
            Operation::CaptureAndRegister => "capture_and_register",
            Operation::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A request the controller declined without touching session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("{operation} rejected: another operation is in progress")]
    Busy { operation: Operation },
    #[error("{operation} rejected: face models are not loaded")]
    ModelsNotLoaded { operation: Operation },
    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: Operation,
        state: SessionState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub sequence: u64,
    pub from: SessionState,
    pub to: SessionState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub error: Option<SessionError>,
    pub distance: Option<f64>,
    pub models_loaded: bool,
    pub detection: Option<BoundingBox>,
    pub stream: Option<StreamInfo>,
}

impl SessionSnapshot {
    pub fn is_scanning(&self) -> bool {
        self.state.is_scanning()
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.state.is_failure()
    }

    pub fn is_camera_ready(&self) -> bool {
        self.state.is_camera_ready()
    }

    pub fn camera_visible(&self) -> bool {
        self.state.camera_visible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_serialize_in_screaming_case() {
        let json = serde_json::to_string(&SessionState::CameraReady).unwrap();
        assert_eq!(json, "\"CAMERA_READY\"");
        assert_eq!(SessionState::LoadingModels.to_string(), "LOADING_MODELS");
    }

    #[test]
    fn predicates_derive_from_state() {
        assert!(SessionState::Success.is_result());
        assert!(SessionState::Failure.is_result());
        assert!(!SessionState::Scanning.is_result());
        assert!(!SessionState::CameraPermission.camera_visible());
        assert!(SessionState::Scanning.camera_visible());
    }

    #[test]
    fn rejection_messages_name_the_operation() {
        let rejected = Rejected::InvalidState {
            operation: Operation::CaptureAndLogin,
            state: SessionState::Idle,
        };
        assert_eq!(
            rejected.to_string(),
            "capture_and_login is not allowed in state IDLE"
        );
    }
}
