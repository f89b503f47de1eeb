use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use faceid_config::ConfigError;
use image::ImageError;
use thiserror::Error;

use crate::session::{ErrorKind, Rejected, SessionError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load extractor model {model}: {message}")]
    ModelLoad { model: String, message: String },

    #[error("embedding extractor failed: {0}")]
    Extraction(String),

    #[error("camera access failed ({device}): {message}")]
    CameraAccess { device: String, message: String },

    #[error("camera stream {device} stopped delivering frames: {message}")]
    FrameUnavailable { device: String, message: String },

    #[error("failed to decode frame {path}: {source}")]
    FrameDecode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("embedding length mismatch: expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("enrolled template is incompatible with extractor {model}: {message}")]
    IncompatibleTemplate { model: String, message: String },

    #[error("invalid enrollment key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("failed to read enrollment store {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write enrollment store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("enrollment store {path} is corrupt: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    #[error("{message}")]
    SessionFailed { kind: ErrorKind, message: String },

    #[error(transparent)]
    SessionRejected(#[from] Rejected),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::ModelLoad { .. } => ExitCode::from(2),
            AppError::InvalidKey { .. } => ExitCode::from(2),
            AppError::FrameDecode { .. } => ExitCode::from(2),
            AppError::CameraAccess { .. } => ExitCode::from(4),
            AppError::FrameUnavailable { .. } => ExitCode::from(4),
            AppError::IncompatibleTemplate { .. } => ExitCode::from(3),
            AppError::DimensionMismatch { .. } => ExitCode::from(3),
            AppError::StoreRead { .. } => ExitCode::from(2),
            AppError::StoreWrite { .. } => ExitCode::from(2),
            AppError::StoreCorrupt { .. } => ExitCode::from(3),
            AppError::Config(_) => ExitCode::from(2),
            AppError::SessionFailed { kind, .. } => match kind {
                ErrorKind::ModelLoad => ExitCode::from(2),
                ErrorKind::CameraAccess => ExitCode::from(4),
                _ => ExitCode::from(1),
            },
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        AppError::SessionFailed {
            kind: error.kind,
            message: error.message,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Operation, SessionState};

    #[test]
    fn session_failures_keep_their_message() {
        let err = AppError::from(SessionError::new(
            ErrorKind::CameraAccess,
            "Unable to access camera. Please allow permissions.",
        ));
        assert_eq!(
            err.human_message(),
            "Unable to access camera. Please allow permissions."
        );
        assert_eq!(err.exit_code(), ExitCode::from(4));
    }

    #[test]
    fn rejections_convert_transparently() {
        let err = AppError::from(Rejected::InvalidState {
            operation: Operation::CaptureAndLogin,
            state: SessionState::Idle,
        });
        assert_eq!(
            err.to_string(),
            "capture_and_login is not allowed in state IDLE"
        );
        assert_eq!(err.exit_code(), ExitCode::from(1));
    }

    #[test]
    fn incompatible_templates_use_dedicated_exit_code() {
        let err = AppError::IncompatibleTemplate {
            model: "face-recognition-128".into(),
            message: "expected 128 values, found 64".into(),
        };
        assert_eq!(err.exit_code(), ExitCode::from(3));
    }
}
