use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use faceid_config::{
    ResolvedConfig, DEFAULT_EVENT_LOG_CAPACITY, DEFAULT_LOGIN_PACING_MILLIS,
    DEFAULT_MATCH_THRESHOLD, DEFAULT_REGISTER_PACING_MILLIS,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};

use crate::capture::{Camera, CameraConstraints, FacingMode, FrameSource, StreamInfo};
use crate::errors::{AppError, AppResult};
use crate::faces::{
    ensure_valid_embedding, BoundingBox, EmbeddingExtractor, EnrollmentRecord, EnrollmentStore,
    FaceDetection, MatchDecision, MatchOutcome, MatchPolicy,
};
use crate::session::events::{EventLog, LogEntry};
use crate::session::state::{
    AttemptResult, ErrorKind, Operation, RegistrationOutcome, RegistrationReceipt, Rejected,
    SessionError, SessionSnapshot, SessionState, StateTransition,
};

const MODEL_LOAD_MESSAGE: &str = "Failed to load face detection models.";
const CAMERA_ACCESS_MESSAGE: &str = "Unable to access camera. Please allow permissions.";
const NO_TEMPLATE_MESSAGE: &str = "No registered face found. Please register first.";
const INCOMPATIBLE_TEMPLATE_MESSAGE: &str =
    "Registered face is incompatible with the current face model. Please register again.";
const NO_FACE_LOGIN_MESSAGE: &str = "No face detected in live view.";
const NO_FACE_REGISTER_MESSAGE: &str = "No face detected. Try again.";
const LOGIN_FAILED_MESSAGE: &str = "Login verification failed.";
const REGISTER_FAILED_MESSAGE: &str = "Registration failed.";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Minimum duration of a login capture.
    pub login_pacing: Duration,
    /// Minimum duration of a registration capture.
    pub register_pacing: Duration,
    pub event_log_capacity: usize,
    pub constraints: CameraConstraints,
    pub match_threshold: f64,
}

impl SessionSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let facing_mode = match config.facing_mode.parse::<FacingMode>() {
            Ok(mode) => mode,
            Err(message) => {
                warn!(%message, "falling back to the user-facing camera");
                FacingMode::default()
            }
        };

        Self {
            login_pacing: config.login_pacing,
            register_pacing: config.register_pacing,
            event_log_capacity: config.event_log_capacity,
            constraints: CameraConstraints {
                facing_mode,
                ..CameraConstraints::default()
            },
            match_threshold: config.match_threshold,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_pacing: Duration::from_millis(DEFAULT_LOGIN_PACING_MILLIS),
            register_pacing: Duration::from_millis(DEFAULT_REGISTER_PACING_MILLIS),
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            constraints: CameraConstraints::default(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

struct SessionInner {
    state: SessionState,
    error: Option<SessionError>,
    distance: Option<f64>,
    models_loaded: bool,
    detection: Option<BoundingBox>,
    stream: Option<StreamInfo>,
    events: EventLog,
    sequence: u64,
    subscribers: Vec<mpsc::UnboundedSender<StateTransition>>,
}

impl SessionInner {
    fn new(event_log_capacity: usize) -> Self {
        Self {
            state: SessionState::Idle,
            error: None,
            distance: None,
            models_loaded: false,
            detection: None,
            stream: None,
            events: EventLog::new(event_log_capacity),
            sequence: 0,
            subscribers: Vec::new(),
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        self.sequence += 1;
        let transition = StateTransition {
            sequence: self.sequence,
            from,
            to,
        };
        self.subscribers.retain(|tx| tx.send(transition).is_ok());
        self.events.push(format!("{from} -> {to}"));
        info!(%from, %to, sequence = self.sequence, "session transition");
    }

    fn clear_result(&mut self) {
        self.error = None;
        self.distance = None;
        self.detection = None;
    }

    fn fail(&mut self, error: SessionError) {
        warn!(kind = %error.kind, message = %error.message, "session failed");
        self.events.push(format!("Error: {}", error.message));
        self.error = Some(error);
        self.transition(SessionState::Failure);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            error: self.error.clone(),
            distance: self.distance,
            models_loaded: self.models_loaded,
            detection: self.detection,
            stream: self.stream.clone(),
        }
    }
}

struct LoginVerdict {
    decision: MatchDecision,
    detection: BoundingBox,
}

/// Drives one authentication session: model warm-up, camera acquisition,
/// paced capture, matching against the enrolled template and the result.
///
/// Operations are serialized; a call made while another is in flight is
/// returned as [`Rejected::Busy`]. Guard violations never change state.
pub struct SessionController<E, C, S>
where
    C: Camera,
{
    extractor: E,
    camera: C,
    store: S,
    policy: MatchPolicy,
    settings: SessionSettings,
    gate: AsyncMutex<()>,
    stream: AsyncMutex<Option<C::Stream>>,
    inner: Mutex<SessionInner>,
}

impl<E, C, S> SessionController<E, C, S>
where
    E: EmbeddingExtractor,
    C: Camera,
    S: EnrollmentStore,
{
    pub fn new(extractor: E, camera: C, store: S, settings: SessionSettings) -> Self {
        Self {
            extractor,
            camera,
            store,
            policy: MatchPolicy::new(settings.match_threshold),
            inner: Mutex::new(SessionInner::new(settings.event_log_capacity)),
            settings,
            gate: AsyncMutex::new(()),
            stream: AsyncMutex::new(None),
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.with_inner(|inner| inner.snapshot())
    }

    pub fn state(&self) -> SessionState {
        self.with_inner(|inner| inner.state)
    }

    pub fn error(&self) -> Option<SessionError> {
        self.with_inner(|inner| inner.error.clone())
    }

    pub fn distance(&self) -> Option<f64> {
        self.with_inner(|inner| inner.distance)
    }

    pub fn models_loaded(&self) -> bool {
        self.with_inner(|inner| inner.models_loaded)
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.with_inner(|inner| inner.stream.clone())
    }

    pub fn event_log(&self) -> Vec<LogEntry> {
        self.with_inner(|inner| inner.events.entries())
    }

    /// Every later transition is delivered in order on the returned channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateTransition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with_inner(|inner| inner.subscribers.push(tx));
        rx
    }

    pub async fn initialize(&self) -> Result<(), Rejected> {
        let operation = Operation::Initialize;
        let _guard = self.enter(operation)?;

        let proceed = self
            .with_inner(|inner| {
                if inner.models_loaded {
                    return Ok(false);
                }
                let retry_after_load_failure = inner.state == SessionState::Failure
                    && matches!(inner.error, Some(SessionError { kind: ErrorKind::ModelLoad, .. }));
                match inner.state {
                    SessionState::Idle | SessionState::CameraReady => {}
                    _ if retry_after_load_failure => {}
                    state => return Err(Rejected::InvalidState { operation, state }),
                }
                inner.error = None;
                inner.events.push("Loading face models...");
                inner.transition(SessionState::LoadingModels);
                Ok(true)
            })
            .map_err(|rejected| self.reject(rejected))?;

        if !proceed {
            debug!("face models already loaded");
            return Ok(());
        }

        let model = self.extractor.profile().model.clone();
        let loaded = self.extractor.load().await;
        self.with_inner(|inner| match loaded {
            Ok(()) => {
                inner.models_loaded = true;
                inner.events.push(format!("Face models loaded ({model})"));
                let next = if inner.stream.is_some() {
                    SessionState::CameraReady
                } else {
                    SessionState::Idle
                };
                inner.transition(next);
            }
            Err(err) => {
                warn!(error = %err, %model, "face model warm-up failed");
                inner.fail(SessionError::new(ErrorKind::ModelLoad, MODEL_LOAD_MESSAGE));
            }
        });
        Ok(())
    }

    pub async fn start_camera(&self) -> Result<(), Rejected> {
        let operation = Operation::StartCamera;
        let _guard = self.enter(operation)?;

        self.with_inner(|inner| {
            match inner.state {
                SessionState::Idle
                | SessionState::CameraReady
                | SessionState::Success
                | SessionState::Failure => {}
                state => return Err(Rejected::InvalidState { operation, state }),
            }
            inner.clear_result();
            inner.transition(SessionState::CameraPermission);
            Ok(())
        })
        .map_err(|rejected| self.reject(rejected))?;

        let acquired = {
            let mut slot = self.stream.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!(label = %existing.info().label, "re-attaching camera stream");
                    Ok(existing.info().clone())
                }
                None => match self.camera.acquire(&self.settings.constraints).await {
                    Ok(stream) => {
                        let info = stream.info().clone();
                        *slot = Some(stream);
                        Ok(info)
                    }
                    Err(err) => Err(err),
                },
            }
        };

        self.with_inner(|inner| match acquired {
            Ok(info) => {
                inner.events.push(format!(
                    "Camera ready: {} ({}x{})",
                    info.label, info.width, info.height
                ));
                inner.stream = Some(info);
                inner.transition(SessionState::CameraReady);
            }
            Err(err) => {
                warn!(error = %err, "camera acquisition failed");
                inner.fail(SessionError::new(ErrorKind::CameraAccess, CAMERA_ACCESS_MESSAGE));
            }
        });
        Ok(())
    }

    /// Captures one frame and matches it against the enrolled template.
    ///
    /// The result is reported no sooner than `login_pacing` after the call.
    pub async fn capture_and_login(&self) -> Result<AttemptResult, Rejected> {
        let operation = Operation::CaptureAndLogin;
        let _guard = self.enter(operation)?;
        self.begin_capture(operation)?;

        let (_, verdict) = tokio::join!(
            tokio::time::sleep(self.settings.login_pacing),
            self.run_login()
        );
        Ok(self.finish_login(verdict))
    }

    /// Captures one frame and overwrites the enrolled template with it.
    ///
    /// Success returns the session to `Idle` and is reported through the
    /// returned receipt only. A frame without a face leaves the camera ready
    /// for another try.
    pub async fn capture_and_register(&self) -> Result<RegistrationOutcome, Rejected> {
        let operation = Operation::CaptureAndRegister;
        let _guard = self.enter(operation)?;
        self.begin_capture(operation)?;

        let (_, registered) = tokio::join!(
            tokio::time::sleep(self.settings.register_pacing),
            self.run_register()
        );
        Ok(self.finish_register(registered))
    }

    pub fn reset(&self) -> Result<(), Rejected> {
        let operation = Operation::Reset;
        let _guard = self.enter(operation)?;

        self.with_inner(|inner| {
            if !inner.state.is_result() {
                return Err(Rejected::InvalidState {
                    operation,
                    state: inner.state,
                });
            }
            inner.clear_result();
            inner.events.push("Session reset");
            let next = if inner.stream.is_some() {
                SessionState::CameraReady
            } else {
                SessionState::Idle
            };
            inner.transition(next);
            Ok(())
        })
        .map_err(|rejected| self.reject(rejected))
    }

    /// Waits for any in-flight operation, then releases the camera stream.
    pub async fn shutdown(&self) {
        let _guard = self.gate.lock().await;
        let released = match self.stream.lock().await.take() {
            Some(mut stream) => {
                stream.release();
                true
            }
            None => false,
        };

        self.with_inner(|inner| {
            inner.stream = None;
            inner.clear_result();
            if released {
                inner.events.push("Camera stream released");
            }
            inner.transition(SessionState::Idle);
        });
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut SessionInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    fn enter(&self, operation: Operation) -> Result<AsyncMutexGuard<'_, ()>, Rejected> {
        self.gate
            .try_lock()
            .map_err(|_| self.reject(Rejected::Busy { operation }))
    }

    fn reject(&self, rejected: Rejected) -> Rejected {
        warn!(%rejected, "session operation rejected");
        self.with_inner(|inner| inner.events.push(rejected.to_string()));
        rejected
    }

    fn begin_capture(&self, operation: Operation) -> Result<(), Rejected> {
        self.with_inner(|inner| {
            if !inner.models_loaded {
                return Err(Rejected::ModelsNotLoaded { operation });
            }
            if inner.state != SessionState::CameraReady || inner.stream.is_none() {
                return Err(Rejected::InvalidState {
                    operation,
                    state: inner.state,
                });
            }
            inner.clear_result();
            inner.events.push(match operation {
                Operation::CaptureAndRegister => "Scanning face for registration...",
                _ => "Scanning face...",
            });
            inner.transition(SessionState::Scanning);
            Ok(())
        })
        .map_err(|rejected| self.reject(rejected))
    }

    async fn capture_face(&self) -> AppResult<Option<FaceDetection>> {
        let frame = {
            let mut slot = self.stream.lock().await;
            match slot.as_mut() {
                Some(stream) => stream.next_frame().await?,
                None => return Ok(None),
            }
        };
        debug!(
            sequence = frame.sequence,
            width = frame.width(),
            height = frame.height(),
            "captured frame"
        );

        let face = match self.extractor.detect(&frame).await? {
            Some(face) => face,
            None => return Ok(None),
        };
        ensure_valid_embedding(&face.embedding, self.extractor.profile())?;
        Ok(Some(face))
    }

    /// Checks a stored record against the extractor producing live embeddings.
    fn ensure_compatible(&self, record: &EnrollmentRecord) -> AppResult<()> {
        let profile = self.extractor.profile();
        if let Some(model) = record.extractor.as_deref() {
            if model != profile.model {
                return Err(AppError::IncompatibleTemplate {
                    model: profile.model.clone(),
                    message: format!("template was produced by {model}"),
                });
            }
        }
        ensure_valid_embedding(&record.embedding, profile)
    }

    async fn run_login(&self) -> Result<LoginVerdict, SessionError> {
        let stored = match self.store.get() {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(SessionError::new(
                    ErrorKind::NoRegisteredTemplate,
                    NO_TEMPLATE_MESSAGE,
                ))
            }
            Err(err @ AppError::IncompatibleTemplate { .. }) => {
                warn!(error = %err, "ignoring incompatible enrollment");
                return Err(SessionError::new(
                    ErrorKind::NoRegisteredTemplate,
                    INCOMPATIBLE_TEMPLATE_MESSAGE,
                ));
            }
            Err(err) => {
                warn!(error = %err, "failed to read enrollment");
                return Err(SessionError::new(ErrorKind::Storage, LOGIN_FAILED_MESSAGE));
            }
        };
        if let Err(err) = self.ensure_compatible(&stored) {
            warn!(error = %err, "enrollment does not fit the loaded extractor");
            return Err(SessionError::new(
                ErrorKind::NoRegisteredTemplate,
                INCOMPATIBLE_TEMPLATE_MESSAGE,
            ));
        }

        let face = match self.capture_face().await {
            Ok(Some(face)) => face,
            Ok(None) => {
                return Err(SessionError::new(
                    ErrorKind::NoFaceDetected,
                    NO_FACE_LOGIN_MESSAGE,
                ))
            }
            Err(err) => {
                warn!(error = %err, "face extraction failed");
                return Err(SessionError::new(
                    ErrorKind::NoFaceDetected,
                    NO_FACE_LOGIN_MESSAGE,
                ));
            }
        };

        let decision = self.policy.evaluate(&face.embedding, &stored.embedding);
        debug!(
            distance = decision.distance,
            threshold = self.policy.threshold(),
            "compared live face with enrollment"
        );
        Ok(LoginVerdict {
            decision,
            detection: face.bounding_box,
        })
    }

    fn finish_login(&self, verdict: Result<LoginVerdict, SessionError>) -> AttemptResult {
        self.with_inner(|inner| match verdict {
            Ok(LoginVerdict {
                decision,
                detection,
            }) => {
                inner.distance = Some(decision.distance);
                inner.detection = Some(detection);
                match decision.outcome {
                    MatchOutcome::Accept => {
                        info!(distance = decision.distance, "login accepted");
                        inner.events.push(format!(
                            "Login successful (distance {:.3}, match {:.0}%)",
                            decision.distance,
                            decision.match_level()
                        ));
                        inner.transition(SessionState::Success);
                        AttemptResult {
                            outcome: MatchOutcome::Accept,
                            distance: Some(decision.distance),
                            reason: None,
                        }
                    }
                    MatchOutcome::Reject => {
                        info!(distance = decision.distance, "login rejected");
                        inner.fail(SessionError::new(
                            ErrorKind::MatchRejected,
                            format!("Face mismatch (Distance: {:.3})", decision.distance),
                        ));
                        AttemptResult {
                            outcome: MatchOutcome::Reject,
                            distance: Some(decision.distance),
                            reason: Some(ErrorKind::MatchRejected),
                        }
                    }
                }
            }
            Err(error) => {
                let reason = error.kind;
                inner.fail(error);
                AttemptResult {
                    outcome: MatchOutcome::Reject,
                    distance: None,
                    reason: Some(reason),
                }
            }
        })
    }

    async fn run_register(&self) -> Result<RegistrationReceipt, SessionError> {
        let face = match self.capture_face().await {
            Ok(Some(face)) => face,
            Ok(None) => {
                return Err(SessionError::new(
                    ErrorKind::NoFaceDetected,
                    NO_FACE_REGISTER_MESSAGE,
                ))
            }
            Err(err) => {
                warn!(error = %err, "face extraction failed");
                return Err(SessionError::new(
                    ErrorKind::NoFaceDetected,
                    NO_FACE_REGISTER_MESSAGE,
                ));
            }
        };

        let profile = self.extractor.profile();
        let record = EnrollmentRecord::new(face.embedding, profile);
        if let Err(err) = self.store.put(&record) {
            warn!(error = %err, "failed to store enrollment");
            return Err(SessionError::new(ErrorKind::Storage, REGISTER_FAILED_MESSAGE));
        }

        Ok(RegistrationReceipt {
            extractor: profile.model.clone(),
            dimension: record.embedding.len(),
            created_at: record.created_at,
            bounding_box: face.bounding_box,
        })
    }

    fn finish_register(
        &self,
        registered: Result<RegistrationReceipt, SessionError>,
    ) -> RegistrationOutcome {
        self.with_inner(|inner| match registered {
            Ok(receipt) => {
                info!(extractor = %receipt.extractor, "face registered");
                inner.detection = Some(receipt.bounding_box);
                inner.events.push("Face registered successfully");
                inner.transition(SessionState::Idle);
                RegistrationOutcome::Registered(receipt)
            }
            Err(error) if error.kind == ErrorKind::NoFaceDetected => {
                warn!(message = %error.message, "registration found no face");
                inner.events.push(format!("Error: {}", error.message));
                inner.error = Some(error.clone());
                inner.transition(SessionState::CameraReady);
                RegistrationOutcome::Failed(error)
            }
            Err(error) => {
                inner.fail(error.clone());
                RegistrationOutcome::Failed(error)
            }
        })
    }
}

impl<E, C, S> Drop for SessionController<E, C, S>
where
    C: Camera,
{
    fn drop(&mut self) {
        if let Some(stream) = self.stream.get_mut().as_mut() {
            stream.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_resolved_config() {
        let config = ResolvedConfig {
            login_pacing: Duration::from_millis(10),
            register_pacing: Duration::from_millis(20),
            match_threshold: 0.4,
            facing_mode: "back".into(),
            ..ResolvedConfig::default()
        };

        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.login_pacing, Duration::from_millis(10));
        assert_eq!(settings.register_pacing, Duration::from_millis(20));
        assert_eq!(settings.match_threshold, 0.4);
        assert_eq!(settings.constraints.facing_mode, FacingMode::Environment);
    }

    #[test]
    fn unknown_facing_mode_falls_back_to_user() {
        let config = ResolvedConfig {
            facing_mode: "sideways".into(),
            ..ResolvedConfig::default()
        };
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.constraints.facing_mode, FacingMode::User);
    }

    #[test]
    fn default_settings_use_documented_pacing() {
        let settings = SessionSettings::default();
        assert_eq!(settings.login_pacing, Duration::from_millis(1500));
        assert_eq!(settings.register_pacing, Duration::from_millis(500));
        assert_eq!(settings.match_threshold, 0.55);
    }
}
