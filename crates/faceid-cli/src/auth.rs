use std::path::PathBuf;

use faceid_core::errors::AppResult;
use faceid_core::faces::MatchDecision;
use faceid_core::session::{
    ErrorKind, LogEntry, RegistrationOutcome, RegistrationReceipt, SessionError, SessionState,
};
use serde::Serialize;
use tracing::info;

use crate::cli::FrameArgs;
use crate::runtime::{block_on, prepare_session, CliController, RuntimeContext};

#[derive(Debug, Clone, Serialize)]
pub struct LoginReport {
    pub accepted: bool,
    pub state: SessionState,
    pub distance: Option<f64>,
    /// Display-only similarity percentage.
    pub match_level: Option<f64>,
    pub threshold: f64,
    pub reason: Option<ErrorKind>,
    pub error: Option<SessionError>,
    pub events: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterReport {
    pub registered: bool,
    pub store_path: PathBuf,
    pub receipt: Option<RegistrationReceipt>,
    pub error: Option<SessionError>,
    pub events: Vec<LogEntry>,
}

pub fn run_login(args: &FrameArgs) -> AppResult<LoginReport> {
    let context = RuntimeContext::load(&args.runtime)?;
    let controller = context.session(&args.frame)?;
    block_on(login(&controller))?
}

pub fn run_register(args: &FrameArgs) -> AppResult<RegisterReport> {
    let context = RuntimeContext::load(&args.runtime)?;
    let controller = context.session(&args.frame)?;
    block_on(register(&controller))?
}

async fn login(controller: &CliController) -> AppResult<LoginReport> {
    prepare_session(controller).await?;
    let attempt = controller.capture_and_login().await?;
    let snapshot = controller.snapshot();
    controller.shutdown().await;

    let match_level = attempt.distance.map(|distance| {
        MatchDecision {
            outcome: attempt.outcome,
            distance,
        }
        .match_level()
    });
    info!(accepted = attempt.is_accept(), distance = ?attempt.distance, "login finished");

    Ok(LoginReport {
        accepted: attempt.is_accept(),
        state: snapshot.state,
        distance: attempt.distance,
        match_level,
        threshold: controller.policy().threshold(),
        reason: attempt.reason,
        error: snapshot.error,
        events: controller.event_log(),
    })
}

async fn register(controller: &CliController) -> AppResult<RegisterReport> {
    prepare_session(controller).await?;
    let outcome = controller.capture_and_register().await?;
    controller.shutdown().await;

    let store_path = controller.store().path().to_path_buf();
    let (receipt, error) = match outcome {
        RegistrationOutcome::Registered(receipt) => (Some(receipt), None),
        RegistrationOutcome::Failed(error) => (None, Some(error)),
    };
    info!(registered = receipt.is_some(), store = %store_path.display(), "registration finished");

    Ok(RegisterReport {
        registered: receipt.is_some(),
        store_path,
        receipt,
        error,
        events: controller.event_log(),
    })
}
