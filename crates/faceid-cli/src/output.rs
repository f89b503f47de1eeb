use std::error::Error;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::json;

use crate::auth::{LoginReport, RegisterReport};
use crate::cli::OutputMode;
use crate::enrollment::{ClearReport, StatusReport};
use crate::errors::{AppError, AppResult};

fn write_json<T: Serialize + ?Sized>(payload: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_login(report: &LoginReport, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                for entry in &report.events {
                    println!("{entry}");
                }
            }
            println!("{}", login_summary(report));
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

fn login_summary(report: &LoginReport) -> String {
    match (report.accepted, report.distance) {
        (true, Some(distance)) => format!(
            "Login successful: distance {distance:.3} (match {:.0}%, threshold {:.2})",
            report.match_level.unwrap_or_default(),
            report.threshold
        ),
        (true, None) => "Login successful".to_string(),
        (false, _) => {
            let message = report
                .error
                .as_ref()
                .map(|error| error.message.as_str())
                .unwrap_or("face not recognised");
            format!("Login failed: {message}")
        }
    }
}

pub fn render_register(report: &RegisterReport, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                for entry in &report.events {
                    println!("{entry}");
                }
            }
            match (&report.receipt, &report.error) {
                (Some(receipt), _) => println!(
                    "Face registered successfully: {}-d {} template stored in {}",
                    receipt.dimension,
                    receipt.extractor,
                    report.store_path.display()
                ),
                (None, Some(error)) => println!("Registration failed: {}", error.message),
                (None, None) => println!("Registration failed"),
            }
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

pub fn render_status(report: &StatusReport, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if !report.enrolled {
                println!("No face enrolled ({})", report.store_path.display());
            } else if report.compatible {
                let created = report
                    .created_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".into());
                println!(
                    "Face enrolled: {} ({}-d, created {created})",
                    report.extractor.as_deref().unwrap_or("unknown extractor"),
                    report.dimension.unwrap_or_default()
                );
            } else {
                println!(
                    "Enrolled face is incompatible and must be registered again: {}",
                    report.problem.as_deref().unwrap_or("unknown reason")
                );
            }
            match &report.config_source {
                Some(path) => println!("Configuration: {}", path.display()),
                None => println!("Configuration: built-in defaults"),
            }
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

pub fn render_clear(report: &ClearReport, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if report.removed {
                println!("Enrollment removed: {}", report.store_path.display());
            } else {
                println!("No enrollment to remove ({})", report.store_path.display());
            }
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = error_payload(err);
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}

fn error_payload(err: &AppError) -> serde_json::Value {
    match err {
        AppError::SessionFailed { kind, message } => json!({
            "success": false,
            "kind": kind,
            "error": message,
        }),
        other => json!({
            "success": false,
            "error": other.human_message(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceid_core::session::{ErrorKind, SessionError, SessionState};

    fn report(accepted: bool, distance: Option<f64>) -> LoginReport {
        LoginReport {
            accepted,
            state: if accepted {
                SessionState::Success
            } else {
                SessionState::Failure
            },
            distance,
            match_level: distance.map(|d| (1.0 - d.min(1.0)) * 100.0),
            threshold: 0.55,
            reason: (!accepted).then_some(ErrorKind::MatchRejected),
            error: (!accepted).then(|| {
                SessionError::new(ErrorKind::MatchRejected, "Face mismatch (Distance: 0.700)")
            }),
            events: Vec::new(),
        }
    }

    #[test]
    fn accepted_login_summary_reports_distance_and_level() {
        let summary = login_summary(&report(true, Some(0.25)));
        assert_eq!(
            summary,
            "Login successful: distance 0.250 (match 75%, threshold 0.55)"
        );
    }

    #[test]
    fn rejected_login_summary_uses_session_message() {
        let summary = login_summary(&report(false, Some(0.7)));
        assert_eq!(summary, "Login failed: Face mismatch (Distance: 0.700)");
    }

    #[test]
    fn session_failures_carry_their_kind_in_json() {
        let err = AppError::SessionFailed {
            kind: ErrorKind::CameraAccess,
            message: "Unable to access camera. Please allow permissions.".into(),
        };
        let payload = error_payload(&err);
        assert_eq!(payload["kind"], "camera_access");
        assert_eq!(payload["success"], false);
    }

    #[test]
    fn login_report_serializes_state_names() {
        let payload = serde_json::to_value(report(false, Some(0.7))).unwrap();
        assert_eq!(payload["state"], "FAILURE");
        assert_eq!(payload["reason"], "match_rejected");
        assert_eq!(payload["accepted"], false);
    }
}
