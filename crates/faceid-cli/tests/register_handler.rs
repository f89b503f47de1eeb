use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use faceid_cli::auth::RegisterReport;
use faceid_cli::cli::{FrameArgs, OutputMode, RuntimeArgs};
use faceid_cli::commands::{CommandHandler, RegisterHandler};
use faceid_cli::errors::AppError;
use faceid_core::faces::BoundingBox;
use faceid_core::session::{ErrorKind, RegistrationReceipt, SessionError};

fn sample_args() -> FrameArgs {
    FrameArgs {
        frame: PathBuf::from("captures/enroll.png"),
        runtime: RuntimeArgs {
            store_dir: Some(PathBuf::from("/var/lib/faceid")),
            ..RuntimeArgs::default()
        },
    }
}

fn registered_report() -> RegisterReport {
    RegisterReport {
        registered: true,
        store_path: PathBuf::from("/var/lib/faceid/face_descriptor_demo.json"),
        receipt: Some(RegistrationReceipt {
            extractor: "face-recognition-128".into(),
            dimension: 128,
            created_at: None,
            bounding_box: BoundingBox {
                left: 4,
                top: 8,
                right: 96,
                bottom: 120,
            },
        }),
        error: None,
        events: Vec::new(),
    }
}

#[test]
fn register_handler_passes_verbose_flag_to_renderer() {
    let render_calls = Arc::new(Mutex::new(Vec::new()));
    let handler =
        RegisterHandler::with_dependencies(sample_args(), |_args| Ok(registered_report()), {
            let render_calls = Arc::clone(&render_calls);
            move |report, mode, verbose| {
                render_calls
                    .lock()
                    .unwrap()
                    .push((report.store_path.clone(), mode, verbose));
                Ok(())
            }
        });

    let exit = handler.execute(OutputMode::Json, true).unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);
    let calls = render_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].2);
}

#[test]
fn failed_registration_exits_with_failure() {
    let handler = RegisterHandler::with_dependencies(
        sample_args(),
        |_args| {
            Ok(RegisterReport {
                registered: false,
                store_path: PathBuf::from("/var/lib/faceid/face_descriptor_demo.json"),
                receipt: None,
                error: Some(SessionError::new(
                    ErrorKind::NoFaceDetected,
                    "No face detected. Try again.",
                )),
                events: Vec::new(),
            })
        },
        |_report, _mode, _verbose| Ok(()),
    );

    let exit = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(exit, ExitCode::from(1));
}

#[test]
fn register_handler_surfaces_run_errors() {
    let handler = RegisterHandler::with_dependencies(
        sample_args(),
        |_args| {
            Err(AppError::InvalidKey {
                key: "../escape".into(),
                message: "only ASCII letters, digits, '-' and '_' are allowed".into(),
            })
        },
        |_report, _mode, _verbose| Ok(()),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    match err {
        AppError::InvalidKey { key, .. } => assert_eq!(key, "../escape"),
        other => panic!("unexpected error: {other}"),
    }
}
