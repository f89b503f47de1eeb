use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use faceid_cli::cli::{OutputMode, RuntimeArgs};
use faceid_cli::commands::{ClearHandler, CommandHandler, StatusHandler};
use faceid_cli::enrollment::{ClearReport, StatusReport};
use faceid_cli::errors::AppError;

fn store_path() -> PathBuf {
    PathBuf::from("/var/lib/faceid/face_descriptor_demo.json")
}

#[test]
fn status_handler_renders_report() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let handler = StatusHandler::with_dependencies(
        RuntimeArgs::default(),
        |_args| {
            Ok(StatusReport {
                store_path: store_path(),
                config_source: None,
                enrolled: true,
                compatible: true,
                extractor: Some("face-recognition-128".into()),
                dimension: Some(128),
                created_at: None,
                problem: None,
            })
        },
        {
            let rendered = Arc::clone(&rendered);
            move |report, mode| {
                rendered
                    .lock()
                    .unwrap()
                    .push((report.enrolled, matches!(mode, OutputMode::Json)));
                Ok(())
            }
        },
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    let calls = rendered.lock().unwrap();
    assert_eq!(calls.as_slice(), &[(true, true)]);
}

#[test]
fn clear_handler_renders_report() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let handler = ClearHandler::with_dependencies(
        RuntimeArgs::default(),
        |_args| {
            Ok(ClearReport {
                store_path: store_path(),
                removed: true,
            })
        },
        {
            let rendered = Arc::clone(&rendered);
            move |report, _mode| {
                rendered.lock().unwrap().push(report.removed);
                Ok(())
            }
        },
    );

    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(rendered.lock().unwrap().as_slice(), &[true]);
}

#[test]
fn store_handlers_propagate_errors() {
    let handler = StatusHandler::with_dependencies(
        RuntimeArgs::default(),
        |_args| {
            Err(AppError::StoreCorrupt {
                path: store_path(),
                message: "invalid enrollment record".into(),
            })
        },
        |_report, _mode| Ok(()),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert!(matches!(err, AppError::StoreCorrupt { .. }));
    assert_eq!(err.exit_code(), ExitCode::from(3));
}
