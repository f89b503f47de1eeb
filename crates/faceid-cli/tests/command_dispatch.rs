use std::path::PathBuf;

use faceid_cli::cli::{Commands, FrameArgs, RuntimeArgs};
use faceid_cli::commands::{
    ClearHandler, CommandHandler, LoginHandler, RegisterHandler, StatusHandler,
};

fn sample_frame_args() -> FrameArgs {
    FrameArgs {
        frame: PathBuf::from("live.png"),
        runtime: RuntimeArgs::default(),
    }
}

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn register_command_dispatches_register_handler() {
    assert_dispatch::<RegisterHandler>(Commands::Register(sample_frame_args()));
}

#[test]
fn login_command_dispatches_login_handler() {
    assert_dispatch::<LoginHandler>(Commands::Login(sample_frame_args()));
}

#[test]
fn status_command_dispatches_status_handler() {
    assert_dispatch::<StatusHandler>(Commands::Status(RuntimeArgs::default()));
}

#[test]
fn clear_command_dispatches_clear_handler() {
    assert_dispatch::<ClearHandler>(Commands::Clear(RuntimeArgs::default()));
}
