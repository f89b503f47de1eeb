use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod login;
mod register;
mod store;

pub use login::LoginHandler;
pub use register::RegisterHandler;
pub use store::{ClearHandler, StatusHandler};

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Register(args) => Box::new(RegisterHandler::new(args)),
            Commands::Login(args) => Box::new(LoginHandler::new(args)),
            Commands::Status(args) => Box::new(StatusHandler::new(args)),
            Commands::Clear(args) => Box::new(ClearHandler::new(args)),
        }
    }
}
