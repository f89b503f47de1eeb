use std::any::Any;
use std::process::ExitCode;

use crate::auth::{self, LoginReport};
use crate::cli::{FrameArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_login;

pub struct LoginHandler {
    args: FrameArgs,
    run: Box<dyn Fn(&FrameArgs) -> AppResult<LoginReport> + Send + Sync>,
    render: Box<dyn Fn(&LoginReport, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl LoginHandler {
    pub fn new(args: FrameArgs) -> Self {
        Self::with_dependencies(args, auth::run_login, render_login)
    }

    pub fn with_dependencies(
        args: FrameArgs,
        run: impl Fn(&FrameArgs) -> AppResult<LoginReport> + Send + Sync + 'static,
        render: impl Fn(&LoginReport, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for LoginHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.args)?;
        (self.render)(&report, mode, verbose)?;
        if report.accepted {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(1))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
