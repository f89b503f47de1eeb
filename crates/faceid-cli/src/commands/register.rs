use std::any::Any;
use std::process::ExitCode;

use crate::auth::{self, RegisterReport};
use crate::cli::{FrameArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_register;

pub struct RegisterHandler {
    args: FrameArgs,
    run: Box<dyn Fn(&FrameArgs) -> AppResult<RegisterReport> + Send + Sync>,
    render: Box<dyn Fn(&RegisterReport, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl RegisterHandler {
    pub fn new(args: FrameArgs) -> Self {
        Self::with_dependencies(args, auth::run_register, render_register)
    }

    pub fn with_dependencies(
        args: FrameArgs,
        run: impl Fn(&FrameArgs) -> AppResult<RegisterReport> + Send + Sync + 'static,
        render: impl Fn(&RegisterReport, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RegisterHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.args)?;
        (self.render)(&report, mode, verbose)?;
        if report.registered {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(1))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
