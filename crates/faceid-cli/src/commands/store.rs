use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, RuntimeArgs};
use crate::commands::CommandHandler;
use crate::enrollment::{self, ClearReport, StatusReport};
use crate::errors::AppResult;
use crate::output::{render_clear, render_status};

pub struct StatusHandler {
    args: RuntimeArgs,
    run: Box<dyn Fn(&RuntimeArgs) -> AppResult<StatusReport> + Send + Sync>,
    render: Box<dyn Fn(&StatusReport, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl StatusHandler {
    pub fn new(args: RuntimeArgs) -> Self {
        Self::with_dependencies(args, enrollment::run_status, render_status)
    }

    pub fn with_dependencies(
        args: RuntimeArgs,
        run: impl Fn(&RuntimeArgs) -> AppResult<StatusReport> + Send + Sync + 'static,
        render: impl Fn(&StatusReport, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for StatusHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.args)?;
        (self.render)(&report, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct ClearHandler {
    args: RuntimeArgs,
    run: Box<dyn Fn(&RuntimeArgs) -> AppResult<ClearReport> + Send + Sync>,
    render: Box<dyn Fn(&ClearReport, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl ClearHandler {
    pub fn new(args: RuntimeArgs) -> Self {
        Self::with_dependencies(args, enrollment::run_clear, render_clear)
    }

    pub fn with_dependencies(
        args: RuntimeArgs,
        run: impl Fn(&RuntimeArgs) -> AppResult<ClearReport> + Send + Sync + 'static,
        render: impl Fn(&ClearReport, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for ClearHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let report = (self.run)(&self.args)?;
        (self.render)(&report, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
