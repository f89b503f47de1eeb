use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "faceid",
    about = "Register and verify a face against a single enrolled template",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable output
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll the face found in a frame, replacing any previous enrollment
    Register(FrameArgs),
    /// Verify the face found in a frame against the enrolled template
    Login(FrameArgs),
    /// Report whether a compatible face is enrolled
    Status(RuntimeArgs),
    /// Remove the enrolled face
    Clear(RuntimeArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct RuntimeArgs {
    /// Configuration file to use instead of the default lookup locations
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enrollment store directory (falls back to $FACEID_STORE_DIR, then config)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Directory holding the extractor's model.json manifest
    #[arg(long)]
    pub model_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct FrameArgs {
    /// PNG image served as the live camera feed; precomputed faces are read
    /// from <frame>.faces.json
    #[arg(long)]
    pub frame: PathBuf,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_accepts_runtime_overrides() {
        let cli = Cli::try_parse_from([
            "faceid",
            "--json",
            "login",
            "--frame",
            "live.png",
            "--store-dir",
            "/tmp/store",
        ])
        .unwrap();

        assert_eq!(cli.output_mode(), OutputMode::Json);
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.frame, PathBuf::from("live.png"));
                assert_eq!(args.runtime.store_dir, Some(PathBuf::from("/tmp/store")));
                assert!(args.runtime.config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn register_requires_a_frame() {
        assert!(Cli::try_parse_from(["faceid", "register"]).is_err());
    }

    #[test]
    fn verbosity_counts_flags() {
        let cli = Cli::try_parse_from(["faceid", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output_mode(), OutputMode::Human);
    }
}
