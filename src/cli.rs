use std::path::PathBuf;

mod extract;
mod init;
mod report;
mod terminal;

use clap::ArgAction;
use extract::Extract;
use init::Init;
use report::Report;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The project root; configuration and relative paths are resolved
    /// against it
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Extract(Extract::default()))
            .run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Extract requirements from specifications (default)
    Extract(Extract),

    /// Link annotations to requirements and report compliance
    ///
    /// Exits with status 1 if any requirement is incomplete.
    Report(Report),

    /// Write a default configuration file
    Init(Init),
}

impl Command {
    fn run(self, root: &std::path::Path) -> anyhow::Result<()> {
        match self {
            Self::Extract(command) => command.run(root),
            Self::Report(command) => command.run(root),
            Self::Init(command) => command.run(root),
        }
    }
}

/// Output format shared by the subcommands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn no_subcommand_defaults_to_extract() {
        let cli = Cli::try_parse_from(["spectrace"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["spectrace", "extract", "-vv", "--root", "project"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, PathBuf::from("project"));
        assert!(matches!(cli.command, Some(Command::Extract(_))));
    }

    #[test]
    fn report_requires_annotations() {
        assert!(Cli::try_parse_from(["spectrace", "report"]).is_err());
        let cli = Cli::try_parse_from([
            "spectrace",
            "report",
            "--annotations",
            "annotations.json",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Report(_))));
    }
}
