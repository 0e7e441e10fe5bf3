//! Commandline argument parser using clap for StudyScribe

use crate::config::{ConfigError, Settings};
use crate::phase::Track;
use crate::records::UserGroup;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Where the data lives and how the session is configured. Shared by both
/// binaries.
#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// Root folder of the durable store
    #[arg(short = 'r', long = "root", default_value = ".")]
    pub root: PathBuf,

    /// Read-only folder with default files to fall back on
    #[arg(short = 'b', long = "bundled")]
    pub bundled: Option<PathBuf>,

    /// Settings file in RON format
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Seconds between two backups of a running log, overrides the settings file
    #[arg(long = "backup-period")]
    pub backup_period: Option<f64>,

    /// Seconds the user button stays inactive after a click, overrides the settings file
    #[arg(long = "cooldown")]
    pub button_cooldown: Option<f64>,
}

impl StoreArgs {
    /// The settings file (or the defaults) with the command line overrides
    /// applied.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_path(path)?,
            None => Settings::default(),
        };
        if let Some(period) = self.backup_period {
            settings.backup_period = period;
        }
        if let Some(cooldown) = self.button_cooldown {
            settings.button_cooldown = cooldown;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Arguments of the headless `studyscribe` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct ScribeArgs {
    /// Store and settings
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    /// Which task to perform, running a session or inspecting files
    pub command: CommandTask,
}

/// The subcommands of `studyscribe`.
#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Run one participant through a track with synthetic sensor data
    #[command(about)]
    Run(RunCommand),

    /// Report whether data files were finalized or are backups
    #[command(about)]
    Inspect(InspectCommand),
}

/// Arguments of `studyscribe run`.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct RunCommand {
    /// Id of the participant, registered if not known yet
    #[arg(short = 'u', long = "user")]
    pub user_id: String,

    /// Group of a newly registered participant
    #[arg(short = 'g', long = "group", default_value = "unset")]
    pub group: UserGroup,

    /// Seconds between two samples for a newly registered participant
    #[arg(short = 'i', long = "interval", default_value_t = 0.1)]
    pub interval: f64,

    /// Track to run, Prices or Locations
    #[arg(short = 't', long = "track")]
    pub track: Track,

    /// Seconds the estimation phase lasts
    #[arg(short = 's', long = "seconds", default_value_t = 10.0)]
    pub seconds: f64,

    /// Ticks per second
    #[arg(long = "rate", default_value_t = 60.0)]
    pub tick_rate: f64,

    /// Skip the test run and start the estimation right away
    #[arg(long = "no-test")]
    pub no_test: bool,
}

/// Arguments of `studyscribe inspect`.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct InspectCommand {
    /// Files to inspect
    #[clap(num_args = 1..)]
    pub files: Vec<PathBuf>,
}

/// Arguments of the `monitor` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about = "Operator dashboard for a StudyScribe session")]
pub struct MonitorArgs {
    /// Store and settings
    #[command(flatten)]
    pub store: StoreArgs,

    /// Screen refreshes per second
    #[arg(long = "rate", default_value_t = 30.0)]
    pub tick_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command() {
        let args = ScribeArgs::try_parse_from([
            "studyscribe",
            "--root",
            "/tmp/study",
            "--backup-period",
            "5",
            "run",
            "-u",
            "12",
            "-g",
            "b",
            "-t",
            "Locations",
        ])
        .unwrap();

        assert_eq!(args.store.root, PathBuf::from("/tmp/study"));
        let settings = args.store.settings().unwrap();
        assert_eq!(settings.backup_period, 5.0);
        assert_eq!(settings.button_cooldown, 10.0);

        match args.command {
            CommandTask::Run(run) => {
                assert_eq!(run.user_id, "12");
                assert_eq!(run.group, UserGroup::GroupB);
                assert_eq!(run.track, Track::Locations);
                assert!(!run.no_test);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_track_is_rejected() {
        assert!(ScribeArgs::try_parse_from(["studyscribe", "run", "-u", "1", "-t", "Colors"]).is_err());
    }

    #[test]
    fn bad_override_is_rejected() {
        let args =
            ScribeArgs::try_parse_from(["studyscribe", "--cooldown=-1", "inspect", "a.json"]).unwrap();
        assert!(args.store.settings().is_err());

        let args =
            ScribeArgs::try_parse_from(["studyscribe", "--cooldown=inf", "inspect", "a.json"]).unwrap();
        assert!(args.store.settings().is_err());
    }
}
