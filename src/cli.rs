//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `radiofree` binary.
//!
//! ## Commands
//!
//! - `run`: interactive DJ loop against MPD
//! - `queue-one`, `queue-ten`, `playlist`, `theme`: one-shot recommendations
//!   seeded by the track MPD is playing
//! - `insight`: facts about the current track
//! - `mystery`: run one mystery round and pick an option
//! - `history`: latest plays recorded by `run`
//! - `init-config`: write a default settings file
//! - `completion`: shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! radiofree init-config
//! radiofree run
//! radiofree theme "rainy sunday morning"
//! RUST_LOG=debug radiofree queue-ten
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "radiofree")]
#[command(about = "RadioFree: a language-model DJ that keeps your MPD queue fresh")]
#[command(version)]
pub struct Args {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true, env = "RADIOFREE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the interactive DJ loop
    ///
    /// Polls MPD for the current track, keeps the queue topped up while
    /// auto-DJ is on, and reads single-key commands from stdin. Press `h`
    /// inside the loop for the key map.
    Run {
        /// Start with auto-DJ already enabled
        #[arg(long)]
        auto_dj: bool,

        /// Start with mystery mode already enabled
        #[arg(long)]
        mystery: bool,
    },

    /// Queue one recommended follow-up to the current track
    QueueOne,

    /// Queue up to ten recommended follow-ups to the current track
    QueueTen,

    /// Queue a playlist inspired by the current track
    Playlist,

    /// Queue a playlist around a free-form theme
    Theme {
        /// Theme to build the playlist around, e.g. "late night drive"
        #[arg(required = true, num_args = 1..)]
        theme: Vec<String>,
    },

    /// Print a few facts about the current track
    Insight,

    /// Run one mystery round for the current track
    ///
    /// Prints the options, pre-queues the model's hidden pick, and reads the
    /// listener's choice from stdin (empty input keeps the hidden pick).
    Mystery,

    /// Show recently played tracks recorded by `run`
    ///
    /// Each line shows who queued the track (dj, user or unknown) and any
    /// like (+) or skip (-) feedback given with the `l`/`d` keys.
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// List tracks saved with the `s` key instead of plays
        #[arg(long)]
        saved: bool,
    },

    /// Write a settings file populated with defaults
    InitConfig {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: radiofree completion bash > ~/.local/share/bash-completion/completions/radiofree
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Command {
    /// Whether the command talks to the model and MPD.
    #[must_use]
    pub fn needs_station(&self) -> bool {
        !matches!(
            self,
            Command::History { .. } | Command::InitConfig { .. } | Command::Completion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_theme_joins_words() {
        let args = Args::try_parse_from(["radiofree", "theme", "late", "night", "drive"]).unwrap();
        assert_eq!(
            args.command,
            Command::Theme {
                theme: vec!["late".to_string(), "night".to_string(), "drive".to_string()]
            }
        );
        assert!(Args::try_parse_from(["radiofree", "theme"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let args =
            Args::try_parse_from(["radiofree", "history", "--config", "/tmp/rf.json", "-l", "5"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/rf.json")));
        assert_eq!(
            args.command,
            Command::History {
                limit: 5,
                saved: false
            }
        );
        assert!(!args.command.needs_station());
    }

    #[test]
    fn test_history_saved_flag() {
        let args = Args::try_parse_from(["radiofree", "history", "--saved"]).unwrap();
        assert_eq!(
            args.command,
            Command::History {
                limit: 20,
                saved: true
            }
        );
    }

    #[test]
    fn test_run_flags() {
        let args = Args::try_parse_from(["radiofree", "run", "--auto-dj"]).unwrap();
        assert_eq!(
            args.command,
            Command::Run {
                auto_dj: true,
                mystery: false
            }
        );
        assert!(args.command.needs_station());
    }
}
