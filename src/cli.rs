//! Command-line interface for advisor
//!
//! Provides argument parsing using clap derive macros.

use crate::service::types::Persona;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Ask a device manual what is wrong, by voice or text
#[derive(Parser, Debug)]
#[command(
    name = "advisor",
    version,
    about = "Manual-backed device troubleshooting with narrated slide videos"
)]
pub struct Cli {
    /// Subcommand to execute (default: session)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: requests and transitions, -vv: stale completions too,
    /// -vvv: every notice as a JSON line)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Diagnosis service base URL (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

fn parse_persona(s: &str) -> Result<Persona, String> {
    s.parse::<Persona>().map_err(|e| e.to_string())
}

/// Parse a polling interval.
///
/// Bare numbers are seconds; anything else goes through `humantime` (`5s`, `1m30s`).
fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let interval = match s.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive session: type or speak questions, play the explanatory video
    Session,

    /// Diagnose a single question and exit
    Ask {
        /// The problem description (e.g., "black ink is faint")
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Narration style: technical, presenter, instructor
        #[arg(long, short = 'p', value_name = "PERSONA", value_parser = parse_persona)]
        persona: Option<Persona>,

        /// Skip video generation
        #[arg(long, conflicts_with_all = ["play", "save_audio"])]
        no_video: bool,

        /// Play the slides in the terminal once the video is ready
        #[arg(long)]
        play: bool,

        /// Write the narration audio to a file
        #[arg(long, value_name = "FILE")]
        save_audio: Option<PathBuf>,

        /// Write the manual page image attached to the diagnosis to a file
        #[arg(long, value_name = "FILE")]
        save_page: Option<PathBuf>,
    },

    /// Print the narration script for a question
    Script {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long, short = 'p', value_name = "PERSONA", value_parser = parse_persona)]
        persona: Option<Persona>,
    },

    /// Show which manuals the service has loaded
    Status {
        /// Keep polling until interrupted
        #[arg(long, short = 'w')]
        watch: bool,

        /// Polling interval (default from config). Examples: 10, 30s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
        interval: Option<Duration>,
    },

    /// Upload a PDF manual
    Upload {
        /// Path to the PDF
        path: PathBuf,
    },

    /// Ask the service to re-read its manuals
    Ingest,

    /// Report whether the last diagnosis helped
    Feedback {
        /// Outcome label (e.g., resolved, not_resolved)
        result: String,

        /// Free-form comment
        #[arg(long, short = 'm', value_name = "TEXT")]
        comment: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., service.base_url)
    Get {
        /// Dotted key path (e.g., session.persona, playback.tick_ms)
        key: String,
    },
    /// Set a configuration value by key
    Set {
        /// Dotted key path (e.g., session.persona, playback.tick_ms)
        key: String,
        /// Value to set
        value: String,
    },
    /// List current configuration values (optionally one section)
    List {
        /// Config section to show (e.g., service, session, playback, status)
        key: Option<String>,
    },
    /// Dump a commented configuration template
    Dump,
}

/// Join the words of a free-text argument.
pub fn join_text(words: &[String]) -> String {
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["advisor"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
        assert!(cli.api_url.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["advisor", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["advisor", "-v", "session", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["advisor", "status", "--config", "/tmp/a.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
        assert!(matches!(cli.command, Some(Commands::Status { .. })));
    }

    #[test]
    fn test_parse_ask_joins_words() {
        let cli = Cli::try_parse_from([
            "advisor",
            "ask",
            "black",
            "ink",
            "is",
            "faint",
            "--persona",
            "teacher",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask {
                text,
                persona,
                no_video,
                play,
                save_audio,
                save_page,
            }) => {
                assert_eq!(join_text(&text), "black ink is faint");
                assert_eq!(persona, Some(Persona::Instructor));
                assert!(!no_video);
                assert!(!play);
                assert!(save_audio.is_none());
                assert!(save_page.is_none());
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_parse_save_page_works_without_video() {
        let cli = Cli::try_parse_from([
            "advisor",
            "ask",
            "paper jam",
            "--no-video",
            "--save-page",
            "page.png",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask {
                no_video,
                save_page,
                ..
            }) => {
                assert!(no_video);
                assert_eq!(save_page, Some(PathBuf::from("page.png")));
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_parse_ask_requires_text() {
        assert!(Cli::try_parse_from(["advisor", "ask"]).is_err());
    }

    #[test]
    fn test_parse_ask_rejects_unknown_persona() {
        let result = Cli::try_parse_from(["advisor", "ask", "jam", "--persona", "pirate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_video_conflicts_with_play() {
        let result = Cli::try_parse_from(["advisor", "ask", "jam", "--no-video", "--play"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_status_interval() {
        let cli = Cli::try_parse_from(["advisor", "status", "--watch", "--interval", "1m30s"])
            .unwrap();
        match cli.command {
            Some(Commands::Status { watch, interval }) => {
                assert!(watch);
                assert_eq!(interval, Some(Duration::from_secs(90)));
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_parse_interval_bare_number_is_seconds() {
        assert_eq!(parse_interval("15"), Ok(Duration::from_secs(15)));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("soon").is_err());
    }

    #[test]
    fn test_parse_feedback() {
        let cli = Cli::try_parse_from(["advisor", "feedback", "resolved", "-m", "thanks"]).unwrap();
        match cli.command {
            Some(Commands::Feedback { result, comment }) => {
                assert_eq!(result, "resolved");
                assert_eq!(comment.as_deref(), Some("thanks"));
            }
            _ => panic!("Expected Feedback command"),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["advisor", "config", "set", "playback.tick_ms", "100"])
            .unwrap();
        match cli.command {
            Some(Commands::Config {
                action: ConfigAction::Set { key, value },
            }) => {
                assert_eq!(key, "playback.tick_ms");
                assert_eq!(value, "100");
            }
            _ => panic!("Expected Config Set command"),
        }
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["advisor", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Zsh })
        ));
    }
}
