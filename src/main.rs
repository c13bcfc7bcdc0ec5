use advisor::app::{
    run_ask_command, run_feedback_command, run_ingest_command, run_script_command,
    run_session_command, run_status_command, run_upload_command,
};
use advisor::cli::{Cli, Commands, ConfigAction, join_text};
use advisor::config::Config;
use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Session) => {
            let config = load_config(&cli)?;
            run_session_command(config, cli.quiet, cli.verbose).await?;
        }
        Some(Commands::Ask {
            ref text,
            persona,
            no_video,
            play,
            ref save_audio,
            ref save_page,
        }) => {
            let config = load_config(&cli)?;
            run_ask_command(
                config,
                &join_text(text),
                persona,
                no_video,
                play,
                save_audio.clone(),
                save_page.clone(),
                cli.quiet,
                cli.verbose,
            )
            .await?;
        }
        Some(Commands::Script { ref text, persona }) => {
            let config = load_config(&cli)?;
            run_script_command(config, &join_text(text), persona).await?;
        }
        Some(Commands::Status { watch, interval }) => {
            let config = load_config(&cli)?;
            run_status_command(config, watch, interval).await?;
        }
        Some(Commands::Upload { ref path }) => {
            let config = load_config(&cli)?;
            run_upload_command(config, path).await?;
        }
        Some(Commands::Ingest) => {
            let config = load_config(&cli)?;
            run_ingest_command(config).await?;
        }
        Some(Commands::Feedback {
            ref result,
            ref comment,
        }) => {
            let config = load_config(&cli)?;
            run_feedback_command(config, result, comment.as_deref()).await?;
        }
        Some(Commands::Config { ref action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "advisor", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from `--config` or the default path, then apply overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let mut config = config.with_env_overrides();
    if let Some(url) = &cli.api_url {
        config.service.base_url = url.clone();
    }
    Ok(config)
}

/// Handle configuration management commands.
fn handle_config_command(
    action: &ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Get { key } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            match config.get_value_by_path(key) {
                Ok(value) => println!("{value}"),
                Err(e) => {
                    eprintln!("{} {e}", "Error:".red());
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            Config::set_value_by_path(&config_path, key, value)?;
            println!("Set {key} = {value}");
        }
        ConfigAction::List { key } => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            let text = match key.as_deref() {
                Some(section) => config.display_section(section)?,
                None => config.to_display_toml()?,
            };
            print!("{text}");
            if !config_path.exists() {
                eprintln!(
                    "{}",
                    format!("(defaults; no file at {})", config_path.display()).dimmed()
                );
            }
        }
        ConfigAction::Dump => {
            print!("{}", Config::dump_template());
        }
    }

    Ok(())
}
