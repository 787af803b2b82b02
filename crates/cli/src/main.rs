use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use earmark_config::ConfigManager;
use std::path::PathBuf;

mod commands;
mod player;

fn build_cli() -> Command {
    Command::new("earmark")
        .version("0.1.0")
        .author("Earmark Contributors")
        .about("Audiobook player that remembers where you stopped listening")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .subcommand(
            Command::new("play")
                .about("Play an audiobook directory, resuming where you left off")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_name("BOOK_DIR")
                        .help("Directory containing the book's audio files"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show files, known lengths and the saved position of a book")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_name("BOOK_DIR")
                        .help("Directory containing the book's audio files"),
                ),
        )
        .subcommand(
            Command::new("forget")
                .about("Forget the saved position of a book")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_name("BOOK_DIR")
                        .help("Directory containing the book's audio files"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand(Command::new("init").about("Write a default config file"))
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print where the config file lives"))
                .subcommand(Command::new("reset").about("Overwrite the config with defaults")),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config-dir") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir))
            .context("Failed to open config directory"),
        None => ConfigManager::new().context("Failed to locate config directory"),
    }
}

fn book_dir(matches: &ArgMatches) -> Result<PathBuf> {
    matches
        .get_one::<String>("dir")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Book directory is required"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;

    match matches.subcommand() {
        Some(("play", sub_matches)) => {
            let config = manager
                .load_with_env_overrides()
                .context("Failed to load configuration")?;
            player::play_book(&book_dir(sub_matches)?, &config, &manager)
        }
        Some(("info", sub_matches)) => {
            let config = manager.load_or_default();
            commands::show_book_info(&book_dir(sub_matches)?, &manager.positions_dir(&config))
        }
        Some(("forget", sub_matches)) => {
            let config = manager.load_or_default();
            commands::forget_book(&book_dir(sub_matches)?, &manager.positions_dir(&config))
        }
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&manager),
            Some(("show", _)) => commands::config_show(&manager),
            Some(("path", _)) => commands::config_path(&manager),
            Some(("reset", _)) => commands::config_reset(&manager),
            _ => {
                build_cli().print_help()?;
                Ok(())
            }
        },
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
