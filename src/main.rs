mod board;
mod bot;
mod capture;
mod classify;
mod config;
mod input;
mod ocr;
mod select;
mod shutdown;
mod template;

#[cfg(test)]
mod fixtures;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

use crate::bot::{Bot, Timing};
use crate::capture::WindowScreen;
use crate::classify::{CellDump, Classifier};
use crate::config::Config;
use crate::input::SystemPointer;
use crate::ocr::OcrMode;
use crate::select::FrontierPicker;
use crate::template::TemplateSet;

fn cli() -> Command {
    Command::new("sweeper-bot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plays a Minesweeper window by screen capture, template matching and simulated clicks")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON config file; defaults are used if it does not exist")
                .default_value(config::DEFAULT_CONFIG_PATH)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("window-title")
                .long("window-title")
                .value_name("TITLE")
                .help("Capture the first window whose title contains TITLE"),
        )
        .arg(
            Arg::new("cell-size")
                .long("cell-size")
                .value_name("PIXELS")
                .help("Cell edge length in captured pixels")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("templates")
                .long("templates")
                .value_name("DIR")
                .help("Directory holding cell.png, mine.png, noMine.png and flag.png")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("debug-cells")
                .long("debug-cells")
                .value_name("DIR")
                .help("Save every classified cell as a labeled PNG in DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Seed move selection for a reproducible run")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("ocr")
                .long("ocr")
                .value_name("MODE")
                .help("Digit recognition backend")
                .value_parser(["tesseract", "off"]),
        )
        .arg(
            Arg::new("write-config")
                .long("write-config")
                .help("Write the effective configuration to the --config path and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print the effective configuration as JSON and exit")
                .action(ArgAction::SetTrue),
        )
}

fn config_path(matches: &ArgMatches) -> &Path {
    matches
        .get_one::<PathBuf>("config")
        .map(PathBuf::as_path)
        .unwrap_or(Path::new(config::DEFAULT_CONFIG_PATH))
}

/// Config file first, then command-line overrides.
fn resolve_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = Config::load(config_path(matches))?;

    if let Some(title) = matches.get_one::<String>("window-title") {
        config.window_title = title.clone();
    }
    if let Some(&cell_size) = matches.get_one::<u32>("cell-size") {
        config.cell_size = cell_size;
    }
    if let Some(dir) = matches.get_one::<PathBuf>("templates") {
        config.template_dir = dir.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("debug-cells") {
        config.debug_cells_dir = Some(dir.clone());
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(seed);
    }
    if let Some(mode) = matches.get_one::<String>("ocr") {
        config.ocr.mode = mode.parse::<OcrMode>()?;
    }

    config.validate()?;
    Ok(config)
}

fn countdown_line(config: &Config) -> String {
    format!(
        "Switch to the game window within {:?}. Press Ctrl+C to stop.",
        config.startup_delay()
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = resolve_config(&matches)?;

    if matches.get_flag("print-config") {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    if matches.get_flag("write-config") {
        let path = config_path(&matches);
        config.save(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    // Everything that can fail at startup fails here, before the loop.
    let templates = TemplateSet::load(&config.template_dir, &config.templates)
        .context("Failed to load reference templates")?;
    let ocr = ocr::from_config(&config.ocr);
    let classifier = Classifier::new(templates, ocr, config.cell_size, config.unrevealed_threshold);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl+C received, stopping after the current step");
            trigger.trigger();
        }
    });

    let mut bot = Bot::new(
        WindowScreen::from_config(&config),
        SystemPointer::default(),
        FrontierPicker::from_seed(config.seed),
        classifier,
        Timing::from_config(&config),
        shutdown,
    );
    if let Some(dir) = &config.debug_cells_dir {
        bot = bot.with_observer(Box::new(CellDump::new(dir)?));
    }

    println!("Sweeper bot starting...");
    println!("Target window: \"{}\"", config.window_title);
    println!("{}", countdown_line(&config));

    let summary = bot.run().await?;
    println!(
        "Finished: {} ({} moves over {} boards)",
        summary.outcome, summary.moves, summary.boards
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["sweeper-bot", "--config", "no/such/config.json"];
        argv.extend_from_slice(args);
        cli().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let config = resolve_config(&parse(&[
            "--window-title",
            "Minesweeper",
            "--cell-size",
            "16",
            "--seed",
            "9",
            "--ocr",
            "off",
            "--templates",
            "assets",
        ]))
        .unwrap();
        assert_eq!(config.window_title, "Minesweeper");
        assert_eq!(config.cell_size, 16);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.ocr.mode, OcrMode::Off);
        assert_eq!(config.template_dir, PathBuf::from("assets"));
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        assert_eq!(resolve_config(&parse(&[])).unwrap(), Config::default());
    }

    #[test]
    fn test_config_output_flags() {
        let matches = parse(&["--write-config"]);
        assert!(matches.get_flag("write-config"));
        assert!(!matches.get_flag("print-config"));
        assert_eq!(config_path(&matches), Path::new("no/such/config.json"));
    }

    #[test]
    fn test_countdown_shows_sub_second_delays() {
        let mut config = Config::default();
        config.startup_delay_ms = 500;
        assert!(countdown_line(&config).contains("within 500ms"));
        config.startup_delay_ms = 5000;
        assert!(countdown_line(&config).contains("within 5s"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        assert!(resolve_config(&parse(&["--cell-size", "0"])).is_err());
        assert!(cli()
            .try_get_matches_from(["sweeper-bot", "--ocr", "llm"])
            .is_err());
    }
}
