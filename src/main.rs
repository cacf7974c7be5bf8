use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process::ExitCode;

mod libdeck;

use crate::libdeck::db::PackageIds;
use crate::libdeck::deck::{convert_file, DEFAULT_DECK_NAME};
use crate::libdeck::package::write_package;

#[derive(Parser, Debug)]
#[command(name = "mcq-deck")]
#[command(version, about, long_about = None)]
struct Args {
    /// Tab separated export: `question<br>o1<br>o2<br>o3<br>o4<TAB>answer`
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Where to write the `.apkg`
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
    #[arg(long, default_value = DEFAULT_DECK_NAME)]
    deck_name: String,
    /// Fixed deck id instead of a random one
    #[arg(long)]
    deck_id: Option<i64>,
    /// Fixed note type id instead of a random one
    #[arg(long)]
    model_id: Option<i64>,
    #[arg(short, long, default_value = "error")]
    log_level: String,
}

impl Args {
    fn package_ids(&self) -> PackageIds {
        let random = PackageIds::random();
        PackageIds {
            deck_id: self.deck_id.unwrap_or(random.deck_id),
            model_id: self.model_id.unwrap_or(random.model_id),
        }
    }
}

fn run(args: &Args) -> libdeck::Result<()> {
    let deck = convert_file(&args.input, &args.deck_name)?;
    let ids = args.package_ids();
    debug!("[Setup] Deck ids: {:?}", ids);
    write_package(&deck, &args.output, ids)
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();
    info!(
        "{}",
        format!("Converting {:?} into {:?}", args.input, args.output).cyan()
    );

    match run(&args) {
        Ok(()) => {
            println!(
                "{}",
                format!("Successfully created Anki deck: {}", args.output.display()).green()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("[Setup] {:?}", err);
            eprintln!("{}", format!("Error: {}", err).bright_red());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn deck_name_defaults() {
        let args = Args::parse_from(["mcq-deck", "in.txt", "out.apkg"]);
        assert_eq!(args.deck_name, DEFAULT_DECK_NAME);
        assert_eq!(args.input, PathBuf::from("in.txt"));
        assert_eq!(args.output, PathBuf::from("out.apkg"));
        assert_eq!(args.log_level, "error");
    }

    #[test]
    fn fixed_ids_override_random_ones() {
        let args = Args::parse_from([
            "mcq-deck",
            "in.txt",
            "out.apkg",
            "--deck-name",
            "Biology",
            "--deck-id",
            "42",
        ]);
        let ids = args.package_ids();
        assert_eq!(args.deck_name, "Biology");
        assert_eq!(ids.deck_id, 42);
        assert!((1 << 30..1 << 31).contains(&ids.model_id));
    }

    #[test]
    fn run_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "mcq-deck".into(),
            dir.path().join("missing.txt").into_os_string(),
            dir.path().join("out.apkg").into_os_string(),
        ]);
        assert!(run(&args).is_err());
        assert!(!dir.path().join("out.apkg").exists());
    }
}
