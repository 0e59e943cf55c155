//! `nautilus`: CLI adapter over the Nautilus engine.
//!
//! Thin dispatch: parse the command tree, load configuration (environment
//! over config file over defaults), open the engine, run one operation,
//! format the output. Exit codes: 0 success, 1 user error, 2 store
//! unavailability or corruption.

mod commands;
mod format;

use clap::ArgMatches;
use nautilus_core::{NautilusConfig, NautilusError, Result};
use nautilus_engine::{MaintainOptions, Nautilus, SearchOptions};
use std::process;

use format::{
    format_auto_link, format_auto_tag, format_chamber, format_classify_stats, format_error,
    format_gravity, format_maintain, format_mirrors, format_promotion, format_results,
    format_status, format_tags, format_vacuum, OutputMode,
};

fn main() {
    // The library never installs a subscriber; the binary owns it.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NAUTILUS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = commands::build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let verbose = matches.get_flag("verbose");

    match run(&matches, mode, verbose) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", format_error(&e, mode, verbose));
            process::exit(exit_code(&e));
        }
    }
}

fn exit_code(err: &NautilusError) -> i32 {
    if err.is_store_error() {
        2
    } else {
        1
    }
}

fn run(matches: &ArgMatches, mode: OutputMode, verbose: bool) -> Result<String> {
    let config = NautilusConfig::load()?;
    let nautilus = Nautilus::open(config)?;

    match matches.subcommand() {
        Some(("search", sub)) => {
            let query = sub.get_one::<String>("query").expect("required");
            let options = SearchOptions {
                n: *sub.get_one::<usize>("n").expect("defaulted"),
                trapdoor: sub.get_flag("trapdoor"),
            };
            let results = nautilus.search(query, &options)?;
            Ok(format_results(&results, mode, verbose))
        }
        Some(("status", _)) => {
            let report = nautilus.status()?;
            Ok(format_status(&report, mode))
        }
        Some(("maintain", sub)) => {
            let options = MaintainOptions {
                register_recent_hours: sub.get_one::<u64>("register-recent").copied(),
                promote: sub.get_flag("promote"),
                dry_run: sub.get_flag("dry-run"),
            };
            let report = nautilus.maintain(&options);
            Ok(format_maintain(&report, mode))
        }
        Some(("classify", sub)) => match sub.get_one::<String>("path") {
            Some(path) => {
                let chamber = nautilus.classify(path);
                Ok(format_chamber(path, chamber, mode))
            }
            None => {
                let stats = nautilus.classify_all()?;
                Ok(format_classify_stats(&stats, mode))
            }
        },
        Some(("gravity", sub)) => {
            let path = sub.get_one::<String>("path").expect("required");
            let lines = parse_lines(sub.get_one::<String>("lines"))?;
            let (record, breakdown) = nautilus.gravity_of(path, lines)?;
            Ok(format_gravity(&record, &breakdown, mode))
        }
        Some(("boost", sub)) => {
            let path = sub.get_one::<String>("path").expect("required");
            let amount = *sub.get_one::<f64>("amount").expect("required");
            let lines = parse_lines(sub.get_one::<String>("lines"))?;
            nautilus.boost(path, amount, lines)?;
            Ok(format!("boosted {} by {}", path, amount))
        }
        Some(("decay", _)) => {
            let decayed = nautilus.decay()?;
            Ok(format!("decayed {} chunks", decayed))
        }
        Some(("vacuum", _)) => {
            let stats = nautilus.vacuum()?;
            Ok(format_vacuum(&stats, mode))
        }
        Some(("chambers", sub)) => match sub.subcommand() {
            Some(("promote", args)) => {
                let dry_run = args.get_flag("dry-run");
                let report = nautilus.promote(dry_run)?;
                Ok(format_promotion(&report, dry_run, mode))
            }
            Some(("crystallize", args)) => {
                let dry_run = args.get_flag("dry-run");
                let report = nautilus.crystallize(dry_run)?;
                Ok(format_promotion(&report, dry_run, mode))
            }
            _ => unreachable!("subcommand required"),
        },
        Some(("doors", sub)) => match sub.subcommand() {
            Some(("classify", args)) => {
                let text = args.get_one::<String>("text").expect("required");
                let tags = nautilus.doors_classify(text)?;
                Ok(format_tags(&tags, mode))
            }
            Some(("auto-tag", _)) => {
                let stats = nautilus.auto_tag()?;
                Ok(format_auto_tag(&stats, mode))
            }
            _ => unreachable!("subcommand required"),
        },
        Some(("mirrors", sub)) => match sub.subcommand() {
            Some(("link", args)) => {
                let key = args.get_one::<String>("key").expect("required");
                let raw = args.get_one::<String>("raw").expect("required");
                nautilus.mirrors_link(
                    key,
                    raw,
                    args.get_one::<String>("summary").map(String::as_str),
                    args.get_one::<String>("lesson").map(String::as_str),
                )?;
                Ok(format!("linked {}", key))
            }
            Some(("resolve", args)) => {
                let target = args.get_one::<String>("target").expect("required");
                let set = nautilus.mirrors_resolve(target)?;
                Ok(format_mirrors(&set, mode))
            }
            Some(("unlink", args)) => {
                let key = args.get_one::<String>("key").expect("required");
                let removed = nautilus.mirrors_unlink(key)?;
                Ok(format!("unlinked {} ({} rows)", key, removed))
            }
            Some(("auto-link", _)) => {
                let stats = nautilus.mirrors_auto_link()?;
                Ok(format_auto_link(&stats, mode))
            }
            _ => unreachable!("subcommand required"),
        },
        _ => unreachable!("subcommand required"),
    }
}

/// Parse an optional `START:END` line range.
fn parse_lines(arg: Option<&String>) -> Result<Option<(u32, u32)>> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    let (start, end) = arg.split_once(':').ok_or_else(|| {
        NautilusError::invalid_argument(format!("expected START:END line range, got '{}'", arg))
    })?;
    let start: u32 = start.parse().map_err(|_| {
        NautilusError::invalid_argument(format!("bad line number '{}'", start))
    })?;
    let end: u32 = end.parse().map_err(|_| {
        NautilusError::invalid_argument(format!("bad line number '{}'", end))
    })?;
    Ok(Some((start, end)))
}
