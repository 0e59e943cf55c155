//! Clap command tree definition.
//!
//! Builds the full `clap::Command` tree for the `nautilus` binary. Each
//! subcommand accepts the global `--json` and `--verbose` flags; exit codes
//! are 0 on success, 1 on user error, 2 on store unavailability.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("nautilus")
        .about("Importance-weighted memory retrieval for AI agents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Include error kinds and per-result annotations")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("search")
                .about("Run the retrieval pipeline")
                .arg(Arg::new("query").required(true).help("Query text"))
                .arg(
                    Arg::new("n")
                        .long("n")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10")
                        .help("Maximum results"),
                )
                .arg(
                    Arg::new("trapdoor")
                        .long("trapdoor")
                        .action(ArgAction::SetTrue)
                        .help("Bypass context filtering for explicit recall"),
                ),
        )
        .subcommand(Command::new("status").about("Print store-wide counters"))
        .subcommand(
            Command::new("maintain")
                .about("Run the maintenance batch")
                .arg(
                    Arg::new("register-recent")
                        .long("register-recent")
                        .num_args(0..=1)
                        .default_missing_value("24")
                        .value_parser(clap::value_parser!(u64))
                        .help("Register writes for files modified in the last HOURS (default 24)"),
                )
                .arg(
                    Arg::new("promote")
                        .long("promote")
                        .action(ArgAction::SetTrue)
                        .help("Also run promotion and crystallization"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Report without mutating anything"),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify one file by age, or the whole memory tree")
                .arg(Arg::new("path").help("Workspace-relative path; omit to classify all")),
        )
        .subcommand(
            Command::new("gravity")
                .about("Print a chunk's effective mass and components")
                .arg(Arg::new("path").required(true).help("Workspace-relative path"))
                .arg(
                    Arg::new("lines")
                        .long("lines")
                        .help("Line range START:END for a chunk within the file"),
                ),
        )
        .subcommand(
            Command::new("boost")
                .about("Increase a chunk's explicit importance")
                .arg(Arg::new("path").required(true).help("Workspace-relative path"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .required(true)
                        .value_parser(clap::value_parser!(f64))
                        .help("Non-negative boost amount"),
                )
                .arg(
                    Arg::new("lines")
                        .long("lines")
                        .help("Line range START:END for a chunk within the file"),
                ),
        )
        .subcommand(Command::new("decay").about("Apply one decay step"))
        .subcommand(
            Command::new("vacuum")
                .about("Prune old access-log rows and zero-activity chunks"),
        )
        .subcommand(
            Command::new("chambers")
                .about("Promotion and crystallization")
                .subcommand_required(true)
                .subcommand(
                    Command::new("promote")
                        .about("Summarize corridor-age files into memory/corridors/")
                        .arg(
                            Arg::new("dry-run")
                                .long("dry-run")
                                .action(ArgAction::SetTrue)
                                .help("List candidates without summarizing"),
                        ),
                )
                .subcommand(
                    Command::new("crystallize")
                        .about("Distill vault-age files into memory/vaults/")
                        .arg(
                            Arg::new("dry-run")
                                .long("dry-run")
                                .action(ArgAction::SetTrue)
                                .help("List candidates without summarizing"),
                        ),
                ),
        )
        .subcommand(
            Command::new("doors")
                .about("Context tag diagnostics and batch tagging")
                .subcommand_required(true)
                .subcommand(
                    Command::new("classify")
                        .about("Classify free text into context tags")
                        .arg(Arg::new("text").required(true).help("Text to classify")),
                )
                .subcommand(Command::new("auto-tag").about("Tag every memory file")),
        )
        .subcommand(
            Command::new("mirrors")
                .about("Granularity links between renditions of one event")
                .subcommand_required(true)
                .subcommand(
                    Command::new("link")
                        .about("Link granularities under one event key")
                        .arg(Arg::new("key").required(true).help("Event key"))
                        .arg(Arg::new("raw").required(true).help("Raw file path"))
                        .arg(Arg::new("summary").help("Summary file path"))
                        .arg(Arg::new("lesson").help("Lesson file path")),
                )
                .subcommand(
                    Command::new("resolve")
                        .about("Resolve a path or event key to all siblings")
                        .arg(Arg::new("target").required(true).help("Path or event key")),
                )
                .subcommand(
                    Command::new("unlink")
                        .about("Remove all rows of an event")
                        .arg(Arg::new("key").required(true).help("Event key")),
                )
                .subcommand(
                    Command::new("auto-link")
                        .about("Link dated corridor/vault files to their daily raw files"),
                ),
        )
}
