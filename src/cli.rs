use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::logging;
use crate::workorder::filename::IdMode;

#[derive(Debug, Parser)]
#[command(name = "osrec")]
#[command(version, about = "Work-order store with recovery from generated documents")]
pub struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter (e.g. `info`, `osrec=debug`). Falls back to OSREC_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recover records missing from the store out of the output documents.
    Scan(ScanArgs),
    /// Show what the output documents hold for a single id.
    ScanOne {
        #[arg(long)]
        id: u32,
    },
    /// List the output documents whose name opens with an id.
    Locate {
        #[arg(long)]
        id: u32,
        /// Delete the documents instead of listing them.
        #[arg(long)]
        delete: bool,
    },
    /// Paths, store summary and environment overrides.
    Status,
    /// Check the store file against its invariants.
    Verify {
        #[arg(long)]
        strict: bool,
    },
    /// Replace the store with a JSON file, through the persistence guard.
    Import {
        #[arg(long)]
        input: PathBuf,
        /// Overwrite a store file that cannot be parsed.
        #[arg(long)]
        force: bool,
    },
    /// Write the store as a `;`-separated CSV spreadsheet.
    Export {
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Compute the reconciliation without writing the store.
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    concurrency: Option<usize>,
    /// `anchored` or `loose`.
    #[arg(long)]
    id_mode: Option<IdMode>,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let report = match cli.command {
        Command::Scan(args) => commands::scan::run(&commands::scan::ScanCommandOptions {
            dry_run: args.dry_run,
            concurrency: args.concurrency,
            id_mode: args.id_mode,
            progress: !cli.json,
        })?,
        Command::ScanOne { id } => commands::scan_one::run(id)?,
        Command::Locate { id, delete } => commands::locate::run(id, delete)?,
        Command::Status => commands::status::run()?,
        Command::Verify { strict } => {
            commands::verify::run(&commands::verify::VerifyOptions { strict })?
        }
        Command::Import { input, force } => commands::import::run(&input, force)?,
        Command::Export { output } => commands::export::run(&output)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(2);
    }
    Ok(())
}
