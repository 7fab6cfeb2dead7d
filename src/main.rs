//! tweetdb - personal Twitter archive CLI
//!
//! Main entry point for the tweetdb command-line tool.

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use tracing::{error, info};

use tweetdb::cli::{self, Cli};
use tweetdb::logging::init_cli_logging;
use tweetdb::*;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    init_cli_logging(cli.quiet, cli.verbose);

    let Some(plan) = parse_plan(&cli.ops, &cli.screen_name) else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if !config.output.colors {
        colored::control::set_override(false);
    }

    let mut options = SessionOptions::from_config(&config);
    options.show_progress = !cli.quiet;

    let client = if plan.needs_remote() {
        match TwitterClient::new(&config.api, &config.credentials) {
            Ok(client) => Some(client),
            Err(e) => fail(&e),
        }
    } else {
        None
    };

    let mut session = match Session::open(options) {
        Ok(session) => session,
        Err(e) => fail(&e),
    };

    let remote = client.as_ref().map(|c| c as &dyn RemoteSource);
    let summary = cli::execute(&plan, &mut session, remote);

    for report in &summary.reports {
        print_report(report);
    }
    if let Some(e) = &summary.aborted {
        eprintln!("{}", format_tweetdb_error(e));
    }

    if let Err(e) = session.close() {
        error!(error = %e, "Failed to close database");
    }
    info!(
        completed = summary.completed.len(),
        requested = plan.operations.len(),
        "Done"
    );
    Ok(())
}

fn load_config(cli: &Cli) -> tweetdb::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.paths.db = Some(db.clone());
    }
    if let Some(keywords) = &cli.keywords {
        config.paths.keywords = Some(keywords.clone());
    }
    if let Some(dir) = &cli.export_dir {
        config.paths.export_dir = Some(dir.clone());
    }
    if cli.no_charts {
        config.output.charts = false;
    }
    Ok(config)
}

fn fail(err: &TweetDbError) -> ! {
    eprintln!("{}", format_tweetdb_error(err));
    std::process::exit(1)
}

fn print_report(report: &FetchReport) {
    let status = match report.outcome {
        SwapOutcome::Replaced { rows } => {
            format!("{} {} rows stored", "✓".green(), format_number_usize(rows))
        }
        SwapOutcome::RolledBack => format!("{} rolled back, nothing changed", "✗".red()),
    };
    println!(
        "{} @{}: {} fetched, {}",
        report.kind.to_string().bold(),
        report.screen_name,
        format_number_usize(report.fetched),
        status
    );
}
