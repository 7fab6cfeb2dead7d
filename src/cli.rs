//! CLI definitions for tweetdb.
//!
//! The interface is a single combined flag string plus a screen name, e.g.
//! `tweetdb -tua jack`. Clap handles the ambient long options; the flag
//! string itself is validated by [`parse_plan`].

use crate::error::TweetDbError;
use crate::pipeline::{FetchReport, Session};
use crate::remote::RemoteSource;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, warn};

/// Printed for any malformed invocation.
pub const USAGE: &str = "Incorrect usage:
    tweetdb -[utfra] <screen_name>

    -u  fetch the profile
    -t  fetch up to 3250 recent tweets
    -f  fetch up to 1000 followers
    -r  fetch up to 1000 friends
    -a  analyze stored tweets against the keyword list

Flags combine (e.g. -tua) and always run in the order u, t, f, r, a.";

static FLAGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-([utfra]+)$").expect("valid regex"));
static SCREEN_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").expect("valid regex"));

/// tweetdb - pull a Twitter account into `SQLite` and analyze it
#[derive(Parser, Debug)]
#[command(name = "tweetdb")]
#[command(version)]
#[command(about = "Fetch tweets, profiles, followers and friends into SQLite")]
#[command(override_usage = "tweetdb [OPTIONS] -<utfra> <SCREEN_NAME>")]
#[command(long_about = r"
tweetdb - fetch a Twitter account's data into a local SQLite database and
run a keyword analysis over the stored tweets.

Operations (combine them into one flag, e.g. -tua):
  u  fetch the profile
  t  fetch up to 3250 recent tweets
  f  fetch up to 1000 followers
  r  fetch up to 1000 friends
  a  analyze stored tweets against the keyword list

Operations always run in the order u, t, f, r, a. Re-running a fetch
replaces the stored rows it touches and leaves everything else alone.
")]
pub struct Cli {
    /// Combined operation flags, e.g. -tua
    #[arg(value_name = "FLAGS", allow_hyphen_values = true)]
    pub ops: String,

    /// Account to operate on
    #[arg(value_name = "SCREEN_NAME")]
    pub screen_name: String,

    /// Path to the database file
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Path to the keyword list
    #[arg(long)]
    pub keywords: Option<PathBuf>,

    /// Directory for data.csv, test.csv and READ.csv
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Config file to use instead of ~/.config/tweetdb/config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the terminal charts after analysis
    #[arg(long)]
    pub no_charts: bool,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// One operation selectable from the flag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Profile,
    Tweets,
    Followers,
    Friends,
    Analyze,
}

impl Operation {
    /// Execution order.
    pub const ORDER: [Self; 5] = [
        Self::Profile,
        Self::Tweets,
        Self::Followers,
        Self::Friends,
        Self::Analyze,
    ];

    #[must_use]
    pub const fn flag(self) -> char {
        match self {
            Self::Profile => 'u',
            Self::Tweets => 't',
            Self::Followers => 'f',
            Self::Friends => 'r',
            Self::Analyze => 'a',
        }
    }

    /// Whether the operation talks to the remote API.
    #[must_use]
    pub const fn is_fetch(self) -> bool {
        !matches!(self, Self::Analyze)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Profile => "profile",
            Self::Tweets => "tweets",
            Self::Followers => "followers",
            Self::Friends => "friends",
            Self::Analyze => "analyze",
        };
        f.write_str(label)
    }
}

/// Validated invocation: what to run and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub screen_name: String,
}

impl Plan {
    #[must_use]
    pub fn needs_remote(&self) -> bool {
        self.operations.iter().any(|op| op.is_fetch())
    }
}

/// Validate the flag string and screen name.
///
/// Returns `None` when either is malformed. Repeated flags run once.
#[must_use]
pub fn parse_plan(flags: &str, screen_name: &str) -> Option<Plan> {
    let caps = FLAGS_RE.captures(flags)?;
    if !SCREEN_NAME_RE.is_match(screen_name) {
        return None;
    }
    let letters = caps.get(1)?.as_str();
    let operations = Operation::ORDER
        .into_iter()
        .filter(|op| letters.contains(op.flag()))
        .collect();
    Some(Plan {
        operations,
        screen_name: screen_name.to_string(),
    })
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Operations that ran to completion, in order.
    pub completed: Vec<Operation>,
    pub reports: Vec<FetchReport>,
    /// The error that stopped the run early, if any.
    pub aborted: Option<TweetDbError>,
}

/// Run a plan's operations in order.
///
/// A fetch error is logged and skips every remaining operation. `remote` may
/// be `None` for plans without fetches.
pub fn execute(plan: &Plan, session: &mut Session, remote: Option<&dyn RemoteSource>) -> RunSummary {
    let mut summary = RunSummary::default();
    let name = plan.screen_name.as_str();

    for &op in &plan.operations {
        let result = match (op, remote) {
            (Operation::Analyze, _) => {
                session.analyze(name);
                Ok(None)
            }
            (_, None) => Err(TweetDbError::InvalidArgument {
                reason: format!("no remote client available for '{op}'"),
            }),
            (Operation::Profile, Some(r)) => session.fetch_profile(r, name).map(Some),
            (Operation::Tweets, Some(r)) => session.fetch_tweets(r, name).map(Some),
            (Operation::Followers, Some(r)) => session.fetch_followers(r, name).map(Some),
            (Operation::Friends, Some(r)) => session.fetch_friends(r, name).map(Some),
        };

        match result {
            Ok(report) => {
                summary.completed.push(op);
                summary.reports.extend(report);
            }
            Err(e) => {
                error!(operation = %op, error = %e, "Operation failed");
                let skipped = plan
                    .operations
                    .iter()
                    .skip_while(|&&o| o != op)
                    .skip(1)
                    .count();
                if skipped > 0 {
                    warn!(skipped, "Skipping remaining operations");
                }
                summary.aborted = Some(e);
                break;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_orders_operations() {
        let plan = parse_plan("-atu", "alice").unwrap();
        assert_eq!(
            plan.operations,
            vec![Operation::Profile, Operation::Tweets, Operation::Analyze]
        );
        assert_eq!(plan.screen_name, "alice");
        assert!(plan.needs_remote());
    }

    #[test]
    fn test_parse_plan_all_flags() {
        let plan = parse_plan("-utfra", "jack_2").unwrap();
        assert_eq!(plan.operations, Operation::ORDER.to_vec());
    }

    #[test]
    fn test_parse_plan_repeated_flags_run_once() {
        let plan = parse_plan("-tt", "alice").unwrap();
        assert_eq!(plan.operations, vec![Operation::Tweets]);
    }

    #[test]
    fn test_parse_plan_rejects_malformed() {
        assert!(parse_plan("-z", "alice").is_none());
        assert!(parse_plan("-tz", "alice").is_none());
        assert!(parse_plan("t", "alice").is_none());
        assert!(parse_plan("--t", "alice").is_none());
        assert!(parse_plan("-", "alice").is_none());
        assert!(parse_plan("-t", "al-ice").is_none());
        assert!(parse_plan("-t", "").is_none());
        assert!(parse_plan("-t", "alice bob").is_none());
    }

    #[test]
    fn test_analyze_only_needs_no_remote() {
        let plan = parse_plan("-a", "alice").unwrap();
        assert!(!plan.needs_remote());
    }

    #[test]
    fn test_cli_accepts_combined_flags() {
        let cli = Cli::try_parse_from(["tweetdb", "-tu", "alice", "--no-charts"]).unwrap();
        assert_eq!(cli.ops, "-tu");
        assert_eq!(cli.screen_name, "alice");
        assert!(cli.no_charts);
    }

    #[test]
    fn test_cli_rejects_wrong_arg_count() {
        assert!(Cli::try_parse_from(["tweetdb", "-t"]).is_err());
        assert!(Cli::try_parse_from(["tweetdb", "-t", "alice", "bob"]).is_err());
    }

    #[test]
    fn test_operation_flags_round_trip() {
        let letters: String = Operation::ORDER.iter().map(|op| op.flag()).collect();
        assert_eq!(letters, "utfra");
        assert!(!Operation::Analyze.is_fetch());
    }
}
