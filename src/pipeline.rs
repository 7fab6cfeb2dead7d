//! Fetch-and-upsert operations and the session that runs them.
//!
//! Every fetch follows the same shape: collect a capped stream of remote
//! records, turn them into table rows, collapse duplicate keys, write the
//! debug export and console preview, then hand the rows to
//! [`Storage::replace_by_key`].

use crate::analyze::{Analysis, KeywordAnalyzer, write_read_csv};
use crate::chart::{bar_chart, scatter_plot};
use crate::config::Config;
use crate::error::{Result, ResultExt, TweetDbError};
use crate::logging::OperationGuard;
use crate::model::{FollowerRow, FriendRow, ProfileRow, TweetRow};
use crate::remote::{RecordStream, RemoteSource};
use crate::storage::{Storage, TableRow};
use crate::{
    CONTENT_DIVIDER_WIDTH, EDGE_CAP, TWEET_CAP, format_number, format_number_usize, truncate_cell,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Debug export for fetched tweets.
pub const TWEETS_EXPORT: &str = "data.csv";

/// Debug export for fetched followers and friends.
pub const EDGES_EXPORT: &str = "test.csv";

/// Keyword analysis output.
pub const ANALYSIS_EXPORT: &str = "READ.csv";

/// The four remote entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Profile,
    Tweets,
    Followers,
    Friends,
}

impl FetchKind {
    /// Permanent table written by this kind of fetch.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Profile => ProfileRow::TABLE.name,
            Self::Tweets => TweetRow::TABLE.name,
            Self::Followers => FollowerRow::TABLE.name,
            Self::Friends => FriendRow::TABLE.name,
        }
    }

    /// Most records collected per fetch, if bounded.
    #[must_use]
    pub const fn cap(self) -> Option<usize> {
        match self {
            Self::Profile => None,
            Self::Tweets => Some(TWEET_CAP),
            Self::Followers | Self::Friends => Some(EDGE_CAP),
        }
    }

    const fn export_file(self) -> Option<&'static str> {
        match self {
            Self::Profile => None,
            Self::Tweets => Some(TWEETS_EXPORT),
            Self::Followers | Self::Friends => Some(EDGES_EXPORT),
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Profile => "profile",
            Self::Tweets => "tweets",
            Self::Followers => "followers",
            Self::Friends => "friends",
        };
        f.write_str(label)
    }
}

/// What happened to the permanent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Rows sharing the fetched keys were replaced.
    Replaced { rows: usize },
    /// The swap failed and its transaction was rolled back.
    RolledBack,
}

/// Summary of one fetch-and-upsert operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub kind: FetchKind,
    pub screen_name: String,
    /// Records received from the remote.
    pub fetched: usize,
    pub outcome: SwapOutcome,
}

/// Settings a session runs with.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub db_path: PathBuf,
    pub keywords_path: PathBuf,
    pub export_dir: PathBuf,
    /// Rows printed after each fetch; zero disables the preview.
    pub preview_rows: usize,
    /// Maximum rows per debug export.
    pub export_rows: usize,
    pub charts: bool,
    pub show_progress: bool,
}

impl SessionOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            db_path: config.db_path(),
            keywords_path: config.keywords_path(),
            export_dir: config.export_dir(),
            preview_rows: config.output.preview_rows,
            export_rows: config.output.export_rows,
            charts: config.output.charts,
            show_progress: true,
        }
    }
}

/// Console rendering of a fetched row.
trait PreviewRow {
    fn preview_header() -> String;
    fn preview_line(&self) -> String;
}

impl PreviewRow for TweetRow {
    fn preview_header() -> String {
        format!("{:<10}  {:>7}  {:>7}  body", "date", "likes", "rts")
    }

    fn preview_line(&self) -> String {
        format!(
            "{:<10}  {:>7}  {:>7}  {}",
            self.created_at,
            format_number(self.favorite_count),
            format_number(self.retweet_count),
            truncate_cell(&self.body, 60)
        )
    }
}

impl PreviewRow for ProfileRow {
    fn preview_header() -> String {
        format!(
            "{:<16}  {:<20}  {:>10}  {:>8}  {:>8}",
            "screen_name", "name", "followers", "friends", "tweets"
        )
    }

    fn preview_line(&self) -> String {
        format!(
            "{:<16}  {:<20}  {:>10}  {:>8}  {:>8}",
            self.screen_name,
            truncate_cell(&self.name, 20),
            format_number(self.followers_count),
            format_number(self.friends_count),
            format_number(self.statuses_count)
        )
    }
}

fn edge_preview_header() -> String {
    format!("{:<16}  {:<24}  {:>10}", "screen_name", "name", "followers")
}

fn edge_preview_line(screen_name: &str, name: &str, followers: i64) -> String {
    format!(
        "{:<16}  {:<24}  {:>10}",
        screen_name,
        truncate_cell(name, 24),
        format_number(followers)
    )
}

impl PreviewRow for FollowerRow {
    fn preview_header() -> String {
        edge_preview_header()
    }

    fn preview_line(&self) -> String {
        edge_preview_line(&self.screen_name, &self.name, self.followers_count)
    }
}

impl PreviewRow for FriendRow {
    fn preview_header() -> String {
        edge_preview_header()
    }

    fn preview_line(&self) -> String {
        edge_preview_line(&self.screen_name, &self.name, self.followers_count)
    }
}

/// Open database, keyword matcher and output settings for one run.
pub struct Session {
    storage: Storage,
    analyzer: KeywordAnalyzer,
    options: SessionOptions,
}

impl Session {
    /// Load the keyword list and open the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyword file is missing or the database
    /// cannot be opened.
    pub fn open(options: SessionOptions) -> Result<Self> {
        let analyzer = KeywordAnalyzer::load(&options.keywords_path)?;
        if let Some(parent) = options.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TweetDbError::path_error("create directory", parent, e))?;
        }
        let storage = Storage::open(&options.db_path)?;
        Ok(Self::with_parts(storage, analyzer, options))
    }

    /// Assemble a session from already-open parts.
    #[must_use]
    pub fn with_parts(
        storage: Storage,
        analyzer: KeywordAnalyzer,
        options: SessionOptions,
    ) -> Self {
        Self {
            storage,
            analyzer,
            options,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Close the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection does not close cleanly.
    pub fn close(self) -> Result<()> {
        self.storage.close()
    }

    /// Fetch and store the current profile of `screen_name`.
    ///
    /// # Errors
    ///
    /// Returns remote errors and database errors other than a rolled-back swap.
    pub fn fetch_profile(
        &mut self,
        remote: &dyn RemoteSource,
        screen_name: &str,
    ) -> Result<FetchReport> {
        let guard = OperationGuard::new(format!("fetch profile for {screen_name}"));
        let result = remote.user(screen_name).and_then(|user| {
            let rows = vec![ProfileRow::from(&user)];
            self.upsert(FetchKind::Profile, screen_name, 1, rows)
        });
        finish(guard, result)
    }

    /// Fetch and store up to [`TWEET_CAP`] recent tweets of `screen_name`.
    ///
    /// # Errors
    ///
    /// Returns remote errors, malformed dates and database errors other than
    /// a rolled-back swap.
    pub fn fetch_tweets(
        &mut self,
        remote: &dyn RemoteSource,
        screen_name: &str,
    ) -> Result<FetchReport> {
        let guard = OperationGuard::new(format!("fetch tweets for {screen_name}"));
        let result = self
            .collect(FetchKind::Tweets, |cap| remote.user_timeline(screen_name, cap))
            .and_then(|statuses| {
                let rows = statuses
                    .iter()
                    .map(TweetRow::from_status)
                    .collect::<Result<Vec<_>>>()?;
                self.upsert(FetchKind::Tweets, screen_name, statuses.len(), rows)
            });
        finish(guard, result)
    }

    /// Fetch and store up to [`EDGE_CAP`] followers of `screen_name`.
    ///
    /// # Errors
    ///
    /// Returns remote errors and database errors other than a rolled-back swap.
    pub fn fetch_followers(
        &mut self,
        remote: &dyn RemoteSource,
        screen_name: &str,
    ) -> Result<FetchReport> {
        let guard = OperationGuard::new(format!("fetch followers for {screen_name}"));
        let result = self
            .collect(FetchKind::Followers, |cap| remote.followers(screen_name, cap))
            .and_then(|users| {
                let rows = users
                    .iter()
                    .map(|u| FollowerRow::new(screen_name, u))
                    .collect();
                self.upsert(FetchKind::Followers, screen_name, users.len(), rows)
            });
        finish(guard, result)
    }

    /// Fetch and store up to [`EDGE_CAP`] friends of `screen_name`.
    ///
    /// # Errors
    ///
    /// Returns remote errors and database errors other than a rolled-back swap.
    pub fn fetch_friends(
        &mut self,
        remote: &dyn RemoteSource,
        screen_name: &str,
    ) -> Result<FetchReport> {
        let guard = OperationGuard::new(format!("fetch friends for {screen_name}"));
        let result = self
            .collect(FetchKind::Friends, |cap| remote.friends(screen_name, cap))
            .and_then(|users| {
                let rows = users.iter().map(|u| FriendRow::new(screen_name, u)).collect();
                self.upsert(FetchKind::Friends, screen_name, users.len(), rows)
            });
        finish(guard, result)
    }

    /// Run the keyword analysis for `screen_name` and print its results.
    ///
    /// Failures are logged and yield `None`; nothing is written in that case.
    pub fn analyze(&self, screen_name: &str) -> Option<Analysis> {
        let guard = OperationGuard::new(format!("analyze tweets for {screen_name}"));
        match self.run_analysis(screen_name) {
            Ok(analysis) => {
                guard.complete(analysis.rows.len());
                Some(analysis)
            }
            Err(e) => {
                guard.fail(&e);
                None
            }
        }
    }

    fn run_analysis(&self, screen_name: &str) -> Result<Analysis> {
        let analysis = self.analyzer.analyze(&self.storage, screen_name)?;
        let path = self.options.export_dir.join(ANALYSIS_EXPORT);
        write_read_csv(&path, &analysis.rows)?;
        info!(rows = analysis.rows.len(), path = %path.display(), "Wrote analysis");
        self.print_analysis(screen_name, &analysis);
        Ok(analysis)
    }

    fn print_analysis(&self, screen_name: &str, analysis: &Analysis) {
        println!(
            "{} {}",
            "Keyword matches for".bold().cyan(),
            format!("@{screen_name}").bold()
        );
        println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH).dimmed());

        if analysis.is_empty() {
            println!("{}", "No stored tweets match the keyword list.".yellow());
            return;
        }

        println!(
            "{}",
            format!("{:<10}  {:>7}  {:>7}  {:<20}  body", "date", "likes", "rts", "keywords")
                .dimmed()
        );
        for row in &analysis.rows {
            println!(
                "{:<10}  {:>7}  {:>7}  {:<20}  {}",
                row.tweet.date.format(crate::model::ROW_DATE_FORMAT),
                format_number(row.tweet.favorite_count),
                format_number(row.tweet.retweet_count),
                truncate_cell(&row.keywords_joined(), 20),
                truncate_cell(&row.tweet.body, 50)
            );
        }

        println!();
        println!("{}", "Keyword counts".bold());
        for kc in &analysis.tally {
            println!("  {:<20} {}", kc.keyword, kc.count.to_string().cyan());
        }

        if self.options.charts {
            let entries: Vec<(&str, usize)> = analysis
                .tally
                .iter()
                .map(|kc| (kc.keyword.as_str(), kc.count))
                .collect();
            println!();
            println!("{}", "Keyword frequency".bold());
            println!("{}", bar_chart(&entries, 40));
            println!();
            println!("{}", "Favorites (x) vs retweets (y)".bold());
            println!("{}", scatter_plot(&analysis.engagement_points(), 50, 15));
        }
        println!();
    }

    /// Drain the stream `open` builds for this kind's cap.
    fn collect<'r, T>(
        &self,
        kind: FetchKind,
        open: impl FnOnce(usize) -> RecordStream<'r, T>,
    ) -> Result<Vec<T>> {
        let stream = open(kind.cap().unwrap_or(usize::MAX));
        let pb = self.spinner(kind);
        let mut items = Vec::new();
        for item in stream {
            items.push(item?);
            pb.set_message(format!("{kind}: {} collected", items.len()));
        }
        pb.finish_and_clear();
        Ok(items)
    }

    fn spinner(&self, kind: FetchKind) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{kind}: fetching"));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn upsert<R>(
        &mut self,
        kind: FetchKind,
        screen_name: &str,
        fetched: usize,
        rows: Vec<R>,
    ) -> Result<FetchReport>
    where
        R: TableRow + PreviewRow + Serialize,
    {
        let before = rows.len();
        let rows: Vec<R> = rows.into_iter().unique_by(|row| row.key()).collect();
        if rows.len() < before {
            warn!(
                table = kind.table(),
                dropped = before - rows.len(),
                "Collapsed rows sharing a key"
            );
        }

        self.print_preview(kind, screen_name, &rows);
        if let Some(file) = kind.export_file() {
            let path = self.options.export_dir.join(file);
            if let Err(e) = self.export_rows(&path, &rows) {
                warn!(path = %path.display(), error = %e, "Debug export failed");
            }
        }

        let outcome = match self.storage.replace_by_key(&rows) {
            Ok(inserted) => SwapOutcome::Replaced { rows: inserted },
            Err(e @ TweetDbError::SwapFailed { .. }) => {
                error!(table = kind.table(), error = %e, "Swap rolled back");
                SwapOutcome::RolledBack
            }
            Err(e) => return Err(e),
        };

        Ok(FetchReport {
            kind,
            screen_name: screen_name.to_string(),
            fetched,
            outcome,
        })
    }

    fn export_rows<R: Serialize>(&self, path: &std::path::Path, rows: &[R]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating export {}", path.display()))?;
        for row in rows.iter().take(self.options.export_rows) {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn print_preview<R: PreviewRow>(&self, kind: FetchKind, screen_name: &str, rows: &[R]) {
        if self.options.preview_rows == 0 {
            return;
        }
        println!(
            "{} {} {}",
            format!("@{screen_name}").bold(),
            kind.to_string().cyan(),
            format!("({} rows)", format_number_usize(rows.len())).dimmed()
        );
        println!("{}", R::preview_header().dimmed());
        for row in rows.iter().take(self.options.preview_rows) {
            println!("{}", row.preview_line());
        }
        println!();
    }
}

fn finish(guard: OperationGuard, result: Result<FetchReport>) -> Result<FetchReport> {
    match &result {
        Ok(report) => {
            info!(
                kind = %report.kind,
                fetched = report.fetched,
                outcome = ?report.outcome,
                "Fetch finished"
            );
            guard.complete(report.fetched);
        }
        Err(e) => guard.fail(e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::KeywordList;
    use crate::model::{Status, User};
    use chrono::NaiveDate;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeRemote {
        users: Vec<User>,
        statuses: Vec<Status>,
        page_size: usize,
        pages_served: Cell<usize>,
        fail_user: bool,
    }

    impl FakeRemote {
        fn pages<T: Clone + 'static>(&self, items: &[T], cap: usize) -> RecordStream<'_, T> {
            let chunks: Vec<Vec<T>> = items
                .chunks(self.page_size.max(1))
                .map(<[T]>::to_vec)
                .collect();
            let mut chunks = chunks.into_iter();
            RecordStream::new(cap, move |_| {
                self.pages_served.set(self.pages_served.get() + 1);
                let items = chunks.next().unwrap_or_default();
                Ok(crate::remote::Page {
                    items,
                    next: Some(crate::remote::PageToken::Cursor(1)),
                })
            })
        }
    }

    impl RemoteSource for FakeRemote {
        fn user(&self, screen_name: &str) -> Result<User> {
            if self.fail_user {
                return Err(TweetDbError::api("users/show.json", 404, "User not found."));
            }
            Ok(user(42, screen_name))
        }

        fn user_timeline(&self, _screen_name: &str, cap: usize) -> RecordStream<'_, Status> {
            self.pages(&self.statuses, cap)
        }

        fn followers(&self, _screen_name: &str, cap: usize) -> RecordStream<'_, User> {
            self.pages(&self.users, cap)
        }

        fn friends(&self, _screen_name: &str, cap: usize) -> RecordStream<'_, User> {
            self.pages(&self.users, cap)
        }
    }

    fn user(id: i64, screen_name: &str) -> User {
        User {
            id,
            screen_name: screen_name.to_string(),
            name: format!("User {id}"),
            followers_count: id,
            ..User::default()
        }
    }

    fn status(id: i64, day: u32, text: &str) -> Status {
        Status {
            id,
            created_at: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .format("%a %b %d 10:00:00 +0000 %Y")
                .to_string(),
            full_text: text.to_string(),
            user: user(1, "alice"),
            favorite_count: 3,
            retweet_count: 1,
            retweeted_status: None,
        }
    }

    fn session(dir: &std::path::Path, keywords: &[&str]) -> Session {
        let options = SessionOptions {
            db_path: dir.join("twitter.db"),
            keywords_path: dir.join("keywords.txt"),
            export_dir: dir.to_path_buf(),
            preview_rows: 2,
            export_rows: 5000,
            charts: true,
            show_progress: false,
        };
        let analyzer =
            KeywordAnalyzer::new(KeywordList::from_lines(keywords.iter().copied())).unwrap();
        Session::with_parts(Storage::open_memory().unwrap(), analyzer, options)
    }

    #[test]
    fn test_fetch_profile_writes_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let report = session
            .fetch_profile(&FakeRemote::default(), "alice")
            .unwrap();

        assert_eq!(report.kind, FetchKind::Profile);
        assert_eq!(report.outcome, SwapOutcome::Replaced { rows: 1 });
        let stored = session.storage().profile(42).unwrap().unwrap();
        assert_eq!(stored.screen_name, "alice");
        assert!(!dir.path().join(TWEETS_EXPORT).exists());
        assert!(!dir.path().join(EDGES_EXPORT).exists());
    }

    #[test]
    fn test_fetch_profile_remote_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            fail_user: true,
            ..FakeRemote::default()
        };
        let err = session.fetch_profile(&remote, "ghost").unwrap_err();
        assert!(err.is_remote());
        assert_eq!(session.storage().count_rows("users_profile").unwrap(), 0);
    }

    #[test]
    fn test_fetch_tweets_stores_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            statuses: vec![status(3, 3, "third"), status(2, 2, "second"), status(1, 1, "first")],
            page_size: 2,
            ..FakeRemote::default()
        };

        let report = session.fetch_tweets(&remote, "alice").unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.outcome, SwapOutcome::Replaced { rows: 3 });

        let export = std::fs::read_to_string(dir.path().join(TWEETS_EXPORT)).unwrap();
        assert!(export.starts_with("created_at,tweet_id,screen_name"));
        assert_eq!(export.lines().count(), 4);
    }

    #[test]
    fn test_fetch_tweets_collapses_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            statuses: vec![status(1, 1, "first copy"), status(1, 1, "second copy")],
            page_size: 200,
            ..FakeRemote::default()
        };

        let report = session.fetch_tweets(&remote, "alice").unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.outcome, SwapOutcome::Replaced { rows: 1 });
        let stored = session.storage().tweets_for("alice").unwrap();
        assert_eq!(stored[0].body, "first copy");
    }

    #[test]
    fn test_followers_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            users: (1..=1500).map(|i| user(i, &format!("u{i}"))).collect(),
            page_size: 200,
            ..FakeRemote::default()
        };

        let report = session.fetch_followers(&remote, "alice").unwrap();
        assert_eq!(report.fetched, EDGE_CAP);
        assert_eq!(remote.pages_served.get(), 5);
        assert_eq!(session.storage().count_rows("followers").unwrap(), 1000);

        let export = std::fs::read_to_string(dir.path().join(EDGES_EXPORT)).unwrap();
        assert_eq!(export.lines().count(), 1001);
    }

    #[test]
    fn test_tweets_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            statuses: (1..=3400)
                .map(|i| status(i, u32::try_from(i % 28).unwrap() + 1, "tweet"))
                .collect(),
            page_size: 200,
            ..FakeRemote::default()
        };

        let report = session.fetch_tweets(&remote, "alice").unwrap();
        assert_eq!(report.fetched, TWEET_CAP);
        assert_eq!(remote.pages_served.get(), 17);
        assert_eq!(session.storage().count_rows("tweets").unwrap(), 3250);
    }

    #[test]
    fn test_friends_replace_only_target_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            users: vec![user(1, "carol"), user(2, "dave")],
            page_size: 200,
            ..FakeRemote::default()
        };

        session.fetch_friends(&remote, "bob").unwrap();
        session.fetch_friends(&remote, "alice").unwrap();
        session.fetch_friends(&remote, "alice").unwrap();

        assert_eq!(session.storage().friends_of("alice").unwrap().len(), 2);
        assert_eq!(session.storage().friends_of("bob").unwrap().len(), 2);
        assert_eq!(session.storage().count_rows("friends").unwrap(), 4);
    }

    #[test]
    fn test_failed_swap_reports_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &[]);
        let remote = FakeRemote {
            users: vec![user(1, "carol"), user(2, "dave")],
            page_size: 200,
            ..FakeRemote::default()
        };
        session.fetch_friends(&remote, "alice").unwrap();

        session
            .storage()
            .connection()
            .execute_batch(
                "CREATE TRIGGER block_friends BEFORE INSERT ON friends
                 BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();

        let report = session.fetch_friends(&remote, "alice").unwrap();
        assert_eq!(report.outcome, SwapOutcome::RolledBack);
        assert_eq!(session.storage().friends_of("alice").unwrap().len(), 2);
    }

    #[test]
    fn test_analyze_writes_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &["cats", "dogs"]);
        let remote = FakeRemote {
            statuses: vec![
                status(2, 2, "dogs are great"),
                status(1, 1, "I love cats and dogs"),
            ],
            page_size: 200,
            ..FakeRemote::default()
        };
        session.fetch_tweets(&remote, "alice").unwrap();

        let analysis = session.analyze("alice").unwrap();
        assert_eq!(analysis.tally[0].keyword, "dogs");
        assert_eq!(analysis.tally[0].count, 2);

        let csv = std::fs::read_to_string(dir.path().join(ANALYSIS_EXPORT)).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("cats,dogs"));
    }

    #[test]
    fn test_analyze_failure_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), &["cats"]);
        session.options.export_dir = dir.path().join("missing").join("nested");
        let remote = FakeRemote {
            statuses: vec![status(1, 1, "cats")],
            page_size: 200,
            ..FakeRemote::default()
        };
        session.fetch_tweets(&remote, "alice").ok();
        assert!(session.analyze("alice").is_none());
    }

    #[test]
    fn test_fetch_kind_metadata() {
        assert_eq!(FetchKind::Tweets.table(), "tweets");
        assert_eq!(FetchKind::Profile.cap(), None);
        assert_eq!(FetchKind::Friends.cap(), Some(1000));
        assert_eq!(FetchKind::Tweets.cap(), Some(3250));
        assert_eq!(FetchKind::Followers.to_string(), "followers");
    }
}
