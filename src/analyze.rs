//! Keyword analysis over stored tweets.
//!
//! The keyword list is a plain-text file with one keyword per line. Stored
//! tweets are filtered in `SQLite` by substring match, then each row is
//! annotated with the keywords it contains and the keywords are tallied by
//! how many rows mention them.
//!
//! Matching folds ASCII case only, both in `SQLite`'s `lower()` and in the
//! Aho-Corasick matcher. A keyword or body with non-ASCII capitals matches
//! only where the exact non-ASCII characters agree.

use crate::error::{Result, TweetDbError};
use crate::model::MatchedTweet;
use crate::storage::Storage;
use aho_corasick::AhoCorasick;
use itertools::Itertools;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Lowercased keywords in file order, without blanks or repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordList {
    keywords: Vec<String>,
}

impl KeywordList {
    /// Load the keyword file.
    ///
    /// # Errors
    ///
    /// Returns [`TweetDbError::KeywordFileNotFound`] if the file does not
    /// exist, or a path error if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TweetDbError::KeywordFileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                TweetDbError::path_error("read", path, e)
            }
        })?;
        let list = Self::from_lines(content.lines());
        info!(count = list.len(), path = %path.display(), "Loaded keyword list");
        Ok(list)
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .unique()
            .collect();
        Self { keywords }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// A matched tweet with the keywords found in its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedTweet {
    pub tweet: MatchedTweet,
    /// Matched keywords in keyword-list order.
    pub keywords: Vec<String>,
}

impl AnnotatedTweet {
    /// Keywords joined with commas, as written to `READ.csv`.
    #[must_use]
    pub fn keywords_joined(&self) -> String {
        self.keywords.join(",")
    }
}

/// How many matched rows mention a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

/// Result of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub rows: Vec<AnnotatedTweet>,
    /// Keywords with at least one match, most frequent first.
    pub tally: Vec<KeywordCount>,
}

impl Analysis {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(favorite_count, retweet_count)` per row.
    #[must_use]
    pub fn engagement_points(&self) -> Vec<(i64, i64)> {
        self.rows
            .iter()
            .map(|r| (r.tweet.favorite_count, r.tweet.retweet_count))
            .collect()
    }
}

/// Keyword matcher built once per session.
pub struct KeywordAnalyzer {
    keywords: KeywordList,
    matcher: AhoCorasick,
}

impl KeywordAnalyzer {
    /// Build the matcher for a keyword list.
    ///
    /// Matching folds ASCII case only, the same way `SQLite`'s `lower()` does.
    ///
    /// # Errors
    ///
    /// Returns an error if the automaton cannot be built.
    pub fn new(keywords: KeywordList) -> Result<Self> {
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(keywords.as_slice())
            .map_err(|e| TweetDbError::with_context("building keyword matcher", e))?;
        Ok(Self { keywords, matcher })
    }

    /// Load the keyword file and build the matcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable.
    pub fn load(path: &Path) -> Result<Self> {
        Self::new(KeywordList::load(path)?)
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        self.keywords.as_slice()
    }

    /// Indices of the keywords occurring in `body`, ascending.
    #[must_use]
    pub fn matches_in(&self, body: &str) -> Vec<usize> {
        let mut hit = vec![false; self.keywords.len()];
        for m in self.matcher.find_overlapping_iter(body) {
            hit[m.pattern().as_usize()] = true;
        }
        hit.iter()
            .enumerate()
            .filter_map(|(i, &h)| h.then_some(i))
            .collect()
    }

    /// Attach matched keywords to each row.
    #[must_use]
    pub fn annotate(&self, tweets: Vec<MatchedTweet>) -> Vec<AnnotatedTweet> {
        tweets
            .into_iter()
            .map(|tweet| {
                let keywords = self
                    .matches_in(&tweet.body)
                    .into_iter()
                    .map(|i| self.keywords.as_slice()[i].clone())
                    .collect();
                AnnotatedTweet { tweet, keywords }
            })
            .collect()
    }

    /// Count rows per keyword, most frequent first; ties keep list order.
    #[must_use]
    pub fn tally(&self, rows: &[AnnotatedTweet]) -> Vec<KeywordCount> {
        let mut counts: Vec<KeywordCount> = self
            .keywords()
            .iter()
            .map(|keyword| KeywordCount {
                keyword: keyword.clone(),
                count: rows.iter().filter(|r| r.keywords.contains(keyword)).count(),
            })
            .filter(|kc| kc.count > 0)
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }

    /// Query, annotate and tally the stored tweets of `screen_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn analyze(&self, storage: &Storage, screen_name: &str) -> Result<Analysis> {
        let matched = storage.tweets_matching(screen_name, self.keywords())?;
        debug!(screen_name, rows = matched.len(), "Keyword filter matched rows");
        let rows = self.annotate(matched);
        let tally = self.tally(&rows);
        Ok(Analysis { rows, tally })
    }
}

const READ_CSV_HEADER: [&str; 5] = [
    "Date",
    "Result",
    "favorite_count",
    "retweet_count",
    "Keywords",
];

#[derive(Serialize)]
struct ReadRecord<'a> {
    date: String,
    result: &'a str,
    favorite_count: i64,
    retweet_count: i64,
    keywords: String,
}

/// Write annotated rows as `Date,Result,favorite_count,retweet_count,Keywords`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_read_csv(path: &Path, rows: &[AnnotatedTweet]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(READ_CSV_HEADER)?;
    for row in rows {
        writer.serialize(ReadRecord {
            date: row.tweet.date.format(crate::model::ROW_DATE_FORMAT).to_string(),
            result: &row.tweet.body,
            favorite_count: row.tweet.favorite_count,
            retweet_count: row.tweet.retweet_count,
            keywords: row.keywords_joined(),
        })?;
    }
    writer.flush()?;
    Ok(())
}
