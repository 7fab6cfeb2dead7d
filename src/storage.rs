//! `SQLite` storage for fetched Twitter data.
//!
//! Four permanent tables keyed by natural keys, each with a transient
//! `<table>_tmp` staging twin. Fresh rows are written to the staging table
//! first and then swapped into the permanent table in one transaction by
//! [`Storage::replace_by_key`].

use crate::error::{Result, TweetDbError};
use crate::model::{FollowerRow, FriendRow, MatchedTweet, ProfileRow, TweetRow};
use chrono::NaiveDate;
use itertools::Itertools;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use std::hash::Hash;
use std::path::Path;
use tracing::{debug, info, warn};

/// Table-creation statements, applied idempotently on open.
pub const TABLE_SCHEMAS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS tweets (
        created_at TEXT NOT NULL,
        tweet_id INTEGER NOT NULL,
        screen_name TEXT NOT NULL,
        retweet_screen_name TEXT,
        retweet_created_at TEXT,
        body TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        favorite_count INTEGER NOT NULL DEFAULT 0,
        retweet_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (created_at, tweet_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_tweets_screen_name ON tweets(screen_name COLLATE NOCASE)",
    r"
    CREATE TABLE IF NOT EXISTS users_profile (
        user_id INTEGER PRIMARY KEY,
        screen_name TEXT NOT NULL,
        name TEXT,
        location TEXT,
        description TEXT,
        followers_count INTEGER NOT NULL DEFAULT 0,
        friends_count INTEGER NOT NULL DEFAULT 0,
        statuses_count INTEGER NOT NULL DEFAULT 0
    )",
    r"
    CREATE TABLE IF NOT EXISTS followers (
        follower_screen_name TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        screen_name TEXT NOT NULL,
        name TEXT,
        location TEXT,
        description TEXT,
        followers_count INTEGER NOT NULL DEFAULT 0,
        friends_count INTEGER NOT NULL DEFAULT 0,
        statuses_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (follower_screen_name, user_id)
    )",
    r"
    CREATE TABLE IF NOT EXISTS friends (
        following_screen_name TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        screen_name TEXT NOT NULL,
        name TEXT,
        location TEXT,
        description TEXT,
        followers_count INTEGER NOT NULL DEFAULT 0,
        friends_count INTEGER NOT NULL DEFAULT 0,
        statuses_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (following_screen_name, user_id)
    )",
];

/// Layout of a permanent table and its staging twin.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub staging: &'static str,
    pub key_columns: &'static [&'static str],
    pub columns: &'static [&'static str],
}

impl TableSpec {
    fn insert_sql(&self, table: &str) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            self.columns.join(", ")
        )
    }

    fn create_staging_sql(&self) -> String {
        format!(
            "DROP TABLE IF EXISTS {staging};
             CREATE TABLE {staging} AS SELECT {columns} FROM {name} WHERE 0;",
            staging = self.staging,
            columns = self.columns.join(", "),
            name = self.name,
        )
    }

    fn delete_matching_sql(&self) -> String {
        let keys = self.key_columns.join(", ");
        format!(
            "DELETE FROM {name} WHERE ({keys}) IN (SELECT {keys} FROM {staging})",
            name = self.name,
            staging = self.staging,
        )
    }

    fn insert_staged_sql(&self) -> String {
        let columns = self.columns.join(", ");
        format!(
            "INSERT INTO {name} ({columns}) SELECT {columns} FROM {staging}",
            name = self.name,
            staging = self.staging,
        )
    }
}

/// A row that can be replaced by natural key.
pub trait TableRow {
    /// Natural key of the row.
    type Key: Eq + Hash;

    /// Where rows of this kind live.
    const TABLE: TableSpec;

    fn key(&self) -> Self::Key;

    /// Column values in [`TableSpec::columns`] order.
    fn values(&self) -> Vec<Value>;
}

impl TableRow for TweetRow {
    type Key = (String, i64);

    const TABLE: TableSpec = TableSpec {
        name: "tweets",
        staging: "tweets_tmp",
        key_columns: &["created_at", "tweet_id"],
        columns: &[
            "created_at",
            "tweet_id",
            "screen_name",
            "retweet_screen_name",
            "retweet_created_at",
            "body",
            "user_id",
            "favorite_count",
            "retweet_count",
        ],
    };

    fn key(&self) -> Self::Key {
        (self.created_at.clone(), self.tweet_id)
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.created_at.clone().into(),
            self.tweet_id.into(),
            self.screen_name.clone().into(),
            self.retweet_screen_name.clone().into(),
            self.retweet_created_at.clone().into(),
            self.body.clone().into(),
            self.user_id.into(),
            self.favorite_count.into(),
            self.retweet_count.into(),
        ]
    }
}

impl TableRow for ProfileRow {
    type Key = i64;

    const TABLE: TableSpec = TableSpec {
        name: "users_profile",
        staging: "users_profile_tmp",
        key_columns: &["user_id"],
        columns: &[
            "user_id",
            "screen_name",
            "name",
            "location",
            "description",
            "followers_count",
            "friends_count",
            "statuses_count",
        ],
    };

    fn key(&self) -> Self::Key {
        self.user_id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.user_id.into(),
            self.screen_name.clone().into(),
            self.name.clone().into(),
            self.location.clone().into(),
            self.description.clone().into(),
            self.followers_count.into(),
            self.friends_count.into(),
            self.statuses_count.into(),
        ]
    }
}

impl TableRow for FollowerRow {
    type Key = (String, i64);

    const TABLE: TableSpec = TableSpec {
        name: "followers",
        staging: "followers_tmp",
        key_columns: &["follower_screen_name", "user_id"],
        columns: &[
            "follower_screen_name",
            "user_id",
            "screen_name",
            "name",
            "location",
            "description",
            "followers_count",
            "friends_count",
            "statuses_count",
        ],
    };

    fn key(&self) -> Self::Key {
        (self.follower_screen_name.clone(), self.user_id)
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.follower_screen_name.clone().into(),
            self.user_id.into(),
            self.screen_name.clone().into(),
            self.name.clone().into(),
            self.location.clone().into(),
            self.description.clone().into(),
            self.followers_count.into(),
            self.friends_count.into(),
            self.statuses_count.into(),
        ]
    }
}

impl TableRow for FriendRow {
    type Key = (String, i64);

    const TABLE: TableSpec = TableSpec {
        name: "friends",
        staging: "friends_tmp",
        key_columns: &["following_screen_name", "user_id"],
        columns: &[
            "following_screen_name",
            "user_id",
            "screen_name",
            "name",
            "location",
            "description",
            "followers_count",
            "friends_count",
            "statuses_count",
        ],
    };

    fn key(&self) -> Self::Key {
        (self.following_screen_name.clone(), self.user_id)
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.following_screen_name.clone().into(),
            self.user_id.into(),
            self.screen_name.clone().into(),
            self.name.clone().into(),
            self.location.clone().into(),
            self.description.clone().into(),
            self.followers_count.into(),
            self.friends_count.into(),
            self.statuses_count.into(),
        ]
    }
}

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = Self { conn };
        storage.apply_schema()?;
        info!("Opened database at {}", path.display());
        Ok(storage)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.apply_schema()?;
        Ok(storage)
    }

    /// Close the connection, surfacing any error the drop would swallow.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` refuses to close the handle.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| TweetDbError::from(e))?;
        debug!("Database closed");
        Ok(())
    }

    /// Get a reference to the underlying database connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn apply_schema(&self) -> Result<()> {
        for statement in TABLE_SCHEMAS {
            self.conn.execute(statement, [])?;
        }
        Ok(())
    }

    /// Replace every row sharing a key with `rows` with `rows` themselves.
    ///
    /// Rows go to the staging table first; the delete and insert into the
    /// permanent table then run in one transaction. A failure in that
    /// transaction rolls it back and is reported as
    /// [`TweetDbError::SwapFailed`]; the staging table keeps the new rows.
    ///
    /// # Errors
    ///
    /// Returns an error if staging fails or the swap is rolled back.
    pub fn replace_by_key<R: TableRow>(&mut self, rows: &[R]) -> Result<usize> {
        self.stage(rows)?;
        self.swap::<R>()
    }

    /// Materialize `rows` into the staging table, dropping any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging table cannot be rebuilt or filled.
    pub fn stage<R: TableRow>(&mut self, rows: &[R]) -> Result<usize> {
        let spec = R::TABLE;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&spec.create_staging_sql())?;
        {
            let mut stmt = tx.prepare(&spec.insert_sql(spec.staging))?;
            for row in rows {
                stmt.execute(params_from_iter(row.values()))?;
            }
        }
        tx.commit()?;
        debug!(table = spec.staging, rows = rows.len(), "Staged rows");
        Ok(rows.len())
    }

    /// Move the staged rows into the permanent table.
    ///
    /// # Errors
    ///
    /// Returns [`TweetDbError::SwapFailed`] if the delete or insert fails; the
    /// permanent table is left as it was.
    pub fn swap<R: TableRow>(&mut self) -> Result<usize> {
        let spec = R::TABLE;
        let tx = self.conn.transaction()?;

        match Self::swap_in(&tx, &spec) {
            Ok(inserted) => {
                tx.commit().map_err(|source| TweetDbError::SwapFailed {
                    table: spec.name,
                    source,
                })?;
                info!(table = spec.name, rows = inserted, "Replaced rows by key");
                Ok(inserted)
            }
            Err(source) => {
                if let Err(e) = tx.rollback() {
                    warn!(table = spec.name, error = %e, "Rollback reported an error");
                }
                Err(TweetDbError::SwapFailed {
                    table: spec.name,
                    source,
                })
            }
        }
    }

    fn swap_in(tx: &Transaction<'_>, spec: &TableSpec) -> rusqlite::Result<usize> {
        let deleted = tx.execute(&spec.delete_matching_sql(), [])?;
        debug!(table = spec.name, rows = deleted, "Deleted rows sharing staged keys");
        tx.execute(&spec.insert_staged_sql(), [])
    }

    /// Count rows in one of the known tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown or the query fails.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let known = [
            TweetRow::TABLE,
            ProfileRow::TABLE,
            FollowerRow::TABLE,
            FriendRow::TABLE,
        ];
        let Some(spec) = known
            .iter()
            .find(|spec| spec.name == table || spec.staging == table)
        else {
            return Err(TweetDbError::InvalidArgument {
                reason: format!("unknown table '{table}'"),
            });
        };
        let table = if spec.name == table { spec.name } else { spec.staging };
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// All stored tweets posted by `screen_name` (case-insensitive), oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tweets_for(&self, screen_name: &str) -> Result<Vec<TweetRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT created_at, tweet_id, screen_name, retweet_screen_name, retweet_created_at,
                   body, user_id, favorite_count, retweet_count
            FROM tweets
            WHERE screen_name = ?1 COLLATE NOCASE
            ORDER BY created_at, tweet_id
            ",
        )?;
        let rows = stmt
            .query_map(params![screen_name], |row| {
                Ok(TweetRow {
                    created_at: row.get(0)?,
                    tweet_id: row.get(1)?,
                    screen_name: row.get(2)?,
                    retweet_screen_name: row.get(3)?,
                    retweet_created_at: row.get(4)?,
                    body: row.get(5)?,
                    user_id: row.get(6)?,
                    favorite_count: row.get(7)?,
                    retweet_count: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The stored profile snapshot for a user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn profile(&self, user_id: i64) -> Result<Option<ProfileRow>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT user_id, screen_name, name, location, description,
                       followers_count, friends_count, statuses_count
                FROM users_profile WHERE user_id = ?1
                ",
                params![user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        screen_name: row.get(1)?,
                        name: row.get(2)?,
                        location: row.get(3)?,
                        description: row.get(4)?,
                        followers_count: row.get(5)?,
                        friends_count: row.get(6)?,
                        statuses_count: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Stored followers of `screen_name`, ordered by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn followers_of(&self, screen_name: &str) -> Result<Vec<FollowerRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT follower_screen_name, user_id, screen_name, name, location, description,
                   followers_count, friends_count, statuses_count
            FROM followers WHERE follower_screen_name = ?1
            ORDER BY user_id
            ",
        )?;
        let rows = stmt
            .query_map(params![screen_name], |row| {
                Ok(FollowerRow {
                    follower_screen_name: row.get(0)?,
                    user_id: row.get(1)?,
                    screen_name: row.get(2)?,
                    name: row.get(3)?,
                    location: row.get(4)?,
                    description: row.get(5)?,
                    followers_count: row.get(6)?,
                    friends_count: row.get(7)?,
                    statuses_count: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Stored friends of `screen_name`, ordered by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn friends_of(&self, screen_name: &str) -> Result<Vec<FriendRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT following_screen_name, user_id, screen_name, name, location, description,
                   followers_count, friends_count, statuses_count
            FROM friends WHERE following_screen_name = ?1
            ORDER BY user_id
            ",
        )?;
        let rows = stmt
            .query_map(params![screen_name], |row| {
                Ok(FriendRow {
                    following_screen_name: row.get(0)?,
                    user_id: row.get(1)?,
                    screen_name: row.get(2)?,
                    name: row.get(3)?,
                    location: row.get(4)?,
                    description: row.get(5)?,
                    followers_count: row.get(6)?,
                    friends_count: row.get(7)?,
                    statuses_count: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tweets by `screen_name` whose body contains at least one keyword.
    ///
    /// Matching is a case-insensitive substring test done by `SQLite`.
    /// Keywords are bound as parameters, never spliced into the SQL text.
    /// An empty keyword list matches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored date is malformed.
    pub fn tweets_matching(
        &self,
        screen_name: &str,
        keywords: &[String],
    ) -> Result<Vec<MatchedTweet>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let filter = (0..keywords.len())
            .map(|i| format!("instr(lower(body), lower(?{})) > 0", i + 2))
            .join(" OR ");
        let sql = format!(
            "SELECT created_at, body, favorite_count, retweet_count FROM tweets
             WHERE screen_name = ?1 COLLATE NOCASE AND ({filter})
             ORDER BY created_at, tweet_id"
        );

        let bound = std::iter::once(screen_name).chain(keywords.iter().map(String::as_str));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bound), |row| {
                let raw: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&raw, crate::model::ROW_DATE_FORMAT)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })?;
                Ok(MatchedTweet {
                    date,
                    body: row.get(1)?,
                    favorite_count: row.get(2)?,
                    retweet_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
