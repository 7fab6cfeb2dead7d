//! Data models for the Twitter v1.1 API and the local tables.
//!
//! [`Status`] and [`User`] mirror the upstream JSON payloads. The `*Row`
//! structs are the flat shapes stored in `SQLite` and written to the debug
//! exports; their field order is the column order.

use crate::error::{Result, TweetDbError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Date format used for the `created_at` columns.
pub const ROW_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse the API's date format: "Wed Oct 10 20:19:24 +0000 2018"
///
/// # Errors
///
/// Returns [`TweetDbError::InvalidDate`] when the string does not match.
pub fn parse_api_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TweetDbError::invalid_date(value, "status created_at"))
}

/// A user object as returned by `users/show`, `followers/list` and
/// `friends/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub friends_count: i64,
    #[serde(default)]
    pub statuses_count: i64,
}

/// A status (tweet) from `statuses/user_timeline` in extended mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    pub id: i64,
    /// Raw API timestamp, e.g. "Wed Oct 10 20:19:24 +0000 2018".
    pub created_at: String,
    /// Untruncated text; requests always ask for `tweet_mode=extended`.
    pub full_text: String,
    pub user: User,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(default)]
    pub retweet_count: i64,
    /// Present when this status is a retweet of another one.
    #[serde(default)]
    pub retweeted_status: Option<Box<Status>>,
}

impl Status {
    /// Calendar date of this status in `YYYY-MM-DD` form.
    ///
    /// # Errors
    ///
    /// Returns an error if `created_at` is not in the API's date format.
    pub fn created_date(&self) -> Result<String> {
        Ok(parse_api_date(&self.created_at)?
            .format(ROW_DATE_FORMAT)
            .to_string())
    }
}

/// One row of the `tweets` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TweetRow {
    pub created_at: String,
    pub tweet_id: i64,
    pub screen_name: String,
    pub retweet_screen_name: Option<String>,
    pub retweet_created_at: Option<String>,
    pub body: String,
    pub user_id: i64,
    pub favorite_count: i64,
    pub retweet_count: i64,
}

impl TweetRow {
    /// Shape a status into a row.
    ///
    /// A retweet's own text is often truncated, so the id, body, author id
    /// and counts come from the original status while `screen_name` and
    /// `created_at` stay with the retweeting account.
    ///
    /// # Errors
    ///
    /// Returns an error if either status carries an unparseable date.
    pub fn from_status(status: &Status) -> Result<Self> {
        let screen_name = status.user.screen_name.clone();
        let created_at = status.created_date()?;

        let (source, retweet_screen_name, retweet_created_at) =
            match status.retweeted_status.as_deref() {
                Some(original) => (
                    original,
                    Some(original.user.screen_name.clone()),
                    Some(original.created_date()?),
                ),
                None => (status, None, None),
            };

        Ok(Self {
            created_at,
            tweet_id: source.id,
            screen_name,
            retweet_screen_name,
            retweet_created_at,
            body: source.full_text.clone(),
            user_id: source.user.id,
            favorite_count: source.favorite_count,
            retweet_count: source.retweet_count,
        })
    }
}

/// One row of the `users_profile` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRow {
    pub user_id: i64,
    pub screen_name: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub followers_count: i64,
    pub friends_count: i64,
    pub statuses_count: i64,
}

impl From<&User> for ProfileRow {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            screen_name: user.screen_name.clone(),
            name: user.name.clone(),
            location: user.location.clone(),
            description: user.description.clone(),
            followers_count: user.followers_count,
            friends_count: user.friends_count,
            statuses_count: user.statuses_count,
        }
    }
}

/// One row of the `followers` table: the user described by the remaining
/// columns follows `follower_screen_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowerRow {
    pub follower_screen_name: String,
    pub user_id: i64,
    pub screen_name: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub followers_count: i64,
    pub friends_count: i64,
    pub statuses_count: i64,
}

/// One row of the `friends` table: `following_screen_name` follows the user
/// described by the remaining columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRow {
    pub following_screen_name: String,
    pub user_id: i64,
    pub screen_name: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub followers_count: i64,
    pub friends_count: i64,
    pub statuses_count: i64,
}

impl FollowerRow {
    #[must_use]
    pub fn new(target: &str, follower: &User) -> Self {
        Self {
            follower_screen_name: target.to_string(),
            user_id: follower.id,
            screen_name: follower.screen_name.clone(),
            name: follower.name.clone(),
            location: follower.location.clone(),
            description: follower.description.clone(),
            followers_count: follower.followers_count,
            friends_count: follower.friends_count,
            statuses_count: follower.statuses_count,
        }
    }
}

impl FriendRow {
    #[must_use]
    pub fn new(target: &str, friend: &User) -> Self {
        Self {
            following_screen_name: target.to_string(),
            user_id: friend.id,
            screen_name: friend.screen_name.clone(),
            name: friend.name.clone(),
            location: friend.location.clone(),
            description: friend.description.clone(),
            followers_count: friend.followers_count,
            friends_count: friend.friends_count,
            statuses_count: friend.statuses_count,
        }
    }
}

/// A stored tweet selected by the keyword analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedTweet {
    pub date: NaiveDate,
    pub body: String,
    pub favorite_count: i64,
    pub retweet_count: i64,
}
