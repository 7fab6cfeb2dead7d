//! Upstream access: paged record streams and the Twitter v1.1 client.
//!
//! Everything the pipeline needs from the network goes through
//! [`RemoteSource`], so tests can substitute canned pages for the real API.

use crate::config::ApiConfig;
use crate::credentials::Credentials;
use crate::error::{Result, TweetDbError};
use crate::model::{Status, User};
use crate::oauth::OAuthSigner;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::time::Duration;
use tracing::{debug, trace};

/// Where the next page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    /// First page.
    Start,
    /// Timeline paging: only statuses with an id at or below this one.
    MaxId(i64),
    /// Cursor paging for follower and friend lists.
    Cursor(i64),
}

/// One page of records and the token for the following page, if any.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageToken>,
}

type PageFn<'a, T> = Box<dyn FnMut(&PageToken) -> Result<Page<T>> + 'a>;

/// A lazy, capped sequence of remote records.
///
/// Pages are fetched on demand. The stream ends at the cap, on an empty page,
/// when the upstream reports no further page, or right after yielding the
/// first error. It cannot be restarted.
pub struct RecordStream<'a, T> {
    fetch: PageFn<'a, T>,
    next_token: Option<PageToken>,
    buffer: VecDeque<T>,
    cap: usize,
    yielded: usize,
    pages: usize,
    done: bool,
}

impl<'a, T> RecordStream<'a, T> {
    /// Stream records from `fetch`, stopping after `cap` of them.
    pub fn new(cap: usize, fetch: impl FnMut(&PageToken) -> Result<Page<T>> + 'a) -> Self {
        Self {
            fetch: Box::new(fetch),
            next_token: Some(PageToken::Start),
            buffer: VecDeque::new(),
            cap,
            yielded: 0,
            pages: 0,
            done: false,
        }
    }

    /// Stream over pre-built pages, mostly for tests.
    pub fn from_pages(pages: Vec<Vec<T>>, cap: usize) -> Self
    where
        T: 'a,
    {
        let mut pages: VecDeque<Vec<T>> = pages.into();
        let mut cursor = 0_i64;
        Self::new(cap, move |_token| {
            let items = pages.pop_front().unwrap_or_default();
            cursor += 1;
            let next = (!pages.is_empty()).then_some(PageToken::Cursor(cursor));
            Ok(Page { items, next })
        })
    }

    /// Pages requested so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Records yielded so far.
    #[must_use]
    pub const fn yielded(&self) -> usize {
        self.yielded
    }
}

impl<T> Iterator for RecordStream<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.yielded >= self.cap {
            self.done = true;
            return None;
        }

        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(item));
            }

            let Some(token) = self.next_token.take() else {
                self.done = true;
                return None;
            };

            match (self.fetch)(&token) {
                Ok(page) => {
                    self.pages += 1;
                    trace!(page = self.pages, items = page.items.len(), "Fetched page");
                    if page.items.is_empty() {
                        self.done = true;
                        return None;
                    }
                    self.next_token = page.next;
                    self.buffer.extend(page.items);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T> FusedIterator for RecordStream<'_, T> {}

/// The upstream capability used by the fetch pipeline.
pub trait RemoteSource {
    /// Current profile of one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the account does not exist.
    fn user(&self, screen_name: &str) -> Result<User>;

    /// The account's recent statuses, newest first.
    fn user_timeline(&self, screen_name: &str, cap: usize) -> RecordStream<'_, Status>;

    /// Accounts following `screen_name`.
    fn followers(&self, screen_name: &str, cap: usize) -> RecordStream<'_, User>;

    /// Accounts `screen_name` follows.
    fn friends(&self, screen_name: &str, cap: usize) -> RecordStream<'_, User>;
}

#[derive(Debug, Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    next_cursor: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    message: String,
}

/// Pull the human-readable message out of an upstream error payload.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

/// Blocking client for the v1.1 REST API.
#[derive(Debug)]
pub struct TwitterClient {
    http: Client,
    base_url: String,
    page_size: u32,
    signer: OAuthSigner,
}

impl TwitterClient {
    /// Build a client from API settings and the four credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is missing or the HTTP client cannot
    /// be built.
    pub fn new(api: &ApiConfig, credentials: &Credentials) -> Result<Self> {
        let signer = OAuthSigner::from_credentials(credentials)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            page_size: api.page_size,
            signer,
        })
    }

    fn get<D: DeserializeOwned>(&self, endpoint: &str, query: &[(String, String)]) -> Result<D> {
        let url = format!("{}/{endpoint}", self.base_url);
        let auth = self.signer.authorization_header("GET", &url, query)?;
        debug!(endpoint, ?query, "GET");

        let response = self
            .http
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, auth)
            .header(USER_AGENT, concat!("tweetdb/", env!("CARGO_PKG_VERSION")))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let message = api_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string()
            });
            return Err(TweetDbError::api(endpoint, status.as_u16(), message));
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn timeline_page(&self, screen_name: &str, token: &PageToken) -> Result<Page<Status>> {
        let mut query = vec![
            ("screen_name".to_string(), screen_name.to_string()),
            ("count".to_string(), self.page_size.to_string()),
            ("tweet_mode".to_string(), "extended".to_string()),
        ];
        if let PageToken::MaxId(max_id) = token {
            query.push(("max_id".to_string(), max_id.to_string()));
        }

        let items: Vec<Status> = self.get("statuses/user_timeline.json", &query)?;
        let next = items.last().map(|s| PageToken::MaxId(s.id - 1));
        Ok(Page { items, next })
    }

    fn user_page(
        &self,
        endpoint: &str,
        screen_name: &str,
        token: &PageToken,
    ) -> Result<Page<User>> {
        let cursor = match token {
            PageToken::Cursor(cursor) => *cursor,
            _ => -1,
        };
        let query = vec![
            ("screen_name".to_string(), screen_name.to_string()),
            ("count".to_string(), self.page_size.to_string()),
            ("cursor".to_string(), cursor.to_string()),
            ("skip_status".to_string(), "true".to_string()),
        ];

        let page: UserPage = self.get(endpoint, &query)?;
        let next = (page.next_cursor != 0).then_some(PageToken::Cursor(page.next_cursor));
        Ok(Page {
            items: page.users,
            next,
        })
    }
}

impl RemoteSource for TwitterClient {
    fn user(&self, screen_name: &str) -> Result<User> {
        let query = vec![("screen_name".to_string(), screen_name.to_string())];
        self.get("users/show.json", &query)
    }

    fn user_timeline(&self, screen_name: &str, cap: usize) -> RecordStream<'_, Status> {
        let screen_name = screen_name.to_string();
        RecordStream::new(cap, move |token| self.timeline_page(&screen_name, token))
    }

    fn followers(&self, screen_name: &str, cap: usize) -> RecordStream<'_, User> {
        let screen_name = screen_name.to_string();
        RecordStream::new(cap, move |token| {
            self.user_page("followers/list.json", &screen_name, token)
        })
    }

    fn friends(&self, screen_name: &str, cap: usize) -> RecordStream<'_, User> {
        let screen_name = screen_name.to_string();
        RecordStream::new(cap, move |token| {
            self.user_page("friends/list.json", &screen_name, token)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    #[test]
    fn test_stream_concatenates_pages() {
        let stream = RecordStream::from_pages(vec![vec![1, 2], vec![3], vec![4, 5]], 100);
        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stream_stops_at_cap_without_extra_pages() {
        let pages: Vec<Vec<usize>> = (0..10).map(|p| (p * 3..p * 3 + 3).collect()).collect();
        let mut stream = RecordStream::from_pages(pages, 6);
        let items: Vec<usize> = stream.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(items, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(stream.pages_fetched(), 2);
        assert_eq!(stream.yielded(), 6);
    }

    #[test]
    fn test_stream_stops_on_empty_page() {
        let stream = RecordStream::from_pages(vec![vec![1], vec![], vec![2]], 100);
        assert_eq!(stream.count(), 1);
    }

    #[test]
    fn test_stream_is_fused_after_error() {
        let mut calls = 0;
        let mut stream = RecordStream::new(100, |token| {
            calls += 1;
            match token {
                PageToken::Start => Ok(Page {
                    items: vec![1],
                    next: Some(PageToken::Cursor(2)),
                }),
                _ => Err(TweetDbError::api("followers/list.json", 429, "Rate limit exceeded")),
            }
        });

        assert_eq!(stream.next().unwrap().unwrap(), 1);
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_stream_passes_tokens_through() {
        let mut seen = Vec::new();
        let stream = RecordStream::new(100, |token| {
            seen.push(*token);
            Ok(match token {
                PageToken::Start => Page {
                    items: vec![10, 9],
                    next: Some(PageToken::MaxId(8)),
                },
                _ => Page {
                    items: vec![8],
                    next: None,
                },
            })
        });
        assert_eq!(stream.count(), 3);
        assert_eq!(seen, vec![PageToken::Start, PageToken::MaxId(8)]);
    }

    #[test]
    fn test_api_error_message_parsing() {
        let body = r#"{"errors":[{"code":50,"message":"User not found."}]}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("User not found."));
        assert!(api_error_message("<html>oops</html>").is_none());
        assert!(api_error_message(r#"{"errors":[]}"#).is_none());
    }

    #[test]
    fn test_user_page_deserializes() {
        let body = r#"{
            "users": [{"id": 1, "screen_name": "carol"}],
            "next_cursor": 1489467234237774933,
            "previous_cursor": 0
        }"#;
        let page: UserPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].screen_name, "carol");
        assert_ne!(page.next_cursor, 0);
    }

    /// Serve one canned `(status, body)` response per connection and return
    /// the request lines received.
    fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                requests.push(request_line.trim_end().to_string());
                let mut header = String::new();
                while reader.read_line(&mut header).unwrap() > 0 && header != "\r\n" {
                    header.clear();
                }
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            requests
        });
        (base_url, handle)
    }

    fn client(base_url: &str) -> TwitterClient {
        let api = ApiConfig {
            base_url: base_url.to_string(),
            page_size: 2,
            timeout_secs: 5,
        };
        let credentials = Credentials {
            consumer_key: Some("ck".to_string()),
            consumer_secret: Some("cs".to_string()),
            access_token: Some("at".to_string()),
            access_token_secret: Some("ats".to_string()),
        };
        TwitterClient::new(&api, &credentials).unwrap()
    }

    fn status_json(id: i64) -> String {
        format!(
            r#"{{"id":{id},"created_at":"Wed Oct 10 20:19:24 +0000 2018","full_text":"status {id}","user":{{"id":1,"screen_name":"alice"}}}}"#
        )
    }

    fn users_json(ids: &[i64], next_cursor: i64) -> String {
        let users: Vec<String> = ids
            .iter()
            .map(|id| format!(r#"{{"id":{id},"screen_name":"user{id}"}}"#))
            .collect();
        format!(r#"{{"users":[{}],"next_cursor":{next_cursor}}}"#, users.join(","))
    }

    #[test]
    fn test_client_pages_timeline_by_max_id() {
        let (base_url, server) = serve(vec![
            (200, format!("[{},{}]", status_json(10), status_json(9))),
            (200, format!("[{}]", status_json(8))),
            (200, "[]".to_string()),
        ]);
        let client = client(&base_url);

        let ids: Vec<i64> = client
            .user_timeline("alice", 100)
            .map(|s| s.unwrap().id)
            .collect();
        assert_eq!(ids, vec![10, 9, 8]);

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("GET /statuses/user_timeline.json?"));
        assert!(requests[0].contains("tweet_mode=extended"));
        assert!(!requests[0].contains("max_id"));
        assert!(requests[1].contains("max_id=8"));
        assert!(requests[2].contains("max_id=7"));
    }

    #[test]
    fn test_client_pages_followers_by_cursor() {
        let (base_url, server) = serve(vec![
            (200, users_json(&[1, 2], 77)),
            (200, users_json(&[3], 0)),
        ]);
        let client = client(&base_url);

        let ids: Vec<i64> = client
            .followers("alice", 100)
            .map(|u| u.unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /followers/list.json?"));
        assert!(requests[0].contains("cursor=-1"));
        assert!(requests[0].contains("skip_status=true"));
        assert!(requests[1].contains("cursor=77"));
    }

    #[test]
    fn test_client_maps_error_body() {
        let (base_url, server) = serve(vec![(
            404,
            r#"{"errors":[{"code":50,"message":"User not found."}]}"#.to_string(),
        )]);
        let client = client(&base_url);

        let err = client.user("ghost").unwrap_err();
        server.join().unwrap();
        match err {
            TweetDbError::Api {
                endpoint,
                status,
                message,
            } => {
                assert_eq!(endpoint, "users/show.json");
                assert_eq!(status, 404);
                assert_eq!(message, "User not found.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_client_requires_credentials() {
        let err = TwitterClient::new(&ApiConfig::default(), &Credentials::default()).unwrap_err();
        assert!(matches!(err, TweetDbError::MissingCredential { .. }));
    }
}
