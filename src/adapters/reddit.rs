//! Reddit adapter (C5).
//!
//! OAuth token caching is the one piece of mutable shared state in this
//! crate (§5, §9): a single access token lives in this adapter instance,
//! refreshed when expired or within a safety window of expiring, with
//! refreshes serialized through a `tokio::sync::Mutex` so concurrent callers
//! single-flight onto one refresh instead of racing.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ClassifiableFailure, ClassifiedError, ErrorKind};
use crate::retry::{run_with_retry, RetryPolicy};

use super::send_classified;

const MAX_COMMENT_DEPTH: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct PostMetadata {
    pub title: String,
    pub author: String,
    pub score: i64,
    pub num_comments: u64,
    pub selftext: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub score: i64,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedditThreadResult {
    pub post_metadata: Option<PostMetadata>,
    pub comments: Vec<Comment>,
    pub allocated_comments: u32,
    pub error: Option<ClassifiedError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPostUrl {
    pub subreddit: String,
    pub post_id: String,
}

/// Parse a Reddit post URL of the shape
/// `https://www.reddit.com/r/<subreddit>/comments/<post_id>/...` into its
/// subreddit and post id. Unparseable URLs are rejected as `InvalidInput`.
pub fn parse_post_url(url: &str) -> Result<ParsedPostUrl, ClassifiedError> {
    let re = Regex::new(r"reddit\.com/r/([A-Za-z0-9_]+)/comments/([A-Za-z0-9]+)")
        .expect("static regex is valid");
    match re.captures(url) {
        Some(caps) => Ok(ParsedPostUrl {
            subreddit: caps[1].to_string(),
            post_id: caps[2].to_string(),
        }),
        None => Err(ClassifiedError::new(
            ErrorKind::InvalidInput,
            format!("could not parse a subreddit/post id out of {url}"),
        )
        .retryable(false)),
    }
}

struct TokenState {
    token: String,
    expires_at: std::time::Instant,
}

pub struct RedditAdapter {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    deadline: Duration,
    safety_window: Duration,
    token: Mutex<Option<TokenState>>,
}

impl RedditAdapter {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        deadline: Duration,
        safety_window: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
            deadline,
            safety_window,
            token: Mutex::new(None),
        }
    }

    pub fn retry_policy() -> RetryPolicy {
        RetryPolicy::for_reddit()
    }

    /// Return a valid access token, refreshing if expired or within the
    /// safety window. The mutex guard spans the whole check-and-maybe-refresh
    /// sequence, so concurrent callers serialize onto one refresh (§9).
    async fn access_token(&self) -> Result<String, ClassifiedError> {
        let mut guard = self.token.lock().await;
        let needs_refresh = match &*guard {
            Some(state) => {
                std::time::Instant::now() + self.safety_window >= state.expires_at
            }
            None => true,
        };
        if needs_refresh {
            let (token, ttl) = self.fetch_token().await?;
            *guard = Some(TokenState {
                token: token.clone(),
                expires_at: std::time::Instant::now() + ttl,
            });
            return Ok(token);
        }
        Ok(guard.as_ref().expect("checked above").token.clone())
    }

    async fn fetch_token(&self) -> Result<(String, Duration), ClassifiedError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }
        let request = self
            .http
            .post("https://www.reddit.com/api/v1/access_token")
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let (_status, body) = send_classified(request, self.deadline).await?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| crate::error::classify(ClassifiableFailure::Message(&e.to_string())))?;
        Ok((parsed.access_token, Duration::from_secs(parsed.expires_in)))
    }

    /// Fetch a post's metadata and up to `comment_budget` comments, flattened
    /// depth-first with parent before children and siblings ordered by
    /// descending score, depth-capped at [`MAX_COMMENT_DEPTH`] (§4.5).
    pub async fn fetch_thread(&self, url: &str, comment_budget: u32) -> RedditThreadResult {
        let parsed = match parse_post_url(url) {
            Ok(p) => p,
            Err(err) => {
                return RedditThreadResult {
                    post_metadata: None,
                    comments: Vec::new(),
                    allocated_comments: comment_budget,
                    error: Some(err),
                }
            }
        };

        let policy = Self::retry_policy();
        let result = run_with_retry(
            |_attempt| async { self.call(&parsed).await },
            &policy,
        )
        .await;

        match result {
            Ok((metadata, tree)) => {
                let mut flattened = Vec::new();
                flatten_comments(&tree, 0, &mut flattened);
                flattened.truncate(comment_budget as usize);
                RedditThreadResult {
                    post_metadata: Some(metadata),
                    comments: flattened,
                    allocated_comments: comment_budget,
                    error: None,
                }
            }
            Err(err) => RedditThreadResult {
                post_metadata: None,
                comments: Vec::new(),
                allocated_comments: comment_budget,
                error: Some(err),
            },
        }
    }

    async fn call(&self, parsed: &ParsedPostUrl) -> Result<(PostMetadata, Vec<CommentNode>), ClassifiedError> {
        let token = self.access_token().await?;
        let request = self
            .http
            .get(format!(
                "https://oauth.reddit.com/r/{}/comments/{}?sort=top",
                parsed.subreddit, parsed.post_id
            ))
            .bearer_auth(token)
            .header("User-Agent", "proc-research-mcp/0.1");
        let (_status, body) = send_classified(request, self.deadline).await?;
        parse_listing_response(&body)
    }
}

#[derive(Debug, Clone)]
struct CommentNode {
    author: String,
    body: String,
    score: i64,
    children: Vec<CommentNode>,
}

/// Flatten a comment tree depth-first, parent before children, siblings at
/// each level sorted by descending score, skipping deleted-author nodes, and
/// stopping recursion past [`MAX_COMMENT_DEPTH`].
fn flatten_comments(nodes: &[CommentNode], depth: u32, out: &mut Vec<Comment>) {
    if depth > MAX_COMMENT_DEPTH {
        return;
    }
    let mut ordered: Vec<&CommentNode> = nodes.iter().collect();
    ordered.sort_by(|a, b| b.score.cmp(&a.score));
    for node in ordered {
        if node.author == "[deleted]" || node.author.is_empty() {
            continue;
        }
        out.push(Comment {
            author: node.author.clone(),
            body: node.body.clone(),
            score: node.score,
            depth,
        });
        flatten_comments(&node.children, depth + 1, out);
    }
}

fn parse_listing_response(body: &str) -> Result<(PostMetadata, Vec<CommentNode>), ClassifiedError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| crate::error::classify(ClassifiableFailure::Message(&e.to_string())))?;
    let listing = value
        .as_array()
        .ok_or_else(|| ClassifiedError::new(ErrorKind::Parse, "expected a two-element listing array"))?;
    let post = listing
        .first()
        .and_then(|l| l["data"]["children"].as_array())
        .and_then(|c| c.first())
        .map(|child| &child["data"])
        .ok_or_else(|| ClassifiedError::new(ErrorKind::NotFound, "post not found in listing"))?;

    let metadata = PostMetadata {
        title: post["title"].as_str().unwrap_or_default().to_string(),
        author: post["author"].as_str().unwrap_or_default().to_string(),
        score: post["score"].as_i64().unwrap_or_default(),
        num_comments: post["num_comments"].as_u64().unwrap_or_default(),
        selftext: post["selftext"].as_str().unwrap_or_default().to_string(),
        url: post["url"].as_str().unwrap_or_default().to_string(),
    };

    let comment_listing = listing.get(1).and_then(|l| l["data"]["children"].as_array());
    let tree = comment_listing
        .map(|children| children.iter().filter_map(parse_comment_node).collect())
        .unwrap_or_default();

    Ok((metadata, tree))
}

fn parse_comment_node(raw: &serde_json::Value) -> Option<CommentNode> {
    if raw["kind"].as_str() != Some("t1") {
        return None;
    }
    let data = &raw["data"];
    let children = data["replies"]["data"]["children"]
        .as_array()
        .map(|c| c.iter().filter_map(parse_comment_node).collect())
        .unwrap_or_default();
    Some(CommentNode {
        author: data["author"].as_str().unwrap_or_default().to_string(),
        body: data["body"].as_str().unwrap_or_default().to_string(),
        score: data["score"].as_i64().unwrap_or_default(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_post_url() {
        let parsed =
            parse_post_url("https://www.reddit.com/r/rust/comments/abc123/some_title/").unwrap();
        assert_eq!(parsed.subreddit, "rust");
        assert_eq!(parsed.post_id, "abc123");
    }

    #[test]
    fn rejects_unparseable_url() {
        let err = parse_post_url("https://example.com/not-reddit").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(!err.retryable);
    }

    fn leaf(author: &str, score: i64) -> CommentNode {
        CommentNode {
            author: author.to_string(),
            body: "body".to_string(),
            score,
            children: Vec::new(),
        }
    }

    #[test]
    fn flatten_orders_siblings_by_descending_score_and_keeps_parent_before_child() {
        let tree = vec![
            CommentNode {
                author: "low".to_string(),
                body: "b".to_string(),
                score: 1,
                children: vec![leaf("child_of_low", 99)],
            },
            leaf("high", 10),
        ];
        let mut out = Vec::new();
        flatten_comments(&tree, 0, &mut out);
        let authors: Vec<&str> = out.iter().map(|c| c.author.as_str()).collect();
        // "high" (score 10) sorts before "low" (score 1) at depth 0, and
        // "low"'s child appears directly after "low" regardless of its own
        // higher score, because parent-before-child always wins over score.
        assert_eq!(authors, vec!["high", "low", "child_of_low"]);
    }

    #[test]
    fn flatten_filters_deleted_authors() {
        let tree = vec![leaf("[deleted]", 5), leaf("real_user", 1)];
        let mut out = Vec::new();
        flatten_comments(&tree, 0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].author, "real_user");
    }

    #[test]
    fn flatten_stops_past_max_depth() {
        fn nested(depth: u32) -> CommentNode {
            if depth == 0 {
                leaf("leaf", 1)
            } else {
                CommentNode {
                    author: format!("user{depth}"),
                    body: "b".to_string(),
                    score: 1,
                    children: vec![nested(depth - 1)],
                }
            }
        }
        let tree = vec![nested(MAX_COMMENT_DEPTH + 5)];
        let mut out = Vec::new();
        flatten_comments(&tree, 0, &mut out);
        assert!(out.iter().all(|c| c.depth <= MAX_COMMENT_DEPTH));
    }

    #[test]
    fn parse_listing_response_extracts_metadata_and_comments() {
        let body = serde_json::json!([
            {"data": {"children": [{"data": {
                "title": "t", "author": "op", "score": 5, "num_comments": 1,
                "selftext": "", "url": "https://reddit.com/x"
            }}]}},
            {"data": {"children": [{"kind": "t1", "data": {
                "author": "commenter", "body": "hi", "score": 3,
                "replies": ""
            }}]}}
        ])
        .to_string();
        let (metadata, tree) = parse_listing_response(&body).unwrap();
        assert_eq!(metadata.title, "t");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].author, "commenter");
    }
}
