//! Semantic Scholar member snapshots
//!
//! Builds the per-member artifacts that `classify` consumes by listing each
//! member's papers from the Semantic Scholar author endpoint.
//!
//! API Details:
//! - Listing endpoint: GET /graph/v1/author/{id}/papers
//! - `offset` paging, 100 papers per page
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::error::{PubcatError, Result};
use crate::identity::Identity;
use crate::output::write_json_atomic;
use crate::record::PublicationRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Papers per listing page
const PAGE_SIZE: usize = 100;

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,year,venue,url,externalIds,fieldsOfStudy,abstract";

/// Abstracts longer than this are cut when stored
pub const ABSTRACT_CHARS: usize = 2000;

/// Value of the `source` field in written snapshots
pub const SNAPSHOT_SOURCE: &str = "semantic_scholar";

#[derive(Debug, Deserialize)]
struct AuthorPapersPage {
    #[serde(default)]
    data: Vec<SSPaper>,
    next: Option<usize>,
}

/// One paper as listed by the author endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SSPaper {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub external_ids: Option<SSExternalIds>,
    pub fields_of_study: Option<Vec<String>>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Not requested, but kept when a mirror or older dump provides it
    pub topics: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SSExternalIds {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
}

/// Stored form of a paper in `publications.json`.
///
/// `abstract` is only kept for papers without topics, where the statistical
/// layer needs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactPaper {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub fields_of_study: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
}

impl CompactPaper {
    fn to_record(&self) -> PublicationRecord {
        PublicationRecord {
            source_id: self.paper_id.clone(),
            doi: self.doi.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            ..Default::default()
        }
    }
}

impl From<SSPaper> for CompactPaper {
    fn from(paper: SSPaper) -> Self {
        let topics = topic_names(paper.topics.as_deref().unwrap_or_default());
        let abstract_text = if topics.is_empty() {
            paper
                .abstract_text
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| a.chars().take(ABSTRACT_CHARS).collect())
        } else {
            None
        };

        Self {
            paper_id: paper.paper_id.filter(|s| !s.trim().is_empty()),
            title: paper.title,
            year: paper.year,
            venue: paper.venue.filter(|v| !v.trim().is_empty()),
            url: paper.url.filter(|u| !u.trim().is_empty()),
            doi: paper.external_ids.and_then(|ids| ids.doi),
            fields_of_study: paper.fields_of_study.unwrap_or_default(),
            topics,
            abstract_text,
        }
    }
}

/// Topic names from `[{"topic": ..}]`, `[{"name": ..}]` or plain strings,
/// deduplicated case-insensitively.
fn topic_names(topics: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    topics
        .iter()
        .filter_map(|t| match t {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("topic")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Offset of the next page, or `None` when the listing is exhausted.
fn next_offset(next: Option<usize>, offset: usize, received: usize) -> Option<usize> {
    if received == 0 {
        return None;
    }
    match next {
        Some(n) if n > offset => Some(n),
        Some(_) => None,
        None if received >= PAGE_SIZE => Some(offset + received),
        None => None,
    }
}

/// Drop papers whose identity was already seen; keeps first occurrence.
pub fn dedupe(papers: Vec<CompactPaper>) -> Vec<CompactPaper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| match Identity::resolve(&p.to_record()) {
            Some(identity) => seen.insert(identity),
            None => false,
        })
        .collect()
}

/// Author ids from a profile's `semanticScholarId` (string, number or list).
pub fn author_ids(profile: &Value) -> Vec<String> {
    fn one(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    match profile.get("semanticScholarId") {
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(value) => one(value).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Member ids from `members/manifest.json`, or the member directories when
/// there is no manifest.
pub fn member_ids(members_dir: &Path) -> Result<Vec<String>> {
    let manifest = members_dir.join("manifest.json");
    if manifest.is_file() {
        let value: Value = serde_json::from_str(&std::fs::read_to_string(&manifest)?)?;
        let ids = value.as_array().ok_or_else(|| {
            PubcatError::Config(format!("{} must be an array of member ids", manifest.display()))
        })?;
        return Ok(ids.iter().filter_map(Value::as_str).map(str::to_string).collect());
    }

    if !members_dir.is_dir() {
        return Err(PubcatError::Config(format!(
            "members directory not found: {}",
            members_dir.display()
        )));
    }

    let mut ids: Vec<String> = std::fs::read_dir(members_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}

/// `publications.json` as written for one member.
#[derive(Debug, Serialize)]
pub struct MemberSnapshot {
    pub source: &'static str,
    pub author_ids: Vec<String>,
    pub updated_at: i64,
    pub publications: Vec<CompactPaper>,
}

/// Counters for one fetch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchSummary {
    pub members: usize,
    pub written: usize,
    pub skipped: usize,
    pub papers: usize,
}

/// Semantic Scholar author listing client.
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pause: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: SS_API_BASE.to_string(),
            api_key,
            pause: Duration::from_secs(1),
            max_retries: 4,
            retry_backoff: Duration::from_secs(1),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Pause between consecutive requests
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Attempts per page when rate limited, and the first wait between them
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_backoff = backoff;
        self
    }

    /// One listing page, without retry.
    async fn fetch_page(&self, author_id: &str, offset: usize) -> Result<AuthorPapersPage> {
        let url = format!(
            "{}/author/{}/papers",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(author_id)
        );
        debug!(url = %url, offset, "Requesting author papers");

        let mut request = self.client.get(&url).query(&[
            ("limit", PAGE_SIZE.to_string()),
            ("offset", offset.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            return Err(PubcatError::RateLimited(retry_after));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PubcatError::Api {
                code: status.as_u16() as i32,
                message: format!("Semantic Scholar API error: {} - {}", status, error_text),
            });
        }

        response.json().await.map_err(|e| {
            PubcatError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })
    }

    /// One listing page, waiting out rate limits with doubling backoff.
    async fn fetch_page_with_retry(&self, author_id: &str, offset: usize) -> Result<AuthorPapersPage> {
        let mut backoff = self.retry_backoff;
        let mut last_wait = 0;

        for attempt in 0..self.max_retries {
            match self.fetch_page(author_id, offset).await {
                Err(PubcatError::RateLimited(secs)) => {
                    last_wait = secs;
                    if attempt + 1 == self.max_retries {
                        break;
                    }
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        author = author_id,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }

        Err(PubcatError::RateLimited(last_wait))
    }

    /// Every paper listed for one author, following pagination.
    pub async fn author_papers(&self, author_id: &str) -> Result<Vec<SSPaper>> {
        let mut papers = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page_with_retry(author_id, offset).await?;
            let received = page.data.len();
            papers.extend(page.data);

            match next_offset(page.next, offset, received) {
                Some(next) => {
                    offset = next;
                    tokio::time::sleep(self.pause).await;
                }
                None => break,
            }
        }

        debug!(author = author_id, count = papers.len(), "Author listing complete");
        Ok(papers)
    }

    /// Refresh `members/<id>/<file_name>` for every member.
    ///
    /// Members without a readable profile or author id are skipped. A member
    /// is only rewritten when every one of its author listings succeeded;
    /// otherwise its existing snapshot is left untouched.
    pub async fn fetch_members(&self, members_dir: &Path, file_name: &str) -> Result<FetchSummary> {
        let members = member_ids(members_dir)?;
        let mut summary = FetchSummary {
            members: members.len(),
            ..Default::default()
        };
        info!(members = members.len(), "Starting Semantic Scholar fetch");

        for member in &members {
            let member_dir = members_dir.join(member);
            let profile = std::fs::read_to_string(member_dir.join("profile.json"))
                .map_err(PubcatError::from)
                .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(PubcatError::from));
            let ids = match profile {
                Ok(profile) => author_ids(&profile),
                Err(e) => {
                    warn!(member = %member, error = %e, "Skipped member without readable profile");
                    summary.skipped += 1;
                    continue;
                }
            };
            if ids.is_empty() {
                warn!(member = %member, "Skipped member: no semanticScholarId");
                summary.skipped += 1;
                continue;
            }

            let mut raw = Vec::new();
            let mut failed = 0;
            for (idx, aid) in ids.iter().enumerate() {
                if idx > 0 {
                    tokio::time::sleep(self.pause).await;
                }
                match self.author_papers(aid).await {
                    Ok(papers) => raw.extend(papers),
                    Err(e) => {
                        warn!(member = %member, author = %aid, error = %e, "Author fetch failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                warn!(member = %member, failed, authors = ids.len(), "Incomplete listing; keeping existing snapshot");
                summary.skipped += 1;
                continue;
            }

            let publications = dedupe(raw.into_iter().map(CompactPaper::from).collect());
            let snapshot = MemberSnapshot {
                source: SNAPSHOT_SOURCE,
                author_ids: ids,
                updated_at: chrono::Utc::now().timestamp(),
                publications,
            };

            let out = member_dir.join(file_name);
            write_json_atomic(&out, &snapshot)?;
            info!(member = %member, papers = snapshot.publications.len(), path = %out.display(), "Wrote snapshot");

            summary.written += 1;
            summary.papers += snapshot.publications.len();
        }

        Ok(summary)
    }
}
