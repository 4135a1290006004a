//! Read-only access to a GitHub repository: tree listing, filtering and raw content.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use globset::{Glob, GlobBuilder, GlobMatcher};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const PRIMARY_BRANCH: &str = "main";
pub const FALLBACK_BRANCH: &str = "master";

/// Extensions treated as source code.
pub const CODE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".hpp", ".go", ".rs", ".rb", ".php", ".cs",
    ".swift", ".kt", ".scala",
];

/// One fetched file, path relative to the repository root.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Where the analyzer gets its files from.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Return the decoded source files of `locator`, in listing order.
    ///
    /// Locator and listing failures are errors; a single file that cannot be
    /// fetched or decoded is skipped.
    async fn fetch_files(
        &self,
        locator: &str,
        max_files: usize,
        exclude_patterns: &[String],
    ) -> Result<Vec<SourceFile>, AnalyzerError>;
}

/// Split `https://host/owner/repo[.git]` into `(owner, repo)`.
///
/// A single trailing slash is tolerated. Anything else, including deeper paths,
/// dot segments, query strings or non-https schemes, is rejected.
pub fn parse_locator(locator: &str) -> Result<(String, String), AnalyzerError> {
    let invalid = || AnalyzerError::InvalidLocator(locator.to_string());

    let raw = locator.trim();
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if url.scheme() != "https" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    // Parsing resolves `.` and `..` segments; only the literal path counts.
    let literal_path = raw
        .split_once("://")
        .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or("");
    if literal_path != url.path() {
        return Err(invalid());
    }

    let path = url.path().trim_start_matches('/');
    let path = path.strip_suffix('/').unwrap_or(path);
    let mut segments = path.split('/');
    let (owner, repo) = match (segments.next(), segments.next(), segments.next()) {
        (Some(owner), Some(repo), None) => (owner, repo),
        _ => return Err(invalid()),
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }
    Ok((owner.to_string(), repo.to_string()))
}

/// Compile exclude patterns with shell-glob semantics: `*` stays within one path segment.
pub fn compile_excludes(patterns: &[String]) -> Result<Vec<GlobMatcher>, AnalyzerError> {
    patterns
        .iter()
        .map(|pattern| {
            GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map(|glob: Glob| glob.compile_matcher())
                .map_err(|e| AnalyzerError::InvalidExcludePattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

pub fn is_code_file(path: &str) -> bool {
    CODE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Keep code files not matched by any exclude pattern, then take the first `max_files`.
pub fn filter_code_files<'a, I>(
    paths: I,
    exclude_patterns: &[String],
    max_files: usize,
) -> Result<Vec<String>, AnalyzerError>
where
    I: IntoIterator<Item = &'a str>,
{
    let excludes = compile_excludes(exclude_patterns)?;
    Ok(select_paths(paths, &excludes, max_files))
}

fn select_paths<'a, I>(paths: I, excludes: &[GlobMatcher], max_files: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    paths
        .into_iter()
        .filter(|path| is_code_file(path))
        .filter(|path| !excludes.iter().any(|m| m.is_match(path)))
        .take(max_files)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimit,
}

/// GitHub REST client.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GITHUB_API_URL.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Point the client at another API root, e.g. GitHub Enterprise or a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `base_url` joined with `segments`, each segment percent-encoded, plus `query`.
    fn api_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, AnalyzerError> {
        let bad_base = |reason: String| {
            AnalyzerError::source_fetch(None, format!("invalid API base URL {}: {}", self.base_url, reason))
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| bad_base(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| bad_base("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, AnalyzerError> {
        debug!("GET {}", url);
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, concat!("repo-complexity/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| AnalyzerError::source_fetch(e.status().map(|s| s.as_u16()), e.to_string()))
    }

    /// List all blob paths on the primary branch, or the fallback branch if the
    /// primary one does not exist. Returns the branch used with the paths.
    pub async fn list_files(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<(String, Vec<String>), AnalyzerError> {
        let mut branch = PRIMARY_BRANCH;
        let mut response = self.get(self.tree_url(owner, repo, branch)?).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Branch {} not found, trying {}", PRIMARY_BRANCH, FALLBACK_BRANCH);
            branch = FALLBACK_BRANCH;
            response = self.get(self.tree_url(owner, repo, branch)?).await?;
        }
        let response = check_status(response, &format!("listing {}/{}", owner, repo)).await?;

        let tree: TreeResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::source_fetch(None, format!("malformed tree listing: {}", e)))?;
        if tree.truncated {
            warn!("Tree listing for {}/{} was truncated by the API", owner, repo);
        }
        let paths = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect();
        Ok((branch.to_string(), paths))
    }

    /// Fetch and decode one file from `branch`.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, AnalyzerError> {
        let mut segments = vec!["repos", owner, repo, "contents"];
        segments.extend(path.split('/'));
        let url = self.api_url(&segments, &[("ref", branch)])?;
        let response = check_status(self.get(url).await?, path).await?;
        let body: ContentResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::source_fetch(None, format!("malformed content for {}: {}", path, e)))?;
        decode_content(path, &body)
    }

    /// Current core API quota.
    pub async fn rate_limit(&self) -> Result<RateLimit, AnalyzerError> {
        let url = self.api_url(&["rate_limit"], &[])?;
        let response = check_status(self.get(url).await?, "rate limit").await?;
        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::source_fetch(None, e.to_string()))?;
        Ok(body.rate)
    }

    fn tree_url(&self, owner: &str, repo: &str, branch: &str) -> Result<Url, AnalyzerError> {
        self.api_url(
            &["repos", owner, repo, "git", "trees", branch],
            &[("recursive", "1")],
        )
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn fetch_files(
        &self,
        locator: &str,
        max_files: usize,
        exclude_patterns: &[String],
    ) -> Result<Vec<SourceFile>, AnalyzerError> {
        let (owner, repo) = parse_locator(locator)?;
        let excludes = compile_excludes(exclude_patterns)?;
        info!("Fetching files from {}/{}", owner, repo);

        let (branch, listing) = self.list_files(&owner, &repo).await?;
        let selected = select_paths(listing.iter().map(String::as_str), &excludes, max_files);
        debug!(
            "{} of {} listed paths selected ({} exclude patterns)",
            selected.len(),
            listing.len(),
            excludes.len()
        );

        let mut files = Vec::with_capacity(selected.len());
        for path in selected {
            match self.get_file_content(&owner, &repo, &branch, &path).await {
                Ok(content) => {
                    debug!("Fetched {} ({} bytes)", path, content.len());
                    files.push(SourceFile { path, content });
                }
                Err(e) => warn!("Failed to fetch {}: {}", path, e),
            }
        }
        Ok(files)
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, AnalyzerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let rate_limited = matches!(status.as_u16(), 403 | 429)
        && response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
    let body = response.text().await.unwrap_or_default();
    let message = if rate_limited {
        format!("rate limit exceeded while {}", what)
    } else {
        format!("{}: {}", what, body.trim())
    };
    Err(AnalyzerError::source_fetch(Some(status.as_u16()), message))
}

fn decode_content(path: &str, body: &ContentResponse) -> Result<String, AnalyzerError> {
    let decode_err = |reason: String| AnalyzerError::ContentDecode {
        path: path.to_string(),
        reason,
    };
    match body.encoding.as_deref() {
        Some("base64") => {
            let compact: String = body.content.split_whitespace().collect();
            let bytes = general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| decode_err(e.to_string()))?;
            String::from_utf8(bytes).map_err(|_| decode_err("content is not UTF-8 text".to_string()))
        }
        Some("none") => Err(decode_err("file too large for the contents API".to_string())),
        Some(other) if !other.is_empty() => Err(decode_err(format!("unsupported encoding {}", other))),
        _ => Ok(body.content.clone()),
    }
}
