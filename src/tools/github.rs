//! GitHub tools used by the repository pipeline.
//!
//! Every tool answers with text. HTTP failures are reported in that text
//! rather than as errors so the requesting agent can read them and adapt;
//! only missing or malformed arguments surface as [`OctoragError`].

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;

use crate::config::OctoragConfig;
use crate::error::{OctoragError, Result};
use crate::provider::http::status_to_error;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SEPARATOR: &str = "----------------------\n";
const REPO_DESCRIPTION: &str = "This is a code repository generated by OctoRAG.";
const MALFORMED_URL: &str =
    "Malformed input URL. Expects a GitHub HTML URL of the form https://github.com/owner/repo";

static REPO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/?").expect("repository URL regex must compile")
});

/// Split `https://github.com/owner/repo` into `(owner, repo)`.
pub fn parse_repo_url(html_url: &str) -> Option<(String, String)> {
    let captures = REPO_URL_RE.captures(html_url.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// Thin REST client for the GitHub API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Base URL and token from the `github` entries of the config.
    pub fn from_config(config: &OctoragConfig) -> Result<Self> {
        let base_url = config
            .get_base_url("github")
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());
        Self::new(base_url, config.get_api_key("github"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(GITHUB_API_VERSION));
        headers.insert(USER_AGENT, HeaderValue::from_static("octorag"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!(path, "github GET");
        let response = self
            .http
            .get(self.url(path))
            .headers(self.headers())
            .query(query)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        tracing::debug!(path, "github POST");
        let response = self
            .http
            .post(self.url(path))
            .headers(self.headers())
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn put_json(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        tracing::debug!(path, "github PUT");
        let response = self
            .http
            .put(self.url(path))
            .headers(self.headers())
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Forbidden: valid token without the needed scope.
            if status == reqwest::StatusCode::FORBIDDEN {
                return Err(OctoragError::api(status.as_u16(), body));
            }
            return Err(status_to_error(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }

    /// Decoded text of a file, plus its blob sha.
    async fn file_contents(&self, owner: &str, repo: &str, path: &str) -> Result<(String, String)> {
        let file: ContentResponse = self
            .get_json(&format!("repos/{owner}/{repo}/contents/{path}"), &[])
            .await?;
        Ok((decode_content(&file.content)?, file.sha))
    }

    /// Formatted summaries of the top `count` repositories for `keywords`.
    pub async fn query_repos(&self, keywords: &str, count: usize) -> String {
        let query = keywords.to_lowercase().replace(' ', "_");
        let result: Result<SearchResponse> = self
            .get_json("search/repositories", &[("q", query.as_str()), ("sort", "stars")])
            .await;
        match result {
            Ok(search) => format_repos(&search.items, count),
            Err(e) => format!("An error occurred: {e}"),
        }
    }

    pub async fn readme(&self, html_url: &str) -> String {
        let Some((owner, repo)) = parse_repo_url(html_url) else {
            return MALFORMED_URL.to_string();
        };
        match self.file_contents(&owner, &repo, "README.md").await {
            Ok((text, _)) => text,
            Err(e) => {
                tracing::debug!(owner, repo, error = %e, "readme lookup failed");
                "Repository does not have a readme".to_string()
            }
        }
    }

    pub async fn repo_tree(&self, html_url: &str) -> String {
        let Some((owner, repo)) = parse_repo_url(html_url) else {
            return MALFORMED_URL.to_string();
        };
        let repo_path = format!("repos/{owner}/{repo}");

        let info: RepoInfo = match self.get_json(&repo_path, &[]).await {
            Ok(info) => info,
            Err(e) => return format!("Failed at default branch obtain: {e}"),
        };
        let branch: BranchInfo = match self
            .get_json(&format!("{repo_path}/branches/{}", info.default_branch), &[])
            .await
        {
            Ok(branch) => branch,
            Err(e) => return format!("Failed at default branch SHA obtain: {e}"),
        };
        let tree_sha = branch.commit.commit.tree.sha;
        let tree: TreeResponse = match self
            .get_json(&format!("{repo_path}/git/trees/{tree_sha}"), &[("recursive", "1")])
            .await
        {
            Ok(tree) => tree,
            Err(e) => return format!("Repository does not have a tree: {e}"),
        };

        let mut out = String::from("File list:\n");
        for entry in tree.tree {
            out.push_str(&entry.path);
            out.push('\n');
        }
        out
    }

    pub async fn file_text(&self, html_url: &str, file_dir: &str) -> String {
        let Some((owner, repo)) = parse_repo_url(html_url) else {
            return MALFORMED_URL.to_string();
        };
        let file_dir = file_dir.trim_start_matches('/');
        match self.file_contents(&owner, &repo, file_dir).await {
            Ok((text, _)) => text,
            Err(e) => format!(
                "Repository {owner}/{repo} does not have file {file_dir}, or file is too big: {e}"
            ),
        }
    }

    /// Create a private repository named `{name}-{random hex}`.
    pub async fn create_repo(&self, name: &str) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let repository_name = format!("{name}-{}", &suffix[..7]);
        let body = serde_json::json!({
            "name": repository_name,
            "description": REPO_DESCRIPTION,
            "private": true,
        });
        let result: Result<CreatedRepo> = self.post_json("user/repos", &body).await;
        match result {
            Ok(created) => format!(
                "Repository {} created successfully at {}",
                created.name, created.html_url
            ),
            Err(OctoragError::Api { status: 403, .. }) => {
                "The provided GitHub Access Token does not have permission to create repositories."
                    .to_string()
            }
            Err(e) => format!("An error occurred while creating the repository: {e}"),
        }
    }

    pub async fn create_file(&self, owner: &str, repo: &str, contents: &str, filename: &str) -> String {
        let body = serde_json::json!({
            "message": format!("Create file {filename}"),
            "content": encode_content(contents),
            "branch": "main",
        });
        match self
            .put_json(&format!("repos/{owner}/{repo}/contents/{filename}"), &body)
            .await
        {
            Ok(_) => format!("File {repo}/{filename} created successfully."),
            Err(e) => format!("An error occurred while creating the file: {e}"),
        }
    }

    pub async fn append_to_file(&self, owner: &str, repo: &str, further: &str, filename: &str) -> String {
        let result = async {
            let (existing, sha) = self.file_contents(owner, repo, filename).await?;
            let body = serde_json::json!({
                "message": format!("Append to {filename}"),
                "content": encode_content(&format!("{existing}{further}")),
                "sha": sha,
                "branch": "main",
            });
            self.put_json(&format!("repos/{owner}/{repo}/contents/{filename}"), &body)
                .await
        }
        .await;
        match result {
            Ok(_) => format!("File {repo}/{filename} updated successfully."),
            Err(e) => format!("An error occurred while appending to the file: {e}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoSummary>,
}

#[derive(Debug, Deserialize)]
struct RepoSummary {
    name: String,
    owner: Owner,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    license: Option<License>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct License {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    tree: ShaRef,
}

#[derive(Debug, Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRepo {
    name: String,
    html_url: String,
}

fn format_repos(repos: &[RepoSummary], count: usize) -> String {
    let mut out = String::new();
    for repo in repos.iter().take(count) {
        out.push_str(SEPARATOR);
        out.push_str(&format!("Repository Name: {}\n", repo.name));
        out.push_str(&format!("Repository Owner: {}\n", repo.owner.login));
        out.push_str(&format!("Repository URL: {}\n", repo.html_url));
        out.push_str(&format!(
            "Repository Description: {}\n",
            repo.description.as_deref().unwrap_or("None")
        ));
        out.push_str(&format!("Repository Stars: {}\n", repo.stargazers_count));
        out.push_str(&format!(
            "Repository License: {}\n",
            repo.license.as_ref().map_or("No license", |l| l.name.as_str())
        ));
    }
    out.push_str(SEPARATOR);
    out
}

/// GitHub wraps base64 payloads at 60 columns.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| OctoragError::InvalidArgument(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| OctoragError::InvalidArgument(format!("file is not UTF-8 text: {e}")))
}

fn encode_content(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
}

const HTML_URL_HINT: &str =
    "The URL of the repository, of the form https://github.com/owner/repo.";

/// The seven GitHub tools, in a fixed registration order.
pub fn github_tools(client: GitHubClient) -> Vec<Arc<dyn Tool>> {
    let client = Arc::new(client);
    vec![
        query_for_github_repos_tool(client.clone()),
        get_readme_tool(client.clone()),
        get_repo_tree_tool(client.clone()),
        get_file_contents_tool(client.clone()),
        create_repo_tool(client.clone()),
        create_file_tool(client.clone()),
        append_to_file_tool(client),
    ]
}

pub fn query_for_github_repos_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "query_for_github_repos",
        "Get information about repositories relevant to the keywords you enter. \
         Output sorted by star count.",
        AgentToolParameters::object()
            .string(
                "keywords",
                "Comma-separated keywords to search for; a keyword may contain spaces.",
                true,
            )
            .integer("count", "How many of the top repositories to describe. Default 1.", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move {
                let keywords = args.get_str("keywords")?;
                let count = args.get_i64_opt("count").unwrap_or(1).max(0) as usize;
                Ok(client.query_repos(keywords, count).await)
            }
        },
    ))
}

pub fn get_readme_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_readme",
        "Returns the README of a GitHub repository.",
        AgentToolParameters::object()
            .string("html_url", HTML_URL_HINT, true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move { Ok(client.readme(args.get_str("html_url")?).await) }
        },
    ))
}

pub fn get_repo_tree_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_repo_tree",
        "Get the list of files of a repository's default branch.",
        AgentToolParameters::object()
            .string("html_url", HTML_URL_HINT, true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move { Ok(client.repo_tree(args.get_str("html_url")?).await) }
        },
    ))
}

pub fn get_file_contents_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "get_file_contents",
        "Returns the contents of a file in a GitHub repository.",
        AgentToolParameters::object()
            .string("html_url", HTML_URL_HINT, true)
            .string(
                "file_dir",
                "Path of the file relative to the repository root, e.g. path/to/file.",
                true,
            )
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move {
                let html_url = args.get_str("html_url")?;
                let file_dir = args.get_str("file_dir")?;
                Ok(client.file_text(html_url, file_dir).await)
            }
        },
    ))
}

pub fn create_repo_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "create_repo",
        "Creates a new private GitHub repository. A random value is appended to the \
         name to keep it unique.",
        AgentToolParameters::object()
            .string("repository_name", "Name of the repository. Default \"test-repo\".", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move {
                let name = args.get_str_opt("repository_name").unwrap_or("test-repo");
                Ok(client.create_repo(name).await)
            }
        },
    ))
}

pub fn create_file_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "create_file",
        "Creates a file in a GitHub repository with the given contents.",
        AgentToolParameters::object()
            .string("owner", "Owner of the repository.", true)
            .string("repo", "Name of the repository.", true)
            .string("file_contents", "Initial text contents of the file.", true)
            .string("filename", "Name of the file. Default \"code.txt\".", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move {
                let owner = args.get_str("owner")?;
                let repo = args.get_str("repo")?;
                let contents = args.get_str("file_contents")?;
                let filename = args.get_str_opt("filename").unwrap_or("code.txt");
                Ok(client.create_file(owner, repo, contents, filename).await)
            }
        },
    ))
}

pub fn append_to_file_tool(client: Arc<GitHubClient>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "append_to_file",
        "Appends text to an existing file in a GitHub repository.",
        AgentToolParameters::object()
            .string("owner", "Owner of the repository.", true)
            .string("repo", "Name of the repository.", true)
            .string("further_content", "Text to append to the file.", true)
            .string("filename", "Name of the file. Default \"code.txt\".", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let client = client.clone();
            async move {
                let owner = args.get_str("owner")?;
                let repo = args.get_str("repo")?;
                let further = args.get_str("further_content")?;
                let filename = args.get_str_opt("filename").unwrap_or("code.txt");
                Ok(client.append_to_file(owner, repo, further, filename).await)
            }
        },
    ))
}
