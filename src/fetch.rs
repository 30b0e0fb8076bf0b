//! Log retrieval. A location is tried against every known paste host in order;
//! the first host whose pattern matches and whose download succeeds wins.

use crate::error::FetchError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Payload {
    Text,
    /// GitHub gist API answer; the log is the content of the first file.
    GistJson,
}

struct Source {
    name: &'static str,
    pattern: &'static str,
    endpoint: fn(&str) -> String,
    payload: Payload,
}

fn obs_endpoint(id: &str) -> String { format!("https://obsproject.com/logs/{}", id) }
fn discord_endpoint(id: &str) -> String { format!("https://cdn.discordapp.com/attachments/{}", id) }
fn pastebin_endpoint(id: &str) -> String { format!("https://pastebin.com/raw/{}", id) }
fn hastebin_endpoint(id: &str) -> String { format!("https://hastebin.com/raw/{}", id) }
fn gist_endpoint(id: &str) -> String { format!("https://api.github.com/gists/{}", id) }

static SOURCES: &[Source] = &[
    Source { name: "obsproject", pattern: r"(?i)^https?:/{1,3}(?:www\.)?obsproject\.com/logs/(.{16})", endpoint: obs_endpoint, payload: Payload::Text },
    Source {
        name: "discord",
        pattern: r"(?i)^https?:/{1,3}cdn\.discordapp\.com/attachments/([0-9]{18}/[0-9]{18}/(?:[0-9_-]{19}|message)\.txt)",
        endpoint: discord_endpoint,
        payload: Payload::Text,
    },
    Source { name: "pastebin", pattern: r"(?i)^https?:/{1,3}(?:www\.)?pastebin\.com/(?:raw/)?(.{8})", endpoint: pastebin_endpoint, payload: Payload::Text },
    Source { name: "hastebin", pattern: r"(?i)^https?:/{1,3}(?:www\.)?hastebin\.com/([a-z0-9]{10})", endpoint: hastebin_endpoint, payload: Payload::Text },
    Source { name: "gist", pattern: r"(?i)^https?:/{1,3}gist\.github\.com/(?:anonymous/)?([a-z0-9]{32})", endpoint: gist_endpoint, payload: Payload::GistJson },
];

fn patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| SOURCES.iter().map(|s| Regex::new(s.pattern).expect("valid source pattern")).collect())
}

/// A host that recognised the location, and where its raw log lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub source: &'static str,
    pub endpoint: String,
    payload: Payload,
}

pub fn candidates(location: &str) -> Vec<Candidate> {
    let location = location.trim();
    SOURCES.iter().zip(patterns()).filter_map(|(src, re)| {
        let id = re.captures(location)?.get(1)?.as_str();
        Some(Candidate { source: src.name, endpoint: (src.endpoint)(id), payload: src.payload })
    }).collect()
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig { timeout: Duration::from_secs(15), user_agent: format!("ObsDoctor/{}", env!("CARGO_PKG_VERSION")) }
    }
}

fn download(client: &reqwest::blocking::Client, c: &Candidate) -> Result<String, FetchError> {
    log::debug!("fetching {} log from {}", c.source, c.endpoint);
    let resp = client.get(&c.endpoint).send()?;
    let status = resp.status();
    if !status.is_success() { return Err(FetchError::Status { source_name: c.source, status: status.as_u16() }); }
    let body = resp.text()?;
    let text = match c.payload {
        Payload::Text => Some(body),
        Payload::GistJson => gist_content(&body),
    };
    text.filter(|t| !t.trim().is_empty()).ok_or(FetchError::MissingContent(c.source))
}

/// Content of the first file in a gist API response.
pub fn gist_content(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let files = v.get("files")?.as_object()?;
    files.values().find_map(|f| f.get("content")?.as_str().map(str::to_string))
}

pub fn try_url(location: &str, cfg: &FetchConfig) -> Result<String, FetchError> {
    let found = candidates(location);
    if found.is_empty() { return Err(FetchError::NoMatchingSource(location.to_string())); }
    let client = reqwest::blocking::Client::builder().timeout(cfg.timeout).user_agent(cfg.user_agent.clone()).build()?;
    let mut last = None;
    for c in &found {
        match download(&client, c) {
            Ok(text) => return Ok(text),
            Err(e) => { log::warn!("{} fetch failed: {}", c.source, e); last = Some(e); }
        }
    }
    Err(last.unwrap_or_else(|| FetchError::NoMatchingSource(location.to_string())))
}

pub fn url(location: &str, cfg: &FetchConfig) -> Option<String> {
    match try_url(location, cfg) {
        Ok(t) => Some(t),
        Err(e) => { log::warn!("could not retrieve {}: {}", location, e); None }
    }
}

pub fn try_file(path: &str) -> Result<String, FetchError> {
    let bytes = std::fs::read(path).map_err(|err| FetchError::Io { path: path.to_string(), err })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn file(path: &str) -> Option<String> {
    match try_file(path) {
        Ok(t) => Some(t),
        Err(e) => { log::warn!("{}", e); None }
    }
}
