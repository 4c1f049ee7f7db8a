mod error;
mod parser;

pub use error::{DownloadError, Result};
pub use parser::{parse_language_list, parse_transcript};

use log::debug;
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://www.youtube.com";
pub const DEFAULT_LANGUAGE_KEY: &str = "default";

const TIMEDTEXT_PATH: &str = "/api/timedtext";
const SHORT_LINK_HOST: &str = "youtu.be";
const MAIN_HOSTS: [&str; 2] = ["youtube.com", "www.youtube.com"];

/// Human-readable language name (plus [`DEFAULT_LANGUAGE_KEY`]) -> language code.
pub type LanguageMap = HashMap<String, String>;

/// One timed caption entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    #[serde(serialize_with = "serialize_seconds")]
    pub start: Duration,
    #[serde(serialize_with = "serialize_seconds")]
    pub end: Duration,
    pub text: String,
    /// Zero-based position in the source document.
    pub index: usize,
}

impl Line {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subtitle {
    pub lines: Vec<Line>,
}

impl Subtitle {
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Line> {
        self.lines.iter()
    }
}

impl IntoIterator for Subtitle {
    type Item = Line;
    type IntoIter = std::vec::IntoIter<Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a Subtitle {
    type Item = &'a Line;
    type IntoIter = std::slice::Iter<'a, Line>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

fn serialize_seconds<S: Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Settings for the HTTP side of [`SubtitleDownloader`].
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub endpoint: String,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
            user_agent: None,
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    fn build_client(&self) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }

        builder
            .build()
            .map_err(|e| DownloadError::ClientBuild(e.to_string()))
    }
}

/// Extract the video ID from a YouTube URL.
///
/// Supported shapes:
/// - `http://youtu.be/5MgBikgcWnY`
/// - `http://www.youtube.com/watch?v=5MgBikgcWnY&feature=feed`
/// - `http://www.youtube.com/embed/5MgBikgcWnY`
/// - `http://www.youtube.com/v/5MgBikgcWnY?version=3`
///
/// A `/watch` URL without a `v` parameter yields an empty ID.
pub fn parse_video_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(DownloadError::UnsupportedScheme(scheme.to_string()));
    }

    let host = raw_host(url);
    let path = percent_decode_str(parsed.path()).decode_utf8_lossy();

    if host == SHORT_LINK_HOST {
        return Ok(path.strip_prefix('/').unwrap_or(&path).to_string());
    }

    if !MAIN_HOSTS.contains(&host) {
        return Err(DownloadError::UnrecognizedHost(host.to_string()));
    }

    if path.starts_with("/watch") {
        Ok(parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default())
    } else if path.starts_with("/v/") || path.starts_with("/embed/") {
        Ok(path.split('/').nth(2).unwrap_or_default().to_string())
    } else {
        Err(DownloadError::UnrecognizedPath(path.into_owned()))
    }
}

/// Host as written in `url`, port included and case untouched.
///
/// `Url` lowercases the host and drops default ports, so matching is done
/// on the raw authority instead.
fn raw_host(url: &str) -> &str {
    let Some((_, rest)) = url.split_once("://") else {
        return "";
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host)
}

/// Client for the caption track of a single video.
///
/// The language list is fetched once during construction; every call to
/// [`download`](Self::download) fetches the default track again.
pub struct SubtitleDownloader {
    url: String,
    video_id: String,
    languages: LanguageMap,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl SubtitleDownloader {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, DownloaderConfig::default())
    }

    pub fn with_config(url: &str, config: DownloaderConfig) -> Result<Self> {
        let video_id = parse_video_id(url)?;
        debug!("Resolved video ID {:?} from {}", video_id, url);

        let mut downloader = Self {
            url: url.to_string(),
            video_id,
            languages: LanguageMap::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client: config.build_client()?,
        };
        downloader.fetch_available_languages()?;

        Ok(downloader)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn languages(&self) -> &LanguageMap {
        &self.languages
    }

    pub fn default_language(&self) -> Option<&str> {
        self.languages.get(DEFAULT_LANGUAGE_KEY).map(String::as_str)
    }

    /// Download and parse the caption track in the default language.
    ///
    /// Without a default track the request goes out with an empty `lang`.
    pub fn download(&self) -> Result<Subtitle> {
        let lang = self.default_language().unwrap_or_default();
        let url = self.timedtext_url(&[("v", self.video_id.as_str()), ("lang", lang)])?;

        let body = self.fetch(&url)?;
        parse_transcript(&body)
    }

    fn fetch_available_languages(&mut self) -> Result<()> {
        let url = self.timedtext_url(&[("v", self.video_id.as_str()), ("type", "list")])?;

        let body = self.fetch(&url)?;
        self.languages.extend(parse_language_list(&body)?);

        Ok(())
    }

    fn timedtext_url(&self, params: &[(&str, &str)]) -> Result<Url> {
        let base = format!("{}{}", self.endpoint, TIMEDTEXT_PATH);
        Url::parse_with_params(&base, params)
            .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", base, e)))
    }

    fn fetch(&self, url: &Url) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| DownloadError::NetworkFailure(format!("Failed to fetch {}: {}", url, e)))?;

        check_http_status(&response)?;

        response
            .text()
            .map_err(|e| DownloadError::NetworkFailure(format!("Failed to read response: {}", e)))
    }
}

fn check_http_status(response: &reqwest::blocking::Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::HttpStatus {
            status: status.as_u16(),
            reason: status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        });
    }
    Ok(())
}

/// Fetch the default-language subtitle for `url` in one call.
pub fn download(url: &str) -> Result<Subtitle> {
    SubtitleDownloader::new(url)?.download()
}
