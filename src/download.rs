//! Dataset download from a public S3-compatible bucket.
//!
//! Objects are listed with anonymous `ListObjectsV2` requests, following
//! continuation tokens until the listing is complete, and written into the
//! local download directory. Each file is staged in a temporary file next to
//! its destination and renamed into place once fully written, so a partial
//! download never shows up as a media file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::{LocalConfig, S3Config};
use crate::error::{MenagerieError, Result};

/// Outcome of [`S3Downloader::download_objects`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadReport {
    pub downloaded: Vec<PathBuf>,
    /// `(key, error)` for every object that could not be fetched.
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One page of a bucket listing.
#[derive(Debug, Clone, PartialEq)]
struct ListPage {
    keys: Vec<String>,
    next_token: Option<String>,
}

/// Lists and fetches objects under a key prefix.
#[derive(Debug, Clone)]
pub struct S3Downloader {
    client: Client,
    base_url: String,
    prefix: String,
    local_path: PathBuf,
    key_re: Regex,
    token_re: Regex,
    truncated_re: Regex,
}

impl S3Downloader {
    pub fn new(s3: &S3Config, local: &LocalConfig) -> Result<Self> {
        if s3.bucket.is_empty() {
            return Err(MenagerieError::config("s3.bucket is not set"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            base_url: bucket_url(s3),
            prefix: s3.path.clone(),
            local_path: local.path.clone(),
            key_re: compile(r"<Key>([^<]*)</Key>")?,
            token_re: compile(r"<NextContinuationToken>([^<]*)</NextContinuationToken>")?,
            truncated_re: compile(r"<IsTruncated>\s*true\s*</IsTruncated>")?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Keys under the configured prefix, restricted to those containing
    /// `category` when one is given.
    pub async fn search_objects(&self, category: Option<&str>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", self.prefix.as_str())];
            if let Some(token) = token.as_deref() {
                query.push(("continuation-token", token));
            }
            log::debug!("GET {} (prefix {})", self.base_url, self.prefix);
            let response = self
                .client
                .get(format!("{}/", self.base_url))
                .query(&query)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(MenagerieError::other(format!(
                    "bucket listing failed (status {status}): {body}"
                )));
            }

            let page = self.parse_list_page(&body);
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(filter_keys(keys, category))
    }

    /// Download every matching object into the local directory.
    ///
    /// A failing object is logged and recorded; the others are still fetched.
    pub async fn download_objects(&self, category: Option<&str>) -> Result<DownloadReport> {
        let keys = self.search_objects(category).await?;
        std::fs::create_dir_all(&self.local_path)?;

        let mut report = DownloadReport::default();
        for key in keys {
            let Some(target) = self.target_path(&key) else {
                continue;
            };
            log::info!("Downloading {key}");
            match self.download_object(&key, &target).await {
                Ok(()) => report.downloaded.push(target),
                Err(e) => {
                    log::warn!("Failed to download {key}: {e}");
                    report.failed.push((key, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn download_object(&self, key: &str, target: &Path) -> Result<()> {
        let url = format!("{}/{}", self.base_url, encode_key(key));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MenagerieError::other(format!(
                "GET {url} returned status {status}"
            )));
        }
        let bytes = response.bytes().await?;

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut staged, &bytes)?;
        staged
            .persist(target)
            .map_err(|e| MenagerieError::Io(e.error))?;
        Ok(())
    }

    /// `local_path/<last key segment>`; `None` for directory markers.
    fn target_path(&self, key: &str) -> Option<PathBuf> {
        let name = key.rsplit('/').next().filter(|n| !n.is_empty())?;
        Some(self.local_path.join(name))
    }

    fn parse_list_page(&self, body: &str) -> ListPage {
        let keys = self
            .key_re
            .captures_iter(body)
            .map(|c| unescape_xml(&c[1]))
            .collect();
        let next_token = if self.truncated_re.is_match(body) {
            self.token_re
                .captures(body)
                .map(|c| unescape_xml(&c[1]))
        } else {
            None
        };
        ListPage { keys, next_token }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MenagerieError::internal(format!("bad pattern {pattern}: {e}")))
}

/// Path-style URL for custom endpoints, virtual-hosted style for AWS.
fn bucket_url(s3: &S3Config) -> String {
    match (&s3.endpoint, &s3.region) {
        (Some(endpoint), _) => format!("{}/{}", endpoint.trim_end_matches('/'), s3.bucket),
        (None, Some(region)) if region != "us-east-1" => {
            format!("https://{}.s3.{region}.amazonaws.com", s3.bucket)
        }
        (None, _) => format!("https://{}.s3.amazonaws.com", s3.bucket),
    }
}

fn filter_keys(keys: Vec<String>, category: Option<&str>) -> Vec<String> {
    match category {
        Some(category) => keys.into_iter().filter(|k| k.contains(category)).collect(),
        None => keys,
    }
}

/// Unreserved characters plus `/`, so keys keep their path separators.
const KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE).to_string()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
