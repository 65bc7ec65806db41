// HTTPS access to NCBI's genomes tree. Directory listings come from the
// server's HTML index pages.

use std::path::Path;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::{Client, Response, StatusCode, Url};
use scraper::{Html, Selector};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::RemoteSource;
use crate::error::{ConfigError, GenomirrorError, RemoteError, Result};

#[derive(Debug, Clone)]
pub struct HttpsMirror {
    base: Url,
    client: Client,
}

impl HttpsMirror {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ConfigError::Invalid(format!("remote.url '{base_url}': {e}")))?;
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(RemoteError::Http)?;
        Ok(Self { base, client })
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let url = remote_url(&self.base, path)?;
        debug!(url = %url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(RemoteError::Http)?;
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(RemoteError::Missing(path.to_string()).into()),
            s => Err(RemoteError::Status {
                status: s.as_u16(),
                url: url.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl RemoteSource for HttpsMirror {
    fn name(&self) -> &'static str {
        "https"
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir = format!("{}/", dir.trim_end_matches('/'));
        let resp = self.get(&dir).await?;
        // Links resolve against wherever the server finally answered
        let index_url = resp.url().clone();
        let body = resp.text().await.map_err(RemoteError::Http)?;
        Ok(parse_index(&index_url, &body))
    }

    async fn retrieve_lines(&self, path: &str) -> Result<Vec<String>> {
        let body = self
            .get(path)
            .await?
            .text()
            .await
            .map_err(RemoteError::Http)?;
        Ok(body.lines().map(String::from).collect())
    }

    async fn retrieve_binary(&self, path: &str, dest: &Path) -> Result<u64> {
        let mut resp = self.get(path).await?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| GenomirrorError::io(dest, e))?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(RemoteError::Http)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| GenomirrorError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| GenomirrorError::io(dest, e))?;
        Ok(written)
    }
}

fn remote_url(base: &Url, path: &str) -> Result<Url> {
    // A leading `//` would name another host
    let path = if path.starts_with("//") {
        format!("/{}", path.trim_start_matches('/'))
    } else {
        path.to_string()
    };
    base.join(&path).map_err(|e| {
        RemoteError::BadPath {
            path,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Entry names from the HTML directory index served at `dir`.
///
/// Keeps links that resolve to a direct child of `dir`, which drops sort
/// links, the parent directory and anything off-site. Names are
/// percent-decoded and lose the trailing `/` of subdirectories.
pub fn parse_index(dir: &Url, html: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let Ok(anchors) = Selector::parse("a[href]") else {
        return names;
    };
    let doc = Html::parse_document(html);
    for anchor in doc.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with(['?', '#']) {
            continue;
        }
        let Ok(target) = dir.join(href) else {
            continue;
        };
        if let Some(name) = child_name(dir, &target) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn child_name(dir: &Url, target: &Url) -> Option<String> {
    if target.origin() != dir.origin() || target.query().is_some() {
        return None;
    }
    let rest = target.path().strip_prefix(dir.path())?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    let name = percent_decode_str(rest).decode_utf8().ok()?;
    Some(name.into_owned())
}
