//! Repository search: resolve an asset name to exactly one descriptor.
//!
//! Queries the Nexus REST search API with curl, validates status and media
//! type, and decodes the body with the configured [`SearchShape`]. Pagination
//! is never followed; a response needing it is a lookup failure.

mod parse;

use crate::control::CancelToken;
use crate::error::{FetchError, Result};
use crate::http::{self, HttpOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One downloadable asset as reported by the search API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetDescriptor {
    pub download_url: String,
    pub path: String,
    pub id: String,
    pub repository: String,
    pub format: String,
    /// Algorithm name (`md5`, `sha1`, ...) to hex digest.
    #[serde(rename = "checksum", alias = "checksums")]
    pub checksums: BTreeMap<String, String>,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl AssetDescriptor {
    pub fn checksum(&self, algorithm: &str) -> Option<&str> {
        self.checksums.get(algorithm).map(String::as_str)
    }
}

/// Wire shape of the search response. The two are not wire-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchShape {
    /// Asset search: `{items: [asset...], continuationToken}`.
    #[default]
    Flat,
    /// Component search: `{items: [{..., assets: [asset...]}], continuationToken}`.
    Nested,
}

impl SearchShape {
    /// REST path queried for this shape.
    pub fn endpoint(&self) -> &'static str {
        match self {
            SearchShape::Flat => "/service/rest/v1/search/assets",
            SearchShape::Nested => "/service/rest/v1/search",
        }
    }
}

impl fmt::Display for SearchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchShape::Flat => f.write_str("flat"),
            SearchShape::Nested => f.write_str("nested"),
        }
    }
}

impl FromStr for SearchShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(SearchShape::Flat),
            "nested" => Ok(SearchShape::Nested),
            other => Err(format!("unknown search shape: {}", other)),
        }
    }
}

/// Base URL for a server value. A bare host gets `https://`; a value that
/// already names a scheme is used as-is.
pub fn server_base(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

/// Full search URL. The asset name is form-urlencoded; the repository is
/// passed verbatim.
pub fn search_url(shape: SearchShape, server: &str, repository: &str, name: &str) -> String {
    let name: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!(
        "{}{}?name={}&repository={}",
        server_base(server),
        shape.endpoint(),
        name,
        repository
    )
}

/// Search client bound to one wire shape and set of timeouts.
#[derive(Debug, Clone, Default)]
pub struct SearchClient {
    shape: SearchShape,
    http: HttpOptions,
}

impl SearchClient {
    pub fn new(shape: SearchShape, http: HttpOptions) -> Self {
        Self { shape, http }
    }

    pub fn shape(&self) -> SearchShape {
        self.shape
    }

    /// Look up `name` in `repository` and return the single matching asset.
    ///
    /// `auth` is the Basic auth value, attached only when present.
    pub fn search(
        &self,
        server: &str,
        repository: &str,
        name: &str,
        auth: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<AssetDescriptor> {
        let url = search_url(self.shape, server, repository, name);
        let mut body = Vec::new();
        let resp = http::get(
            &url,
            auth,
            Duration::from_secs(self.http.search_timeout_secs),
            &self.http,
            cancel,
            |_, chunk| {
                body.extend_from_slice(chunk);
                Ok(())
            },
        )?;

        if resp.status != 200 {
            return Err(FetchError::UpstreamRequest {
                url,
                status: resp.status,
            });
        }
        if !parse::is_json_media_type(resp.content_type.as_deref()) {
            return Err(FetchError::UnexpectedContentType {
                url,
                content_type: resp.content_type,
            });
        }
        parse::parse_search_body(self.shape, &url, &body)
    }
}
