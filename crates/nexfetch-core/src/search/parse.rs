//! Decode search response bodies into a single asset descriptor.

use super::{AssetDescriptor, SearchShape};
use crate::error::{FetchError, Result};
use serde::Deserialize;

/// `GET /service/rest/v1/search/assets`: assets at the top level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatResponse {
    #[serde(default)]
    items: Vec<AssetDescriptor>,
    continuation_token: Option<String>,
}

/// `GET /service/rest/v1/search`: components, each carrying its assets.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedResponse {
    #[serde(default)]
    items: Vec<NestedItem>,
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedItem {
    #[serde(default)]
    assets: Vec<AssetDescriptor>,
}

/// True when the header names the JSON media type. Parameters such as
/// `charset` are ignored; the type itself must be exactly `application/json`.
pub(crate) fn is_json_media_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim())
        .is_some_and(|essence| essence.eq_ignore_ascii_case("application/json"))
}

fn exactly_one<T>(mut items: Vec<T>, level: &'static str) -> Result<T> {
    if items.len() != 1 {
        return Err(FetchError::AmbiguousOrMissingAsset {
            level,
            count: items.len(),
        });
    }
    Ok(items.remove(0))
}

fn note_continuation(token: Option<&str>) {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        tracing::warn!(token, "search response is paginated; continuation is not followed");
    }
}

/// Parse a search body according to `shape` and apply the exact-one-result policy.
pub(crate) fn parse_search_body(shape: SearchShape, url: &str, body: &[u8]) -> Result<AssetDescriptor> {
    let invalid = |source| FetchError::InvalidSearchResponse {
        url: url.to_string(),
        source,
    };
    match shape {
        SearchShape::Flat => {
            let resp: FlatResponse = serde_json::from_slice(body).map_err(invalid)?;
            tracing::debug!(items = resp.items.len(), "got proper response back");
            note_continuation(resp.continuation_token.as_deref());
            exactly_one(resp.items, "asset")
        }
        SearchShape::Nested => {
            let resp: NestedResponse = serde_json::from_slice(body).map_err(invalid)?;
            tracing::debug!(items = resp.items.len(), "got proper response back");
            note_continuation(resp.continuation_token.as_deref());
            let item = exactly_one(resp.items, "search item")?;
            exactly_one(item.assets, "asset in search item")
        }
    }
}
