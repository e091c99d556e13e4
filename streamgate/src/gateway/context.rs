//! Per-request context setup (§4.6 step 1): resolve the source URL and
//! derive the stable output directory for it via the distributor (C9).

use std::path::PathBuf;

use axum::http::HeaderMap;

use crate::config::GatewayConfig;
use crate::distributor;
use crate::{Error, Result};

pub const SOURCE_URL_HEADER: &str = "x-source-url";
pub const SOURCE_URL_QUERY: &str = "source_url";

/// Everything downstream middleware needs about the current request's
/// target stream.
pub struct RequestContext {
    pub source_url: String,
    pub output_dir: PathBuf,
}

/// Resolve the source URL from `X-Source-Url` or `?source_url=`, falling
/// back to `cfg.input` when neither is present, then hash it into a
/// concrete output directory under `cfg.output`.
pub async fn resolve(cfg: &GatewayConfig, headers: &HeaderMap, query: &str) -> Result<RequestContext> {
    let source_url = source_url_from(headers, query).or_else(|| cfg.input.clone()).ok_or(Error::InputInvalid)?;

    let hash = distributor::hash_of_source(&source_url);
    let output_dir = distributor::get_dir(&cfg.output, &hash).await?;

    Ok(RequestContext { source_url, output_dir })
}

fn source_url_from(headers: &HeaderMap, query: &str) -> Option<String> {
    if let Some(value) = headers.get(SOURCE_URL_HEADER) {
        if let Ok(s) = value.to_str() {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SOURCE_URL_QUERY)
        .map(|(_, value)| value.into_owned())
        .filter(|s| !s.is_empty())
}
