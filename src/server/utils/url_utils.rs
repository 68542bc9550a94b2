use url::Url;

use crate::server::error::{AppResult, Error};

/// caller supplied upstream url that passed scheme validation
///
/// `raw` is kept exactly as given because relative playlist entries are resolved against it by
/// plain string truncation, not by `Url::join`
#[derive(Debug, Clone, PartialEq)]
pub struct TargetUrl {
    raw: String,
    parsed: Url,
}

impl TargetUrl {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }
}

/// case-insensitive `http://` / `https://` prefix check
pub fn has_http_scheme(value: &str) -> bool {
    let prefix = |p: &str| {
        value
            .get(..p.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(p))
    };
    prefix("http://") || prefix("https://")
}

/// validate the raw `url` value, nothing here touches the network
pub fn validate_target_url(raw: Option<&str>) -> AppResult<TargetUrl> {
    let raw = raw.map(str::trim).unwrap_or_default();

    if raw.is_empty() {
        return Err(Error::MissingParameter);
    }

    if !has_http_scheme(raw) {
        return Err(Error::InvalidUrl(raw.to_string()));
    }

    let parsed = Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(raw.to_string()));
    }

    Ok(TargetUrl {
        raw: raw.to_string(),
        parsed,
    })
}
