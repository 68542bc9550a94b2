use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

pub type AppResult<T> = Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing url parameter")]
    MissingParameter,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("upstream redirect limit exceeded: {0}")]
    TooManyRedirects(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("manifest from {0} is larger than {1} bytes")]
    ManifestTooLarge(String, usize),

    #[error("internal server error: {0}")]
    InternalServerErrorWithContext(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter | Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::TooManyRedirects(_)
            | Self::UpstreamTimeout(_)
            | Self::UpstreamUnreachable(_)
            | Self::ManifestTooLarge(..) => StatusCode::BAD_GATEWAY,
            Self::InternalServerErrorWithContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// what the caller sees, causes stay in the logs
    fn public_message(&self) -> &'static str {
        match self {
            Self::MissingParameter => "Missing url parameter",
            Self::InvalidUrl(_) => "Invalid url",
            Self::TooManyRedirects(_)
            | Self::UpstreamTimeout(_)
            | Self::UpstreamUnreachable(_)
            | Self::ManifestTooLarge(..) => "Upstream fetch error",
            Self::InternalServerErrorWithContext(_) => "Internal server error",
        }
    }

    /// label used for the upstream error counter
    pub fn upstream_reason(&self) -> Option<&'static str> {
        match self {
            Self::TooManyRedirects(_) => Some("redirects"),
            Self::UpstreamTimeout(_) => Some("timeout"),
            Self::UpstreamUnreachable(_) => Some("unreachable"),
            Self::ManifestTooLarge(..) => Some("too_large"),
            _ => None,
        }
    }
}

/// reqwest message with the url it failed on, so production logs say which origin broke
fn describe(err: &reqwest::Error) -> String {
    let message = err.to_string();
    match err.url() {
        Some(url) if !message.contains(url.as_str()) => format!("{} ({})", message, url),
        _ => message,
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let cause = describe(&err);

        if err.is_timeout() {
            Self::UpstreamTimeout(cause)
        } else if err.is_redirect() {
            Self::TooManyRedirects(cause)
        } else if err.is_builder() {
            Self::InternalServerErrorWithContext(cause)
        } else {
            Self::UpstreamUnreachable(cause)
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_client_error() {
            warn!("Rejected proxy request: {}", self);
        } else {
            error!("Proxy request failed: {}", self);
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(Error::MissingParameter.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::InvalidUrl("ftp://x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_errors_are_bad_gateway() {
        for err in [
            Error::TooManyRedirects("http://loop.example/a.ts".into()),
            Error::UpstreamTimeout("http://slow.example/index.m3u8".into()),
            Error::UpstreamUnreachable("connection refused".into()),
            Error::ManifestTooLarge("http://big.example/index.m3u8".into(), 1024),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
            assert!(err.upstream_reason().is_some());
        }
    }

    #[test]
    fn internal_errors_hide_their_context() {
        let response =
            Error::InternalServerErrorWithContext("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Error::InternalServerErrorWithContext("secret detail".into()).public_message(),
            "Internal server error"
        );
    }

    #[test]
    fn upstream_message_is_generic() {
        assert_eq!(
            Error::UpstreamTimeout("http://slow.example/x.ts".into()).public_message(),
            Error::UpstreamUnreachable("dns".into()).public_message()
        );
        assert_eq!(Error::MissingParameter.upstream_reason(), None);
    }

    #[test]
    fn upstream_errors_name_the_origin_in_logs() {
        let err = Error::UpstreamTimeout("http://slow.example/index.m3u8".into());
        assert!(err.to_string().contains("slow.example"));

        let err = Error::ManifestTooLarge("http://big.example/index.m3u8".into(), 1024);
        assert!(err.to_string().contains("big.example"));
    }
}
