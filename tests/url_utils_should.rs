use stream_proxy::server::error::Error;
use stream_proxy::server::utils::url_utils::{has_http_scheme, validate_target_url};

#[test]
fn test_missing_value_is_missing_parameter() {
    assert!(matches!(validate_target_url(None), Err(Error::MissingParameter)));
    assert!(matches!(
        validate_target_url(Some("   ")),
        Err(Error::MissingParameter)
    ));
}

#[test]
fn test_rejects_non_http_schemes() {
    for raw in [
        "file:///etc/passwd",
        "ftp://files.example/stream.m3u8",
        "javascript:alert(1)",
        "//cdn.example/seg.ts",
        "cdn.example/seg.ts",
    ] {
        assert!(
            matches!(validate_target_url(Some(raw)), Err(Error::InvalidUrl(_))),
            "{} should be rejected",
            raw
        );
    }
}

#[test]
fn test_rejects_malformed_http_urls() {
    assert!(matches!(
        validate_target_url(Some("http://")),
        Err(Error::InvalidUrl(_))
    ));
    assert!(matches!(
        validate_target_url(Some("https://exa mple.com/x")),
        Err(Error::InvalidUrl(_))
    ));
}

#[test]
fn test_accepts_http_and_https_any_case() {
    let target = validate_target_url(Some("HTTP://origin.example/live/index.m3u8")).unwrap();
    assert_eq!(target.as_str(), "HTTP://origin.example/live/index.m3u8");
    assert_eq!(target.url().host_str(), Some("origin.example"));

    let target = validate_target_url(Some(" https://cdn.example/a.ts?x=1 ")).unwrap();
    assert_eq!(target.as_str(), "https://cdn.example/a.ts?x=1");
}

#[test]
fn test_scheme_check_is_prefix_only() {
    assert!(has_http_scheme("http://a"));
    assert!(has_http_scheme("hTtPs://a"));
    assert!(!has_http_scheme("http:/a"));
    assert!(!has_http_scheme("see http://a"));
    assert!(!has_http_scheme("ht"));
}
