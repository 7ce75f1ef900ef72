//! Canonical blog URL handling.
//!
//! Every store keys on the normalized form, so normalization must be
//! deterministic and idempotent.

use url::Url;

use crate::error::CoreError;

/// Query parameters preserved in the canonical form. Currently none — all
/// query strings are dropped.
const ALLOWED_QUERY_PARAMS: &[&str] = &[];

/// Normalize a raw blog URL into its canonical form.
///
/// Rules:
/// - default the scheme to `https` when missing
/// - lowercase the host and strip a leading `www.`
/// - strip the trailing slash unless the path is exactly `/`
/// - drop the fragment and all query parameters (allow-list is empty)
pub fn normalize(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidUrl(raw.to_string()));
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{trimmed}")
    };

    let mut parsed =
        Url::parse(&with_scheme).map_err(|_| CoreError::InvalidUrl(raw.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| CoreError::InvalidUrl(raw.to_string()))?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    parsed
        .set_host(Some(host.as_str()))
        .map_err(|_| CoreError::InvalidUrl(raw.to_string()))?;

    parsed.set_fragment(None);

    if ALLOWED_QUERY_PARAMS.is_empty() {
        parsed.set_query(None);
    } else {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| ALLOWED_QUERY_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let mut out = parsed.to_string();
    // Url keeps the root path as "/"; anything longer loses the trailing slash.
    if out.ends_with('/') {
        let path = parsed.path();
        if path.len() > 1 {
            out.pop();
        }
    }

    Ok(out)
}

/// Two URLs are equivalent when they normalize to the same canonical form.
pub fn equivalent(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(na), Ok(nb)) => na == nb,
        _ => false,
    }
}

/// Extract the normalized host from a URL (lowercased, no `www.`).
pub fn domain(raw: &str) -> Result<String, CoreError> {
    let normalized = normalize(raw)?;
    let parsed = Url::parse(&normalized).map_err(|_| CoreError::InvalidUrl(raw.to_string()))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| CoreError::InvalidUrl(raw.to_string()))
}

/// True when `host` is `publisher_domain` or a subdomain of it.
pub fn is_same_or_subdomain(host: &str, publisher_domain: &str) -> bool {
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let base = publisher_domain.to_lowercase();
    let base = base.strip_prefix("www.").unwrap_or(&base);
    host == base || host.ends_with(&format!(".{base}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases_host() {
        assert_eq!(
            normalize("https://WWW.Example.COM/Post").unwrap(),
            "https://example.com/Post"
        );
    }

    #[test]
    fn adds_https_scheme() {
        assert_eq!(
            normalize("example.com/path").unwrap(),
            "https://example.com/path"
        );
        assert_eq!(
            normalize("//example.com/path").unwrap(),
            "https://example.com/path"
        );
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        assert_eq!(
            normalize("https://example.com/a/b/").unwrap(),
            "https://example.com/a/b"
        );
        assert_eq!(normalize("https://example.com/").unwrap(), "https://example.com/");
        assert_eq!(normalize("https://example.com").unwrap(), "https://example.com/");
    }

    #[test]
    fn drops_query_and_fragment() {
        assert_eq!(
            normalize("https://example.com/post?utm_source=x&ref=y#section-2").unwrap(),
            "https://example.com/post"
        );
    }

    #[test]
    fn preserves_path_case() {
        assert_eq!(
            normalize("https://Example.com/Mixed/Case").unwrap(),
            "https://example.com/Mixed/Case"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "https://www.example.com/post-a/",
            "example.com",
            "http://blog.example.com/x?q=1#f",
        ];
        for raw in inputs {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn equivalence_ignores_www_and_trailing_slash() {
        assert!(equivalent(
            "https://www.example.com/post/",
            "https://example.com/post"
        ));
        assert!(!equivalent(
            "https://example.com/post-a",
            "https://example.com/post-b"
        ));
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain("https://www.example.com/post").unwrap(), "example.com");
        assert_eq!(domain("blog.example.com/x").unwrap(), "blog.example.com");
    }

    #[test]
    fn subdomain_matching() {
        assert!(is_same_or_subdomain("example.com", "example.com"));
        assert!(is_same_or_subdomain("blog.example.com", "example.com"));
        assert!(!is_same_or_subdomain("evil.com", "example.com"));
        assert!(!is_same_or_subdomain("notexample.com", "example.com"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
    }

    #[test]
    fn keeps_explicit_port() {
        assert_eq!(
            normalize("https://example.com:8443/post/").unwrap(),
            "https://example.com:8443/post"
        );
    }

    #[test]
    fn keeps_http_scheme_when_given() {
        assert_eq!(
            normalize("http://example.com/post").unwrap(),
            "http://example.com/post"
        );
    }

    #[test]
    fn equivalent_rejects_invalid_inputs() {
        assert!(!equivalent("", "https://example.com"));
        assert!(!equivalent("https://example.com", ""));
    }
}
