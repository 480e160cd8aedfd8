//! Host string normalization and classification.

/// Strips a leading `http://` or `https://`, leaving everything else
/// unchanged. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(host: &str) -> String {
    host.strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
        .to_string()
}

/// True if `host` (after normalizing and stripping any trailing port)
/// refers to the local machine.
pub fn is_localhost(host: &str) -> bool {
    let normalized = normalize(host);
    let without_port = strip_port(&normalized);
    matches!(without_port, "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // bracketed IPv6, optionally followed by :port
        if let Some(end) = rest.find(']') {
            return &host[..end + 2];
        }
        return host;
    }
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => h,
        _ => host,
    }
}

/// Returns `host` unchanged if it already carries a scheme, otherwise
/// prepends `http://` for localhost and `https://` everywhere else.
pub fn base_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    if is_localhost(host) {
        format!("http://{host}")
    } else {
        format!("https://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scheme() {
        assert_eq!(normalize("http://example.com"), "example.com");
        assert_eq!(normalize("https://example.com"), "example.com");
        assert_eq!(normalize("example.com"), "example.com");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("https://example.com");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn schemes_collapse_to_same_key() {
        assert_eq!(normalize("http://h"), normalize("https://h"));
        assert_eq!(normalize("http://h"), normalize("h"));
    }

    #[test]
    fn is_localhost_recognizes_common_forms() {
        assert!(is_localhost("localhost"));
        assert!(is_localhost("localhost:8080"));
        assert!(is_localhost("127.0.0.1"));
        assert!(is_localhost("127.0.0.1:9000"));
        assert!(is_localhost("::1"));
        assert!(is_localhost("[::1]:8080"));
        assert!(is_localhost("http://localhost:3000"));
        assert!(!is_localhost("example.com"));
        assert!(!is_localhost("registry.example.com:443"));
    }

    #[test]
    fn base_url_picks_scheme_by_locality() {
        assert_eq!(base_url("localhost:8080"), "http://localhost:8080");
        assert_eq!(base_url("registry.example.com"), "https://registry.example.com");
        assert_eq!(base_url("http://already.scheme"), "http://already.scheme");
        assert_eq!(base_url("https://already.scheme"), "https://already.scheme");
    }
}
