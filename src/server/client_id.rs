//! Best-effort client identity for the quota ledger. An anti-abuse signal,
//! not a secure identity.

use axum::http::HeaderMap;

const FALLBACK_COOKIE: &str = "twintalk_cid";

/// Derive the quota key for a request: forwarded IP headers first, then the
/// client cookie, then a shared anonymous bucket.
pub fn derive_client_id(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        // First hop is the original client when a proxy chain appended.
        if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return ip.to_string();
        }
    }
    if let Some(ip) = header_str(headers, "x-real-ip").map(str::trim).filter(|s| !s.is_empty()) {
        return ip.to_string();
    }
    if let Some(cookie) = header_str(headers, "cookie") {
        for pair in cookie.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                if name.trim() == FALLBACK_COOKIE && !value.trim().is_empty() {
                    return format!("cid:{}", value.trim());
                }
            }
        }
    }
    "anonymous".to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(derive_client_id(&headers), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(derive_client_id(&headers), "198.51.100.4");
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; twintalk_cid=abc123"),
        );
        assert_eq!(derive_client_id(&headers), "cid:abc123");
    }

    #[test]
    fn test_anonymous_when_nothing_present() {
        assert_eq!(derive_client_id(&HeaderMap::new()), "anonymous");
    }
}
