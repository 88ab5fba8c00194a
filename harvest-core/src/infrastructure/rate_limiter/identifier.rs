//! Client identification for rate limiting

use http::HeaderMap;

/// Set by the trusted upstream once a session is authenticated
pub const USER_ID_HEADER: &str = "x-user-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Identifier used when no header names the client
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Resolve the rate limit identifier for a request
///
/// Authenticated users are limited per account, everyone else per client IP.
pub fn resolve_identifier(headers: &HeaderMap) -> String {
    if let Some(user_id) = header_value(headers, USER_ID_HEADER) {
        return format!("user:{}", user_id);
    }

    // Only the first entry is the original client
    if let Some(forwarded) = header_value(headers, FORWARDED_FOR_HEADER)
        && let Some(ip) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    {
        return format!("ip:{}", ip);
    }

    if let Some(ip) = header_value(headers, REAL_IP_HEADER) {
        return format!("ip:{}", ip);
    }

    UNKNOWN_IDENTIFIER.to_string()
}
