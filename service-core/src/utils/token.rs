use subtle::ConstantTimeEq;

/// Compare a caller-supplied shared secret with the configured one in constant time.
///
/// An empty configured secret never matches: a deployment that forgot to set
/// the token must reject every caller instead of accepting an empty header.
pub fn shared_secret_matches(configured: &str, provided: &str) -> bool {
    if configured.is_empty() {
        return false;
    }

    let expected_bytes = configured.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// A bare `Bearer` prefix yields `Some("")`, which no configured token matches.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    if header_value.trim_end() == "Bearer" {
        return Some("");
    }
    header_value.strip_prefix("Bearer ").map(str::trim)
}
