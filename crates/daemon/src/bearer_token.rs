//! Local-frontend bearer-token gating (§6, §9): the token travels as
//! `Authorization: Bearer <localhostToken>` and may carry a `++++<extra>`
//! suffix the frontend ignores for comparison purposes. The §9 Open Question
//! calls out that the reference implementation mutates the token in place on
//! each request; here it is immutable and compared in constant time.

use subtle::ConstantTimeEq;

const EXTRA_SEPARATOR: &str = "++++";

/// Splits a raw `Authorization` header value into the bearer token proper,
/// discarding any `++++<extra>` suffix. Returns `None` if the header is not
/// a `Bearer` scheme.
pub fn strip_bearer_scheme(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

/// Removes a `++++<extra>` suffix, if present, returning just the token.
pub fn strip_extra_suffix(token: &str) -> &str {
    match token.find(EXTRA_SEPARATOR) {
        Some(index) => &token[..index],
        None => token,
    }
}

/// Constant-time comparison of the presented token against the configured
/// `localhost_token`, after stripping any `++++<extra>` suffix.
pub fn token_matches(presented: &str, localhost_token: &str) -> bool {
    let presented = strip_extra_suffix(presented);
    presented.as_bytes().ct_eq(localhost_token.as_bytes()).into()
}

/// Validates a raw `Authorization` header value against `localhost_token`.
pub fn authorize(header_value: &str, localhost_token: &str) -> bool {
    match strip_bearer_scheme(header_value) {
        Some(token) => token_matches(token, localhost_token),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_bare_matching_token() {
        assert!(authorize("Bearer secret-token", "secret-token"));
    }

    #[test]
    fn accepts_a_token_with_an_extra_suffix() {
        assert!(authorize("Bearer secret-token++++session-42", "secret-token"));
    }

    #[test]
    fn rejects_a_wrong_token() {
        assert!(!authorize("Bearer wrong-token", "secret-token"));
    }

    #[test]
    fn rejects_a_non_bearer_scheme() {
        assert!(!authorize("Basic secret-token", "secret-token"));
    }

    #[test]
    fn rejects_a_token_that_is_only_a_prefix_of_the_real_one() {
        assert!(!authorize("Bearer secret-tok", "secret-token"));
    }
}
