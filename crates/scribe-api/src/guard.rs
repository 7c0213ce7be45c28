use crate::error::ApiError;
use scribe_types::api::Claims;

/// Resolve the identity a mutation is attributed to: the username baked
/// into the verified token wins, then a client-supplied value, then none.
pub fn resolve_author(claims: &Claims, requested: Option<String>) -> Option<String> {
    claims
        .username
        .clone()
        .or(requested)
        .filter(|name| !name.is_empty())
}

/// Ownership guard for mutations on posts and comments.
///
/// Permitted iff the stored author snapshot is present, non-empty, and an
/// exact case-sensitive match for the caller's identity. Rows with no
/// author (anonymous/legacy content) are owned by nobody and can never be
/// mutated through the API.
pub fn check_owner(
    stored_author: Option<&str>,
    caller: Option<&str>,
    kind: &'static str,
) -> Result<(), ApiError> {
    match (stored_author, caller) {
        (Some(stored), Some(caller)) if !stored.is_empty() && stored == caller => Ok(()),
        _ => Err(ApiError::NotOwner(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(username: Option<&str>) -> Claims {
        Claims {
            sub: 1,
            email: "alice@x.com".into(),
            username: username.map(String::from),
            exp: 0,
        }
    }

    #[test]
    fn test_token_identity_wins_over_request_field() {
        let resolved = resolve_author(&claims(Some("alice")), Some("mallory".into()));
        assert_eq!(resolved.as_deref(), Some("alice"));
    }

    #[test]
    fn test_request_field_used_without_token_identity() {
        let resolved = resolve_author(&claims(None), Some("carol".into()));
        assert_eq!(resolved.as_deref(), Some("carol"));

        assert_eq!(resolve_author(&claims(None), None), None);
        assert_eq!(resolve_author(&claims(None), Some(String::new())), None);
    }

    #[test]
    fn test_owner_match() {
        assert!(check_owner(Some("alice"), Some("alice"), "post").is_ok());
    }

    #[test]
    fn test_owner_mismatch_is_forbidden() {
        assert!(matches!(
            check_owner(Some("alice"), Some("bob"), "post"),
            Err(ApiError::NotOwner("post"))
        ));
        // case-sensitive exact match
        assert!(check_owner(Some("alice"), Some("Alice"), "post").is_err());
    }

    #[test]
    fn test_anonymous_rows_are_never_mutable() {
        assert!(check_owner(None, Some("alice"), "post").is_err());
        assert!(check_owner(Some(""), Some("alice"), "post").is_err());
        assert!(check_owner(Some("alice"), None, "post").is_err());
    }
}
