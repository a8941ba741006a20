//! Identifier validation for user-supplied sort columns and include names.
//!
//! Sort fields and includes end up interpolated into generated SQL, so they
//! are checked here before any query fragment is built. Anything that fails
//! is dropped or replaced by a default; nothing in this module returns an
//! error to the caller.

use std::collections::HashSet;

use crate::filtering::QueryBuilder;

/// A valid identifier is non-empty and made only of ASCII letters, digits,
/// `_` and `.`.
#[must_use]
pub fn is_valid_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Return the sort field if it is safe to interpolate, `None` otherwise.
#[must_use]
pub fn validate_sort_field(field: &str) -> Option<&str> {
    if is_valid_identifier(field) {
        Some(field)
    } else {
        if !field.is_empty() {
            tracing::debug!(sort = %field, "Rejected sort field, using default sort");
        }
        None
    }
}

/// Keep the includes that are syntactically valid and, when the builder
/// declares an allow-set, present in it. Order is preserved.
#[must_use]
pub fn validate_includes<B>(builder: &B, includes: &[String]) -> Vec<String>
where
    B: QueryBuilder + ?Sized,
{
    filter_includes(builder.allowed_includes(), includes)
}

pub(crate) fn filter_includes(allowed: Option<&HashSet<String>>, includes: &[String]) -> Vec<String> {
    includes
        .iter()
        .filter(|include| {
            let keep = is_valid_identifier(include)
                && allowed.is_none_or(|allowed| allowed.contains(include.as_str()));
            if !keep {
                tracing::debug!(include = %include, "Dropped include");
            }
            keep
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_dotted_columns() {
        for field in ["created_at", "user.name", "Title2", "a", "posts.author.id"] {
            assert!(is_valid_identifier(field), "{field} should be valid");
        }
    }

    #[test]
    fn test_rejects_injection_attempts() {
        for field in [
            "",
            "created_at;DROP TABLE x",
            "name desc",
            "id--",
            "title'",
            "(select 1)",
            "naïve",
            "a,b",
        ] {
            assert!(!is_valid_identifier(field), "{field:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_sort_field() {
        assert_eq!(validate_sort_field("created_at"), Some("created_at"));
        assert_eq!(validate_sort_field("created_at;DROP TABLE x"), None);
        assert_eq!(validate_sort_field(""), None);
    }

    #[test]
    fn test_includes_without_allow_set_only_check_syntax() {
        let includes = vec![
            "author".to_string(),
            "comments.user".to_string(),
            "bad include".to_string(),
            String::new(),
        ];
        assert_eq!(filter_includes(None, &includes), vec!["author", "comments.user"]);
    }

    #[test]
    fn test_includes_with_allow_set() {
        let allowed: HashSet<String> = ["author".to_string(), "tags".to_string()].into();
        let includes = vec![
            "tags".to_string(),
            "comments".to_string(),
            "author".to_string(),
            "author;--".to_string(),
        ];
        assert_eq!(filter_includes(Some(&allowed), &includes), vec!["tags", "author"]);
    }
}
