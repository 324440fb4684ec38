use crate::application::repos::RepoError;

// Postgres SQLSTATE codes the repositories distinguish.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const CHARACTER_NOT_IN_REPERTOIRE: &str = "22021";
const INTEGRITY_CLASS: &str = "23";
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            classify_sqlstate(&code, db.message(), db.constraint())
        }
        other => RepoError::from_persistence(other),
    }
}

fn classify_sqlstate(code: &str, message: &str, constraint: Option<&str>) -> RepoError {
    match code {
        UNIQUE_VIOLATION => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION | CHARACTER_NOT_IN_REPERTOIRE => {
            RepoError::InvalidInput {
                message: message.to_string(),
            }
        }
        QUERY_CANCELED => RepoError::Timeout,
        code if code.starts_with(INTEGRITY_CLASS) => RepoError::Integrity {
            message: message.to_string(),
        },
        _ => RepoError::from_persistence(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_keeps_constraint_name() {
        match classify_sqlstate(UNIQUE_VIOLATION, "duplicate key", Some("posts_slug_publish_date_key")) {
            RepoError::Duplicate { constraint } => {
                assert_eq!(constraint, "posts_slug_publish_date_key");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn rejected_text_is_invalid_input() {
        for code in [FOREIGN_KEY_VIOLATION, INVALID_TEXT_REPRESENTATION, CHARACTER_NOT_IN_REPERTOIRE] {
            assert!(
                matches!(classify_sqlstate(code, "bad", None), RepoError::InvalidInput { .. }),
                "{code}"
            );
        }
    }

    #[test]
    fn remaining_codes_fall_into_their_class() {
        assert!(matches!(
            classify_sqlstate("23502", "null value", None),
            RepoError::Integrity { .. }
        ));
        assert!(matches!(
            classify_sqlstate(QUERY_CANCELED, "canceling statement", None),
            RepoError::Timeout
        ));
        assert!(matches!(
            classify_sqlstate("42P01", "relation missing", None),
            RepoError::Persistence(_)
        ));
    }
}
