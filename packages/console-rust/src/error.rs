use golemdb_core::{DefinitionError, InsertConflict};

/// Errors returned by console operations.
///
/// None of these are fatal; callers render the message and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("{0} is required")]
    MissingInput(&'static str),
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    #[error(transparent)]
    InvalidSchema(#[from] DefinitionError),
    #[error("payload does not match schema: {}", .errors.join("; "))]
    InvalidPayload { errors: Vec<String> },
    #[error(transparent)]
    Conflict(#[from] InsertConflict),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            ConsoleError::MissingInput("collection name").to_string(),
            "collection name is required"
        );
        assert_eq!(
            ConsoleError::InvalidPayload {
                errors: vec!["missing required: a".into(), "b: not a number".into()]
            }
            .to_string(),
            "payload does not match schema: missing required: a; b: not a number"
        );
        let conflict = InsertConflict::MissingPrimaryKey { field: "id".into() };
        assert_eq!(
            ConsoleError::from(conflict).to_string(),
            "Primary key \"id\" is required"
        );
        assert_eq!(
            ConsoleError::from(anyhow::anyhow!("rpc down")).to_string(),
            "rpc down"
        );
    }
}
