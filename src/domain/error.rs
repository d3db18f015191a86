use thiserror::Error;

/// Domain-level errors raised while classifying chunks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Chunk has no routing field: {0}")]
    MissingKeyField(String),

    #[error("Record has {values} values but {headers} headers")]
    RecordShape { headers: usize, values: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        assert_eq!(
            DomainError::MissingKeyField("type".to_string()).to_string(),
            "Chunk has no routing field: type"
        );
        assert_eq!(
            DomainError::RecordShape {
                headers: 3,
                values: 2
            }
            .to_string(),
            "Record has 2 values but 3 headers"
        );
    }

    #[test]
    fn error_comparison_works() {
        assert_eq!(
            DomainError::MissingKeyField("a".to_string()),
            DomainError::MissingKeyField("a".to_string())
        );
        assert_ne!(
            DomainError::MissingKeyField("a".to_string()),
            DomainError::MissingKeyField("b".to_string())
        );
    }
}
