use thiserror::Error;

/// Errors produced when parsing shared domain types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// A string did not match any variant of a closed enum.
    #[error("Invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },
}

impl SharedError {
    pub fn invalid(kind: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            kind,
            value: value.to_string(),
        }
    }
}
