use thiserror::Error;

/// A single structured validation failure, carrying the dotted field path
/// so an operator can find the offending key without re-reading the whole
/// document (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse configuration document: {0}")]
    Parse(String),

    #[error("configuration validation failed: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("could not render collector configuration: {0}")]
    Render(String),

    #[error("could not read configuration file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] fs::file::writer::WriteError),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn validation(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}
