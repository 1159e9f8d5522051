use super::BoxError;
use crate::jobs::job::Record;
use std::fmt;

#[derive(Debug)]
pub struct ParseError {
    source: BoxError,
}

impl ParseError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse JSON: {}", self.source)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Decodes a fetched payload into a [`Record`].
pub trait RecordParser: Send + Sync {
    fn parse(&self, payload: &[u8]) -> Result<Record, ParseError>;
}

/// Parses `{"id": .., "title": .., "completed": ..}` documents; unknown fields are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTodoParser;

impl RecordParser for JsonTodoParser {
    fn parse(&self, payload: &[u8]) -> Result<Record, ParseError> {
        serde_json::from_slice(payload).map_err(ParseError::new)
    }
}
