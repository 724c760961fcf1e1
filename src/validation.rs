//! Aggregated argument validation errors.
//!
//! Shape validation collects every failing field before reporting, so a
//! caller can fix a request in one round trip.

use serde::Serialize;
use std::fmt;

/// One failing field: dotted path (array indices included) and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// Every field error found while validating one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self(vec![FieldError::new(path, reason)])
    }

    pub fn push(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError::new(path, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Paths of the failing fields, in discovery order.
    pub fn paths(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.path.as_str()).collect()
    }

    /// `Ok(())` when nothing was recorded, the aggregate otherwise.
    pub fn into_result(self) -> crate::types::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::types::Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "Invalid arguments: {}", parts.join(", "))
    }
}

/// Join a parent path and a child segment with `.`.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push("project_id", "Required");
        errors.push("files.0.content", "expected string, got number");

        assert_eq!(
            errors.to_string(),
            "Invalid arguments: project_id: Required, files.0.content: expected string, got number"
        );
        assert_eq!(errors.paths(), vec!["project_id", "files.0.content"]);
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(ValidationErrors::single("a", "b").into_result().is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "files"), "files");
        assert_eq!(join_path("files", "0"), "files.0");
    }
}
