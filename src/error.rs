use thiserror::Error;

/// Request control error types
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Invalid redirect url: {target}")]
    InvalidUrl { target: String },

    #[error("Unknown url parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Tab update failed: {0}")]
    TabUpdate(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl ControlError {
    /// Target url of a failed redirect, if this error carries one.
    pub fn target(&self) -> Option<&str> {
        match self {
            ControlError::InvalidUrl { target } => Some(target),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_matchable() {
        let err = ControlError::InvalidUrl {
            target: "htp:/broken".into(),
        };
        match &err {
            ControlError::InvalidUrl { target } => assert_eq!(target, "htp:/broken"),
            _ => panic!("expected InvalidUrl"),
        }
        assert_eq!(err.target(), Some("htp:/broken"));
    }

    #[test]
    fn test_invalid_url_display_includes_target() {
        let err = ControlError::InvalidUrl {
            target: "nope".into(),
        };
        let display = format!("{}", err);
        assert!(display.contains("nope"), "got: {}", display);
    }

    #[test]
    fn test_unsupported_action_display() {
        let err = ControlError::UnsupportedAction("teleport".into());
        assert_eq!(err.to_string(), "Unsupported action: teleport");
        assert!(err.target().is_none());
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: ControlError = parse.unwrap_err().into();
        assert!(matches!(err, ControlError::JsonError(_)));
    }
}
