//! Host surface errors.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid xpath `{xpath}`: {message}")]
    InvalidXPath { xpath: String, message: String },
}

impl SurfaceError {
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        SurfaceError::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    pub fn invalid_xpath(xpath: impl Into<String>, message: impl Into<String>) -> Self {
        SurfaceError::InvalidXPath {
            xpath: xpath.into(),
            message: message.into(),
        }
    }
}
