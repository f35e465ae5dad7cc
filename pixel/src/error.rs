use thiserror::Error;

use crate::span::Location;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error at {location}: {message}")]
    LexicalError { location: Location, message: String },

    #[error("Syntax error at {location}: {message}")]
    SyntaxError { location: Location, message: String },

    #[error("Resolution error at {location}: {message}")]
    ResolutionError { location: Location, message: String },

    /// Raised for AST shapes the generator has no lowering for. The parser
    /// never produces them.
    #[error("Codegen error at {location}: {message}")]
    CodegenError { location: Location, message: String },

    #[error("Backend error: {message}")]
    BackendError { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn lexical(location: Location, message: impl Into<String>) -> Self {
        Self::LexicalError { location, message: message.into() }
    }

    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Self::SyntaxError { location, message: message.into() }
    }

    pub fn resolution(location: Location, message: impl Into<String>) -> Self {
        Self::ResolutionError { location, message: message.into() }
    }

    pub fn codegen(location: Location, message: impl Into<String>) -> Self {
        Self::CodegenError { location, message: message.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Source position the error points at, if it came from the front-end.
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::LexicalError { location, .. }
            | Self::SyntaxError { location, .. }
            | Self::ResolutionError { location, .. }
            | Self::CodegenError { location, .. } => Some(*location),
            Self::BackendError { .. } | Self::IoError { .. } => None,
        }
    }
}
