use axum::http::StatusCode;
use std::path::PathBuf;
use strum_macros::IntoStaticStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrudrouteError>;

/// Faults raised while the process is starting up.
///
/// None of these ever reach a client: they abort the bootstrap before the
/// listening socket is opened.
#[derive(Debug, Error)]
pub enum CrudrouteError {
    #[error("Failed to read unit directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid verb '{verb}' for action '{action}' in controller '{controller}'")]
    InvalidVerb {
        controller: String,
        action: String,
        verb: String,
    },

    #[error("Controller already registered: {0}")]
    DuplicateController(String),

    #[error("Model already registered: {0}")]
    DuplicateModel(String),

    #[error("Unsupported database dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Model setup failed for {model}: {message}")]
    ModelSetup { model: String, message: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures raised on the request path.
///
/// Every variant carries its own status code and message. The defaults come
/// from the named constructors and can be replaced with [`HttpError::with_code`]
/// and [`HttpError::with_message`].
#[derive(Debug, Error, IntoStaticStr)]
pub enum HttpError {
    #[error("{message}")]
    Http { code: StatusCode, message: String },

    #[error("{message}")]
    MethodNotAllowed { code: StatusCode, message: String },

    #[error("{message}")]
    NotFound { code: StatusCode, message: String },

    #[error("{message}")]
    ModelNotDefined { code: StatusCode, message: String },

    #[error("{message}")]
    BadRequest { code: StatusCode, message: String },

    /// Anything unanticipated: persistence failures, association errors.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HttpError {
    pub fn new() -> Self {
        Self::Http {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error".to_string(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::MethodNotAllowed {
            code: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method Not Allowed".to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound {
            code: StatusCode::NOT_FOUND,
            message: "Unknown path".to_string(),
        }
    }

    pub fn model_not_defined() -> Self {
        Self::ModelNotDefined {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Model is not defined for class".to_string(),
        }
    }

    pub fn bad_request() -> Self {
        Self::BadRequest {
            code: StatusCode::BAD_REQUEST,
            message: "Invalid request body".to_string(),
        }
    }

    /// Replace the status code. An internal fault becomes a plain HTTP error
    /// carrying the fault's message.
    pub fn with_code(self, code: StatusCode) -> Self {
        match self {
            Self::Http { message, .. } => Self::Http { code, message },
            Self::MethodNotAllowed { message, .. } => Self::MethodNotAllowed { code, message },
            Self::NotFound { message, .. } => Self::NotFound { code, message },
            Self::ModelNotDefined { message, .. } => Self::ModelNotDefined { code, message },
            Self::BadRequest { message, .. } => Self::BadRequest { code, message },
            Self::Internal(err) => Self::Http {
                code,
                message: err.to_string(),
            },
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            Self::Http { code, .. } => Self::Http { code, message },
            Self::MethodNotAllowed { code, .. } => Self::MethodNotAllowed { code, message },
            Self::NotFound { code, .. } => Self::NotFound { code, message },
            Self::ModelNotDefined { code, .. } => Self::ModelNotDefined { code, message },
            Self::BadRequest { code, .. } => Self::BadRequest { code, message },
            Self::Internal(err) => Self::Internal(err.context(message)),
        }
    }

    /// Name of the error kind, e.g. `NotFound`.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Diagnostic trace included in error bodies.
    ///
    /// Internal faults render their whole cause chain (and the backtrace, when
    /// one was captured).
    pub fn stack(&self) -> String {
        match self {
            Self::Internal(err) => format!("{err:?}"),
            other => format!("{}: {}", other.kind(), other),
        }
    }
}

impl Default for HttpError {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can answer with a status code and a message.
pub trait StatusError: std::error::Error {
    fn status(&self) -> StatusCode;

    fn message(&self) -> String {
        self.to_string()
    }
}

impl StatusError for HttpError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Http { code, .. }
            | Self::MethodNotAllowed { code, .. }
            | Self::NotFound { code, .. }
            | Self::ModelNotDefined { code, .. }
            | Self::BadRequest { code, .. } => *code,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes_and_messages() {
        let cases = [
            (HttpError::new(), 500, "Internal Server Error"),
            (HttpError::method_not_allowed(), 405, "Method Not Allowed"),
            (HttpError::not_found(), 404, "Unknown path"),
            (
                HttpError::model_not_defined(),
                500,
                "Model is not defined for class",
            ),
            (HttpError::bad_request(), 400, "Invalid request body"),
        ];
        for (err, code, message) in cases {
            assert_eq!(err.status().as_u16(), code);
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn test_overrides_keep_kind() {
        let err = HttpError::not_found()
            .with_message("No such widget")
            .with_code(StatusCode::GONE);
        assert!(matches!(err, HttpError::NotFound { .. }));
        assert_eq!(err.status(), StatusCode::GONE);
        assert_eq!(err.message(), "No such widget");
    }

    #[test]
    fn test_internal_fault_is_500() {
        let err: HttpError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "connection reset");
        assert_eq!(err.kind(), "Internal");
    }

    #[test]
    fn test_stack_names_the_kind() {
        assert_eq!(
            HttpError::method_not_allowed().stack(),
            "MethodNotAllowed: Method Not Allowed"
        );

        let err: HttpError = anyhow::anyhow!("disk full").context("insert failed").into();
        let stack = err.stack();
        assert!(stack.contains("insert failed"));
        assert!(stack.contains("disk full"));
    }

    #[test]
    fn test_consumers_only_need_the_capability() {
        fn render(err: &dyn StatusError) -> String {
            format!("{} {}", err.status().as_u16(), err.message())
        }
        assert_eq!(render(&HttpError::not_found()), "404 Unknown path");
    }
}
