use std::fmt;

/// Client-side error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad credentials, or a token the backend did not hand out.
    Auth(String),
    /// Connect failures and timeouts.
    Network(String),
    /// The backend answered with a non-2xx status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, as text (may be empty).
        body: String,
    },
    /// A response body that was not the JSON we expected.
    Parse(String),
    /// The backend reported that an analysis job failed.
    Job(String),
    /// The backend does not know the job id.
    JobNotFound(String),
    /// The polling deadline elapsed before the job settled.
    JobTimeout {
        /// The job being polled.
        job_id: String,
        /// Seconds spent polling.
        waited_secs: u64,
    },
    /// Caller supplied something we cannot act on.
    InvalidInput(String),
    /// Local file access failed.
    Io(String),
    /// Configuration could not be loaded.
    Config(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Http { status, body } => {
                if body.is_empty() {
                    write!(f, "Backend returned HTTP {}", status)
                } else {
                    write!(f, "Backend returned HTTP {}: {}", status, body)
                }
            }
            AppError::Parse(msg) => write!(f, "Malformed response: {}", msg),
            AppError::Job(msg) => write!(f, "Analysis job failed: {}", msg),
            AppError::JobNotFound(job_id) => write!(f, "Analysis job not found: {}", job_id),
            AppError::JobTimeout {
                job_id,
                waited_secs,
            } => write!(
                f,
                "Analysis job {} did not finish within {}s",
                job_id, waited_secs
            ),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    /// Whether this error belongs in front of the user.
    ///
    /// Upload, login and register failures are shown. Errors that can only
    /// come out of the polling loop are logged and reported as a poll outcome
    /// instead.
    pub fn is_user_visible(&self) -> bool {
        match self {
            AppError::Job(_) | AppError::JobNotFound(_) | AppError::JobTimeout { .. } => false,
            AppError::WithContext { source, .. } => source.is_user_visible(),
            _ => true,
        }
    }

    /// Strips any context wrappers and returns the underlying error.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Network(format!("request timed out: {}", err))
        } else if err.is_connect() {
            AppError::Network(format!("connection failed: {}", err))
        } else if err.is_decode() {
            AppError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::from(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_errors_are_not_user_visible() {
        assert!(!AppError::Job("boom".into()).is_user_visible());
        assert!(!AppError::JobNotFound("j1".into()).is_user_visible());
        assert!(!AppError::JobTimeout {
            job_id: "j1".into(),
            waited_secs: 120
        }
        .is_user_visible());
    }

    #[test]
    fn test_primary_path_errors_are_user_visible() {
        assert!(AppError::Auth("invalid credentials".into()).is_user_visible());
        assert!(AppError::Http {
            status: 500,
            body: String::new()
        }
        .is_user_visible());
    }

    #[test]
    fn test_context_chain() {
        let result: Result<(), AppError> = Err(AppError::Http {
            status: 404,
            body: "job_not_found".into(),
        });
        let err = result.context("Polling job j1").unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "Polling job j1: Backend returned HTTP 404: job_not_found"
        );
    }
}
