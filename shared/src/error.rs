use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UserInput,
    Authentication,
    TokenExpired,
    RefreshFailed,
    SdkLocked,
    Network,
    Server,
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UserInput => "USER_INPUT_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::SdkLocked => "SDK_LOCKED",
            Self::Network => "NETWORK_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::Storage => "STORAGE_ERROR",
        }
    }

    /// Token expiry is healed by the refresh protocol; everything else reaches the user.
    #[must_use]
    pub const fn is_recovered_locally(self) -> bool {
        matches!(self, Self::TokenExpired)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::UserInput | ErrorKind::Authentication => self.message.clone(),
            ErrorKind::TokenExpired | ErrorKind::RefreshFailed => {
                "Your session could not be renewed. Please sign in again.".into()
            }
            ErrorKind::SdkLocked => {
                "This device does not support motion tracking, which is required to record visits."
                    .into()
            }
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Server => "Something went wrong on our side. Please try again.".into(),
            ErrorKind::Storage => "Unable to restore your previous session.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Please enter your email")]
    MissingEmail,
    #[error("Please enter your password")]
    MissingPassword,
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::new(ErrorKind::UserInput, e.to_string())
    }
}

/// Failure reported by the credential provider.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SignInError {
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("This account has not been confirmed yet")]
    UserNotConfirmed,
    #[error("Sign in failed: {0}")]
    Other(String),
}

impl From<SignInError> for AppError {
    fn from(e: SignInError) -> Self {
        Self::new(ErrorKind::Authentication, e.to_string())
    }
}

/// Error of every authenticated REST call. `TokenExpired` is the only variant
/// that the request engine reacts to beyond dropping the request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("token expired")]
    TokenExpired,
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decoding(String),
}

impl ApiError {
    #[must_use]
    pub const fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::TokenExpired,
            _ => Self::Server {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        let kind = match &e {
            ApiError::TokenExpired => ErrorKind::TokenExpired,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Server { .. } | ApiError::Decoding(_) => ErrorKind::Server,
        };
        Self::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SnapshotError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("snapshot could not be decoded: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<SnapshotError> for AppError {
    fn from(e: SnapshotError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
