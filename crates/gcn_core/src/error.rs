//! Error types for gcn_core operations.

use serde_json::Value;
use thiserror::Error;

/// Core error type for CMS client operations.
///
/// Every variant carries a stable wire `code()` so that errors published on
/// the `error-encountered` channel can be matched the same way regardless of
/// whether they originated in the backend or in the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcnError {
    /// The transport failed or returned something that is not a CMS envelope.
    #[error("HTTP_ERROR: {message}")]
    Http {
        /// Description of the transport failure
        message: String,
        /// HTTP status, when one was received
        status: Option<u16>,
    },

    /// The backend answered with a non-OK `responseInfo.responseCode`.
    #[error("{code}: {message}")]
    Server {
        /// The backend response code, passed through verbatim
        code: String,
        /// The backend response message
        message: String,
        /// The full response body
        data: Option<Value>,
    },

    /// `authenticate()` was called but nobody listens for `authentication-required`.
    #[error("NO_AUTH_HANDLER: no handler is subscribed to authentication-required")]
    NoAuthHandler,

    /// An operation that needs a session was attempted without one.
    #[error("NO_SESSION: no session id is set")]
    NoSession,

    /// The object cannot be localized in the requested channel.
    #[error("CANNOT_LOCALIZE: {message}")]
    CannotLocalize {
        /// Why localization was refused
        message: String,
    },

    /// The object cannot be unlocalized. The wire code keeps its historical spelling.
    #[error("CANNONT_UNLOCALIZE: {message}")]
    CannotUnlocalize {
        /// Why unlocalization was refused
        message: String,
    },

    /// Argument overload resolution found an argument it could not place.
    #[error("UNKNOWN_ARGUMENT: {message}")]
    UnknownArgument {
        /// Which argument was rejected
        message: String,
    },

    /// A pub/sub subscriber failed while handling a publication.
    #[error("PUBSUB_HANDLER_FAILED: handler for '{channel}' failed: {message}")]
    PubsubHandlerFailed {
        /// Channel the failing handler was subscribed to
        channel: String,
        /// The handler's own error
        message: String,
    },

    /// Login, SSO or re-authentication did not succeed.
    #[error("AUTHENTICATION_FAILED: {message}")]
    AuthenticationFailed {
        /// Description of the failure
        message: String,
    },

    /// Attempt to write an attribute the backend owns.
    #[error("READONLY_ATTRIBUTE: attribute '{attribute}' of {kind} is read-only")]
    ReadonlyAttribute {
        /// Object type name
        kind: String,
        /// The rejected attribute
        attribute: String,
    },

    /// A handle outlived the client context it was created by.
    #[error("CONTEXT_DROPPED: the client context has been dropped")]
    ContextDropped,

    /// Configuration error (loading, parsing, invalid values).
    #[error("CONFIG_ERROR: {0}")]
    Config(String),

    /// JSON (de)serialization failed.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),
}

impl GcnError {
    /// Returns the stable error code used on the event bus and in logs.
    pub fn code(&self) -> &str {
        match self {
            Self::Http { .. } => "HTTP_ERROR",
            Self::Server { code, .. } => code,
            Self::NoAuthHandler => "NO_AUTH_HANDLER",
            Self::NoSession => "NO_SESSION",
            Self::CannotLocalize { .. } => "CANNOT_LOCALIZE",
            Self::CannotUnlocalize { .. } => "CANNONT_UNLOCALIZE",
            Self::UnknownArgument { .. } => "UNKNOWN_ARGUMENT",
            Self::PubsubHandlerFailed { .. } => "PUBSUB_HANDLER_FAILED",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::ReadonlyAttribute { .. } => "READONLY_ATTRIBUTE",
            Self::ContextDropped => "CONTEXT_DROPPED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns the human-readable part of the error, without the code.
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. }
            | Self::Server { message, .. }
            | Self::CannotLocalize { message }
            | Self::CannotUnlocalize { message }
            | Self::UnknownArgument { message }
            | Self::AuthenticationFailed { message } => message.clone(),
            Self::PubsubHandlerFailed { channel, message } => {
                format!("handler for '{}' failed: {}", channel, message)
            }
            Self::ReadonlyAttribute { kind, attribute } => {
                format!("attribute '{}' of {} is read-only", attribute, kind)
            }
            Self::Config(message) | Self::Serialization(message) => message.clone(),
            Self::NoAuthHandler => "no handler is subscribed to authentication-required".into(),
            Self::NoSession => "no session id is set".into(),
            Self::ContextDropped => "the client context has been dropped".into(),
        }
    }

    /// Returns the payload attached to the error, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Server { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// True for backend "object not found" responses.
    pub fn is_not_found(&self) -> bool {
        self.code() == "NOTFOUND"
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoSession => Some("Log in first with 'gcn login <user> <password>'."),
            Self::NoAuthHandler => {
                Some("Subscribe to 'session.authentication-required' before issuing requests.")
            }
            Self::AuthenticationFailed { .. } => Some("Check the credentials and try again."),
            Self::Http { .. } => Some("Check that backend.base_url in gcn.toml is reachable."),
            Self::CannotLocalize { .. } => {
                Some("Only objects inherited into the channel can be localized.")
            }
            Self::CannotUnlocalize { .. } => {
                Some("Only channel-local copies can be unlocalized.")
            }
            Self::Config(_) => Some("Run 'gcn config init' to write a default gcn.toml."),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GcnError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// What a per-call error callback decided to do with an error.
///
/// `Handled` keeps the error off the global `error-encountered` channel;
/// `Propagate` re-raises it there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFlow {
    /// The caller fully handled the error.
    Handled,
    /// The error should still be published globally.
    Propagate,
}

/// Convenience Result type for gcn_core operations.
pub type Result<T> = std::result::Result<T, GcnError>;
