//! Error types for the protocol layer.
//!
//! Each crate in Colony defines its own error enum. When you see a
//! `ProtocolError`, the problem is in what a client sent (or in a variant
//! of the protocol we do not understand yet), not in networking or room
//! bookkeeping.

/// Errors that can occur while decoding or interpreting a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a well-formed tree.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A required child element is absent.
    #[error("missing element <{0}>")]
    MissingElement(String),

    /// A required attribute is absent.
    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: String,
    },

    /// A value is present but cannot be interpreted.
    #[error("invalid value for '{field}': {value:?}")]
    InvalidValue { field: String, value: String },

    /// No handler exists for this action code.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// A user variable outside the recognized set.
    #[error("unknown user variable '{0}'")]
    UnknownVariable(String),

    /// A sub-protocol variant the server does not implement yet.
    ///
    /// Kept separate from the other variants so that new client behaviour
    /// is easy to spot during development.
    #[error("unknown case '{0}'")]
    UnknownCase(String),

    /// The action is not allowed in the session's current state.
    #[error("action '{action}' not permitted in state {state}")]
    NotPermitted { action: String, state: String },
}

impl ProtocolError {
    /// Returns `true` for the "unimplemented variant" marker.
    pub fn is_unknown_case(&self) -> bool {
        matches!(self, Self::UnknownCase(_))
    }

    pub(crate) fn invalid(field: &str, value: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}
