use std::fmt;

use crate::ids::RequestId;
use crate::router::BuildError;

/// Failure of a context accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// No request context is active on this coroutine or thread
    OutsideRequestContext,
    /// The application has no secret key, so there is no session
    SessionUnavailable,
    /// The context being torn down is not the top of the stack
    StackMismatch {
        expected: RequestId,
        found: Option<RequestId>,
    },
    /// `url_for` could not build a URL
    Build(BuildError),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::OutsideRequestContext => write!(f, "working outside of request context"),
            ContextError::SessionUnavailable => {
                write!(f, "session is unavailable because no secret key was set")
            }
            ContextError::StackMismatch { expected, found } => match found {
                Some(found) => write!(f, "popped wrong request context: expected {expected}, found {found}"),
                None => write!(f, "popped request context {expected} from an empty stack"),
            },
            ContextError::Build(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContextError::Build(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BuildError> for ContextError {
    fn from(err: BuildError) -> Self {
        ContextError::Build(err)
    }
}
