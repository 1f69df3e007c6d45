use thiserror::Error;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Errors surfaced by the registration workflow.
///
/// Validation errors are resolved where they are detected and never touch the
/// roster message.  Transport failures are terminal for the single operation
/// that raised them.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The organizer's authoring markup could not be parsed.
    #[error("Malformed event template: {0}")]
    MalformedEventTemplate(String),
    /// The attendee's registration body had the wrong shape.
    #[error("{0}")]
    InvalidSubmission(String),
    /// The roster has been finished and no longer accepts changes.
    #[error("Registration closed")]
    EventClosed,
    /// A callback payload was neither a coordinate nor the finish tag.
    #[error("Unrecognized control payload `{0}`")]
    InvalidPayload(String),
    /// The roster message could not be found at the transport.
    #[error("Roster message no longer exists")]
    MissingMessage,
    /// The chat transport call failed.
    #[error("Chat transport failure: {0}")]
    TransportFailure(Err),
}

impl WorkflowError {
    /// Wraps a transport error.
    pub fn transport(err: Err) -> Self {
        Self::TransportFailure(err)
    }
}

pub type WorkflowRes<T> = Result<T, WorkflowError>;
