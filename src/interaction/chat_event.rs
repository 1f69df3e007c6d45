//! Routes chat events from the transport into the workflow.

use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        messages::NEW_EVENT_PREFIX,
        types::{Void, WorkflowError},
    },
    service::chat::{MessageRef, OutgoingMessage},
};

use super::registration::RegistrationWorkflow;

/// An event the transport hands to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A plain text message from a person.
    Message {
        chat_id: String,
        message_id: String,
        /// Id of the thread root, if the message is a threaded reply.
        thread_id: Option<String>,
        text: String,
    },
    /// A control below `message` was pressed.
    Control { payload: String, message: MessageRef },
    /// The organizer asked for a new event draft.
    OpenDraft { chat_id: String },
}

/// Handles a chat event.
///
/// Spawns a new task for the event, so the transport can acknowledge it right
/// away.  Failures are logged.
#[instrument(skip_all)]
pub fn handle_chat_event(event: ChatEvent, workflow: RegistrationWorkflow) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_chat_event_internal(event, &workflow).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

/// Processes a chat event to completion.
#[instrument(skip_all)]
pub async fn handle_chat_event_internal(event: ChatEvent, workflow: &RegistrationWorkflow) -> Void {
    match event {
        ChatEvent::Message { chat_id, message_id, text, .. } if is_event_markup(&text) => {
            info!("Creating event ...");

            match workflow.create_event(&chat_id, &text).await {
                Ok(created) => info!("Event link: {}", created.link.url),
                Err(WorkflowError::MalformedEventTemplate(reason)) => {
                    warn!("Rejected event template: {}", reason);

                    let reply = OutgoingMessage::reply(&MessageRef::new(chat_id, message_id), format!("Could not read the event: {reason}.\nSend `/template` for a fresh template."));
                    workflow.chat.send_message(&reply).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        ChatEvent::Message {
            chat_id,
            thread_id: Some(thread_id),
            text,
            ..
        } => {
            if !workflow.apply_field_reply(&chat_id, &thread_id, &text).await? {
                info!("Ignoring threaded message without a pending edit.");
            }
        }
        ChatEvent::Message { .. } => {}
        ChatEvent::Control { payload, message } => match workflow.handle_control(&payload, &message).await {
            Ok(()) => {}
            Err(WorkflowError::EventClosed) => warn!("Ignoring control press on a finished roster."),
            Err(err) => return Err(err.into()),
        },
        ChatEvent::OpenDraft { chat_id } => {
            let draft = workflow.open_draft(&chat_id).await?;
            info!("Opened draft {}.", draft.message_id);
        }
    }

    Ok(())
}

/// Whether a message is an event template, fenced or not.
fn is_event_markup(text: &str) -> bool {
    let text = text.trim_start();
    let body = text.strip_prefix("```").map(|rest| rest.strip_prefix("yaml").unwrap_or(rest)).unwrap_or(text);

    body.trim_start().starts_with(NEW_EVENT_PREFIX)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_fenced_and_bare_templates() {
        assert!(is_event_markup("newEvent:\nTitle: x"));
        assert!(is_event_markup("```\nnewEvent:\nTitle: x\n```"));
        assert!(is_event_markup("```yaml\nnewEvent:\nTitle: x\n```"));
        assert!(!is_event_markup("```rust\nnewEvent:"));
        assert!(!is_event_markup("hello newEvent:"));
    }
}
