//! Walking an organizer through an event draft one field at a time.
//!
//! A draft is a bot message whose text is the authoring markup and whose
//! controls are one edit button per field plus a publish button.  Pressing an
//! edit button records which field the next threaded reply to the draft sets.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::{
    base::{
        event::{self, EventField, EventMetadata},
        grid::{Cell, ControlGrid},
        messages::{PUBLISH_LABEL, PUBLISH_PAYLOAD, TEMPLATE_INSTRUCTIONS},
        types::{WorkflowError, WorkflowRes},
    },
    service::chat::{ChatMessage, MessageRef, OutgoingMessage},
};

use super::registration::{CreatedEvent, RegistrationWorkflow};

// Tracker.

/// Pending field edits of one chat, keyed by draft message id.
pub type DialogSession = HashMap<String, EventField>;

/// Which draft field each chat is currently being asked for.
///
/// Sessions are created on first use, and each chat's session has its own
/// lock, so dialogs in different chats never wait on each other.
#[derive(Clone, Default)]
pub struct FieldDialogTracker {
    sessions: Arc<Mutex<HashMap<String, Arc<Mutex<DialogSession>>>>>,
}

impl FieldDialogTracker {
    /// Gets the session of a chat, creating an empty one if there is none.
    pub async fn get_or_create(&self, chat_id: &str) -> Arc<Mutex<DialogSession>> {
        self.sessions.lock().await.entry(chat_id.to_string()).or_default().clone()
    }

    /// Records that the next reply to `message_id` sets `field`.  Replaces any
    /// field already pending for that message.
    pub async fn begin_edit(&self, chat_id: &str, message_id: &str, field: EventField) {
        let session = self.get_or_create(chat_id).await;
        session.lock().await.insert(message_id.to_string(), field);
    }

    /// Takes the field pending for `message_id`, if any.
    pub async fn consume_edit(&self, chat_id: &str, message_id: &str) -> Option<EventField> {
        let session = self.get_or_create(chat_id).await;
        session.lock().await.remove(message_id)
    }

    /// Drops everything pending for a draft.
    pub async fn forget(&self, chat_id: &str, message_id: &str) {
        self.consume_edit(chat_id, message_id).await;
    }
}

// Rendering.

/// Text sent in reply to the template command.
pub fn template_text() -> String {
    format!("{TEMPLATE_INSTRUCTIONS}\n{}", event::render_fenced_template())
}

/// Controls of a draft: one edit button per field, then the publish button.
pub fn draft_grid() -> ControlGrid {
    let mut rows: Vec<Vec<Cell>> = EventField::ALL.iter().map(|f| vec![Cell::new(f.edit_label(), f.edit_payload())]).collect();
    rows.push(vec![Cell::new(PUBLISH_LABEL, PUBLISH_PAYLOAD)]);

    ControlGrid::new(rows)
}

// Workflow steps.

impl RegistrationWorkflow {
    /// Posts an empty draft to `chat_id`.
    #[instrument(skip(self))]
    pub async fn open_draft(&self, chat_id: &str) -> WorkflowRes<MessageRef> {
        let draft = OutgoingMessage::new(chat_id, EventMetadata::default().render_markup()).with_grid(draft_grid());

        self.chat.send_message(&draft).await.map_err(WorkflowError::transport)
    }

    /// Starts editing `field` of the draft at `draft` and asks for its value.
    #[instrument(skip(self))]
    pub async fn begin_field_edit(&self, draft: &MessageRef, field: EventField) -> WorkflowRes<()> {
        self.dialogs.begin_edit(&draft.chat_id, &draft.message_id, field).await;

        let prompt = OutgoingMessage::reply(draft, format!("Reply in this thread with the {} ({}).", field.label(), field.description()));
        self.chat.send_message(&prompt).await.map_err(WorkflowError::transport)?;

        Ok(())
    }

    /// Applies a threaded reply to the draft it answers.
    ///
    /// Returns `false` when no edit was pending for that thread, in which case
    /// the reply is ordinary chat traffic.
    #[instrument(skip(self, value))]
    pub async fn apply_field_reply(&self, chat_id: &str, thread_id: &str, value: &str) -> WorkflowRes<bool> {
        let Some(field) = self.dialogs.consume_edit(chat_id, thread_id).await else {
            return Ok(false);
        };

        let reference = MessageRef::new(chat_id, thread_id);
        let draft = self.chat.get_message(&reference).await.map_err(WorkflowError::transport)?.ok_or(WorkflowError::MissingMessage)?;

        let mut metadata = EventMetadata::parse_markup(&draft.text)?;
        metadata.set(field, value.split_whitespace().collect::<Vec<_>>().join(" "));

        let updated = ChatMessage {
            reference,
            text: metadata.render_markup(),
            grid: draft_grid(),
        };

        self.chat.edit_message(&updated).await.map_err(WorkflowError::transport)?;

        info!("Set draft field `{}`.", field.markup_key());

        Ok(true)
    }

    /// Creates the event described by a draft, then deletes the draft.
    ///
    /// Every required field must have a value.
    #[instrument(skip(self))]
    pub async fn publish_draft(&self, draft: &MessageRef) -> WorkflowRes<CreatedEvent> {
        let current = self.chat.get_message(draft).await.map_err(WorkflowError::transport)?.ok_or(WorkflowError::MissingMessage)?;

        let metadata = EventMetadata::parse_markup(&current.text)?;

        if let Some(empty) = EventField::ALL.into_iter().find(|f| f.is_required() && metadata.get(*f).trim().is_empty()) {
            let hint = OutgoingMessage::reply(draft, format!("Set the {} before creating the link.", empty.label()));
            self.chat.send_message(&hint).await.map_err(WorkflowError::transport)?;

            return Err(WorkflowError::MalformedEventTemplate(format!("`{}` has no value", empty.markup_key())));
        }

        let created = self.create_event(&draft.chat_id, &current.text).await?;

        self.dialogs.forget(&draft.chat_id, &draft.message_id).await;
        self.chat.delete_message(draft).await.map_err(WorkflowError::transport)?;

        Ok(created)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consuming_an_unknown_chat_is_not_an_error() {
        let tracker = FieldDialogTracker::default();

        assert_eq!(tracker.consume_edit("C-never-seen", "1").await, None);
    }

    #[tokio::test]
    async fn last_writer_wins_and_consume_removes() {
        let tracker = FieldDialogTracker::default();

        tracker.begin_edit("C1", "10.1", EventField::Title).await;
        tracker.begin_edit("C1", "10.1", EventField::Address).await;
        tracker.begin_edit("C1", "11.1", EventField::Period).await;
        tracker.begin_edit("C2", "10.1", EventField::EventDate).await;

        assert_eq!(tracker.consume_edit("C1", "10.1").await, Some(EventField::Address));
        assert_eq!(tracker.consume_edit("C1", "10.1").await, None);
        assert_eq!(tracker.consume_edit("C1", "11.1").await, Some(EventField::Period));
        assert_eq!(tracker.consume_edit("C2", "10.1").await, Some(EventField::EventDate));
    }

    #[tokio::test]
    async fn concurrent_chats_do_not_interfere() {
        let tracker = FieldDialogTracker::default();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.begin_edit(&format!("C{i}"), "1", EventField::Title).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        for i in 0..32 {
            assert_eq!(tracker.consume_edit(&format!("C{i}"), "1").await, Some(EventField::Title));
        }
    }

    #[test]
    fn draft_grid_has_an_edit_button_per_field() {
        let grid = draft_grid();

        assert_eq!(grid.rows.len(), EventField::ALL.len() + 1);
        assert_eq!(grid.rows[0], vec![Cell::new("Edit Title", "edit:Title")]);
        assert_eq!(grid.rows.last().unwrap(), &vec![Cell::new(PUBLISH_LABEL, PUBLISH_PAYLOAD)]);
    }

    #[test]
    fn template_text_is_fenced() {
        let text = template_text();

        assert!(text.starts_with(TEMPLATE_INSTRUCTIONS));
        assert!(text.contains("```\nnewEvent:\nTitle: \"Event title\""));
        assert!(text.ends_with("\"\n```"));
    }
}
