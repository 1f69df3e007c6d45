//! The registration workflow.
//!
//! A roster moves from open to finished exactly once, when its finish control
//! is pressed.  The workflow keeps no copy of any roster: every operation reads
//! the live message from the chat transport, computes the next text and grid,
//! and writes them back.  Operations on the same message are serialized by a
//! per-message lock, so edits made by this process never interleave.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        event::{EventField, EventLink, EventMetadata},
        grid::{ControlAction, ControlGrid, TOGGLE_COL},
        messages::{PARTICIPANTS_HEADER, PUBLISH_PAYLOAD, REGISTERED_PREFIX},
        roster::{self, AttendanceStatus, RosterEntry},
        submission::RegistrationSubmission,
        types::{WorkflowError, WorkflowRes},
    },
    service::chat::{ChatClient, ChatMessage, MessageRef, OutgoingMessage},
};

use super::dialog::FieldDialogTracker;

// Locks.

/// Async locks keyed by message, created on first use.
///
/// An entry lives only while some task holds or waits for its lock, so the
/// map stays as small as the number of messages being edited right now.
#[derive(Clone, Default)]
pub struct MessageLocks {
    inner: Arc<StdMutex<HashMap<MessageRef, Arc<Mutex<()>>>>>,
}

/// Exclusive access to one message.  Dropping it releases the lock.
pub struct MessageGuard {
    guard: Option<OwnedMutexGuard<()>>,
    reference: MessageRef,
    locks: MessageLocks,
}

impl MessageLocks {
    /// Waits for exclusive access to a message.
    pub async fn lock(&self, reference: &MessageRef) -> MessageGuard {
        let lock = self.entries().entry(reference.clone()).or_default().clone();

        MessageGuard {
            guard: Some(lock.lock_owned().await),
            reference: reference.clone(),
            locks: self.clone(),
        }
    }

    /// Number of messages with a live lock.
    pub fn count(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<MessageRef, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MessageGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // The map holds one reference; any other belongs to a waiter.
        let mut entries = self.locks.entries();
        if entries.get(&self.reference).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            entries.remove(&self.reference);
        }
    }
}

// Outcomes.

/// Result of creating an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    /// The shareable registration link.
    pub link: EventLink,
    /// The roster message as posted, link included.
    pub roster: ChatMessage,
}

/// Result of an accepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub name: String,
    /// The threaded notice posted for the registration.
    pub notice: MessageRef,
}

// Workflow.

/// Orchestrates event creation, registration, attendance, and finishing.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct RegistrationWorkflow {
    pub config: Config,
    pub chat: ChatClient,
    pub dialogs: FieldDialogTracker,
    pub locks: MessageLocks,
}

impl RegistrationWorkflow {
    pub fn new(config: Config, chat: ChatClient) -> Self {
        Self {
            config,
            chat,
            dialogs: FieldDialogTracker::default(),
            locks: MessageLocks::default(),
        }
    }

    /// Creates an event from the organizer's authoring markup.
    ///
    /// Posts the roster message to `chat_id`, then edits the link into it,
    /// since the link has to name the roster message it points back to.
    /// Malformed markup fails before anything is posted.
    #[instrument(skip(self, markup))]
    pub async fn create_event(&self, chat_id: &str, markup: &str) -> WorkflowRes<CreatedEvent> {
        let metadata = EventMetadata::parse_markup(markup)?;
        let summary = metadata.render_summary();

        let placeholder = OutgoingMessage::new(chat_id, format!("{summary}\n{PARTICIPANTS_HEADER}"));
        let reference = self.chat.send_message(&placeholder).await.map_err(WorkflowError::transport)?;

        let metadata = metadata.with_origin(&reference.chat_id, &reference.message_id);
        let link = EventLink::new(&self.config.base_server_url, &metadata);

        let roster = ChatMessage {
            reference,
            text: roster::render_header(&summary, &link.url),
            grid: ControlGrid::default(),
        };

        self.chat.edit_message(&roster).await.map_err(WorkflowError::transport)?;

        info!("Created event `{}` at {}.", metadata.title, link.url);

        Ok(CreatedEvent { link, roster })
    }

    /// Records an attendee on the roster named by the submission.
    ///
    /// A threaded notice is posted first.  If the roster turns out to be
    /// finished, or the roster edit fails, the notice is deleted again.
    #[instrument(skip_all, fields(chat_id = %submission.chat_id, message_id = %submission.origin_message_id))]
    pub async fn submit_registration(&self, submission: &RegistrationSubmission) -> WorkflowRes<RegistrationOutcome> {
        let reference = MessageRef::new(&submission.chat_id, &submission.origin_message_id);
        let _guard = self.locks.lock(&reference).await;

        let label = submission.display_label();

        let notice = OutgoingMessage::reply(&reference, format!("{REGISTERED_PREFIX} {label}"));
        let notice = self.chat.send_message(&notice).await.map_err(WorkflowError::transport)?;

        let result = self.append_attendee(&reference, label).await;

        if result.is_err() {
            self.discard(&notice).await;
        }

        result?;

        info!("Registered `{}`.", submission.name);

        Ok(RegistrationOutcome {
            name: submission.name.clone(),
            notice,
        })
    }

    /// Flips the toggle at `(row, col)` on the roster grid.
    ///
    /// A flipped present/absent toggle also rewrites that attendee's status
    /// marker in the roster text.  The finish control is attached if missing.
    #[instrument(skip(self))]
    pub async fn toggle_attendance(&self, reference: &MessageRef, row: usize, col: usize) -> WorkflowRes<ChatMessage> {
        let _guard = self.locks.lock(reference).await;

        let current = self.load_open(reference).await?;

        let grid = current.grid.apply_toggle(row, col);
        let mut text = current.text;

        if col == TOGGLE_COL
            && let Some(status) = grid.cell(row, col).and_then(|c| AttendanceStatus::from_toggle_label(&c.label))
        {
            match roster::set_entry_status(&text, row, status) {
                Some(updated) => text = updated,
                None => warn!("Row {} has no roster entry, leaving the text as is.", row),
            }
        }

        let updated = ChatMessage {
            reference: reference.clone(),
            text,
            grid: grid.attach_finish_control(),
        };

        self.chat.edit_message(&updated).await.map_err(WorkflowError::transport)?;

        Ok(updated)
    }

    /// Locks the roster: strips the link line, marks it finished, and removes all controls.
    #[instrument(skip(self))]
    pub async fn finish_event(&self, reference: &MessageRef) -> WorkflowRes<ChatMessage> {
        let _guard = self.locks.lock(reference).await;

        let current = self.load_open(reference).await?;

        let finished = ChatMessage {
            reference: reference.clone(),
            text: roster::finish(&current.text),
            grid: ControlGrid::default(),
        };

        self.chat.edit_message(&finished).await.map_err(WorkflowError::transport)?;

        info!("Finished roster with {} entries.", roster::entries(&finished.text).len());

        Ok(finished)
    }

    /// Dispatches a control press on `reference`.
    ///
    /// Draft controls are routed to the dialog; everything else must be a
    /// grid coordinate or the finish tag.
    #[instrument(skip(self))]
    pub async fn handle_control(&self, payload: &str, reference: &MessageRef) -> WorkflowRes<()> {
        if let Some(field) = EventField::from_edit_payload(payload) {
            return self.begin_field_edit(reference, field).await;
        }

        if payload == PUBLISH_PAYLOAD {
            return self.publish_draft(reference).await.map(|_| ());
        }

        match payload.parse::<ControlAction>()? {
            ControlAction::Toggle { row, col } => self.toggle_attendance(reference, row, col).await.map(|_| ()),
            ControlAction::Finish => self.finish_event(reference).await.map(|_| ()),
        }
    }

    // Helpers.

    /// Appends an attendee entry and row to the live roster.
    async fn append_attendee(&self, reference: &MessageRef, label: String) -> WorkflowRes<()> {
        let current = self.load_open(reference).await?;

        let entry = RosterEntry::new(AttendanceStatus::Present, label);

        let updated = ChatMessage {
            reference: reference.clone(),
            text: roster::append_entry(&current.text, &entry),
            grid: current.grid.push_entry(&entry.label, entry.status).attach_finish_control(),
        };

        self.chat.edit_message(&updated).await.map_err(WorkflowError::transport)
    }

    /// Reads the live roster, rejecting it if it is gone or finished.
    ///
    /// A finished roster that still shows controls has them removed.
    async fn load_open(&self, reference: &MessageRef) -> WorkflowRes<ChatMessage> {
        let current = self.chat.get_message(reference).await.map_err(WorkflowError::transport)?.ok_or(WorkflowError::MissingMessage)?;

        if roster::is_finished(&current.text) {
            if !current.grid.is_empty() {
                let cleared = ChatMessage {
                    grid: ControlGrid::default(),
                    ..current
                };

                if let Err(e) = self.chat.edit_message(&cleared).await {
                    warn!("Failed to clear controls of a finished roster: {}", e);
                }
            }

            return Err(WorkflowError::EventClosed);
        }

        Ok(current)
    }

    /// Deletes a message, logging instead of failing.
    async fn discard(&self, reference: &MessageRef) {
        if let Err(e) = self.chat.delete_message(reference).await {
            warn!("Failed to delete message {}: {}", reference.message_id, e);
        }
    }
}

// Tests.
