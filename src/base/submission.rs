//! Registration form submissions.

use serde::Deserialize;
use serde_json::error::Category;

use super::types::{WorkflowError, WorkflowRes};

/// One attendee's registration, as posted by the registration form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegistrationSubmission {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub telegram_alias: String,
    pub chat_id: String,
    #[serde(rename = "messageId")]
    pub origin_message_id: String,
}

impl RegistrationSubmission {
    /// Validates a JSON body.
    ///
    /// Unknown fields, missing required fields, and non-string values are all
    /// rejected with a message naming the offending field.
    pub fn from_json(body: &[u8]) -> WorkflowRes<Self> {
        if body.trim_ascii_start().first() != Some(&b'{') {
            return Err(invalid("Bad Request. Expected a JSON object.".to_string()));
        }

        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let submission: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| invalid(format!("Bad Request. {}", describe(e))))?;
        deserializer.end().map_err(|e| invalid(format!("Bad Request. {e}")))?;

        for (field, value) in [("name", &submission.name), ("chatId", &submission.chat_id), ("messageId", &submission.origin_message_id)] {
            if value.trim().is_empty() {
                return Err(invalid(format!("Bad Request. Field {field} must not be empty")));
            }
        }

        Ok(submission)
    }

    /// The attendee as shown on the roster: name, optional `@alias`, and the
    /// phone number with whitespace removed.
    pub fn display_label(&self) -> String {
        let name = single_line(self.name.trim());
        let alias = single_line(self.telegram_alias.trim().trim_start_matches('@'));
        let phone: String = self.phone.chars().filter(|c| !c.is_whitespace()).collect();

        let mut parts = vec![name];

        if !alias.is_empty() {
            parts.push(format!("@{alias}"));
        }

        if !phone.is_empty() {
            parts.push(phone);
        }

        parts.join(", ")
    }
}

fn invalid(message: String) -> WorkflowError {
    WorkflowError::InvalidSubmission(message)
}

/// Names the offending field of a rejected body.
fn describe(err: serde_path_to_error::Error<serde_json::Error>) -> String {
    let path = err.path().to_string();
    let inner = err.into_inner();

    if inner.classify() != Category::Data {
        return inner.to_string();
    }

    let text = inner.to_string();
    let quoted = text.split('`').nth(1);

    match quoted {
        Some(field) if text.starts_with("unknown field") => format!("Unknown field {field}"),
        Some(field) if text.starts_with("missing field") => format!("Missing field {field}"),
        Some(field) if text.starts_with("duplicate field") => format!("Duplicate field {field}"),
        _ if path != "." => format!("Wrong type provided for field {path}"),
        _ => text,
    }
}

/// Roster entries are one line each.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
