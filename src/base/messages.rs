//! User-facing message text and control labels.

/// Marks a finished roster, both as the first line of the roster text and as
/// the payload of the finish control.
pub const FINISH_TAG: &str = "#finished";

/// Label of the finish control.
pub const FINISH_LABEL: &str = "Finish";

/// Toggle label for an attendee who showed up.
pub const PRESENT_LABEL: &str = "Present";

/// Toggle label for an attendee who did not show up.
pub const ABSENT_LABEL: &str = "Absent";

/// Line that separates the event header from the attendee entries.
pub const PARTICIPANTS_HEADER: &str = "[Participants]";

/// Prefix of the line carrying the registration link.
pub const LINK_PREFIX: &str = "link:";

/// Prefix of an organizer message that creates an event.
pub const NEW_EVENT_PREFIX: &str = "newEvent:";

/// Instructions sent alongside the authoring template.
pub const TEMPLATE_INSTRUCTIONS: &str =
    "Copy the block below, replace the quoted values and send it back as a message. The bot will reply with a registration link you can share.";

/// Shown to the attendee when something unexpected failed.
pub const USER_ERROR: &str = "Something went wrong. We are already looking into it.";

/// Prefix of the threaded notice posted for each registration.
pub const REGISTERED_PREFIX: &str = "Registered:";

/// Payload of the draft control that turns a draft into an event.
pub const PUBLISH_PAYLOAD: &str = "publish";

/// Label of the draft control that turns a draft into an event.
pub const PUBLISH_LABEL: &str = "Create link";

/// Payload prefix of the draft controls that start a field edit.
pub const EDIT_PAYLOAD_PREFIX: &str = "edit:";

/// Label prefix of the draft controls that start a field edit.
pub const EDIT_LABEL_PREFIX: &str = "Edit";
