//! Event metadata, the authoring markup, and the registration link codec.
//!
//! The field set is declared once in [`EventField::ALL`].  The authoring
//! template, the markup parser, the draft edit controls, and the roster header
//! all walk that table, so they cannot drift apart.

use std::fmt::Write as _;

use serde::Deserialize;

use super::{
    messages::{EDIT_LABEL_PREFIX, EDIT_PAYLOAD_PREFIX, NEW_EVENT_PREFIX},
    types::{WorkflowError, WorkflowRes},
};

// Fields.

/// A single organizer-editable event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    Title,
    Description,
    EventDate,
    EventTypeName,
    Period,
    Address,
}

impl EventField {
    /// Every field, in authoring order.
    pub const ALL: [EventField; 6] = [
        EventField::Title,
        EventField::Description,
        EventField::EventDate,
        EventField::EventTypeName,
        EventField::Period,
        EventField::Address,
    ];

    /// Fields in the order they appear in the registration link.
    const QUERY_ORDER: [EventField; 6] = [
        EventField::Title,
        EventField::Description,
        EventField::EventTypeName,
        EventField::Address,
        EventField::Period,
        EventField::EventDate,
    ];

    /// Key used in the authoring markup.
    pub fn markup_key(self) -> &'static str {
        match self {
            EventField::Title => "Title",
            EventField::Description => "Description",
            EventField::EventDate => "EventDate",
            EventField::EventTypeName => "EventTypeName",
            EventField::Period => "Period",
            EventField::Address => "Address",
        }
    }

    /// Key used in the registration link query string.
    pub fn query_key(self) -> &'static str {
        match self {
            EventField::Title => "title",
            EventField::Description => "msg",
            EventField::EventDate => "date",
            EventField::EventTypeName => "eventTypeName",
            EventField::Period => "period",
            EventField::Address => "address",
        }
    }

    /// Short label shown in the roster header and on edit controls.
    pub fn label(self) -> &'static str {
        match self {
            EventField::Title => "Title",
            EventField::Description => "Description",
            EventField::EventDate => "Date",
            EventField::EventTypeName => "Type",
            EventField::Period => "Time",
            EventField::Address => "Address",
        }
    }

    /// Human-readable hint used as the placeholder value in the template.
    pub fn description(self) -> &'static str {
        match self {
            EventField::Title => "Event title",
            EventField::Description => "Short description of the event",
            EventField::EventDate => "Event date",
            EventField::EventTypeName => "Event type",
            EventField::Period => "Time of the event, e.g. 13.00-15.00",
            EventField::Address => "Event address",
        }
    }

    /// Whether the authoring markup must carry this field.
    pub fn is_required(self) -> bool {
        !matches!(self, EventField::Description)
    }

    /// Looks a field up by its markup key.
    pub fn from_markup_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.markup_key() == key)
    }

    /// Payload of the draft control that starts editing this field.
    pub fn edit_payload(self) -> String {
        format!("{EDIT_PAYLOAD_PREFIX}{}", self.markup_key())
    }

    /// Label of the draft control that starts editing this field.
    pub fn edit_label(self) -> String {
        format!("{EDIT_LABEL_PREFIX} {}", self.label())
    }

    /// Parses a draft edit payload back into its field.
    pub fn from_edit_payload(payload: &str) -> Option<Self> {
        payload.strip_prefix(EDIT_PAYLOAD_PREFIX).and_then(Self::from_markup_key)
    }
}

/// Optional markup keys that carry the origin reference.
const CHAT_ID_KEY: &str = "ChatId";
const MESSAGE_ID_KEY: &str = "MessageId";

/// Query keys that carry the origin reference.
const CHAT_ID_QUERY_KEY: &str = "chatId";
const MESSAGE_ID_QUERY_KEY: &str = "messageId";

// Metadata.

/// Everything needed to render a registration form and to find the roster
/// message again.  All values are plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_type_name: String,
    pub period: String,
    pub address: String,
    pub origin_chat_id: String,
    pub origin_message_id: String,
}

impl EventMetadata {
    /// The value of an organizer-editable field.
    pub fn get(&self, field: EventField) -> &str {
        match field {
            EventField::Title => &self.title,
            EventField::Description => &self.description,
            EventField::EventDate => &self.event_date,
            EventField::EventTypeName => &self.event_type_name,
            EventField::Period => &self.period,
            EventField::Address => &self.address,
        }
    }

    /// Replaces the value of an organizer-editable field.
    pub fn set(&mut self, field: EventField, value: impl Into<String>) {
        let slot = match field {
            EventField::Title => &mut self.title,
            EventField::Description => &mut self.description,
            EventField::EventDate => &mut self.event_date,
            EventField::EventTypeName => &mut self.event_type_name,
            EventField::Period => &mut self.period,
            EventField::Address => &mut self.address,
        };

        *slot = value.into();
    }

    /// Returns a copy that points at the given roster message.
    pub fn with_origin(mut self, chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        self.origin_chat_id = chat_id.into();
        self.origin_message_id = message_id.into();
        self
    }

    /// Encodes the metadata as a query string.
    ///
    /// Fields are emitted in a fixed order and every value is percent-escaped.
    pub fn encode_query(&self) -> String {
        EventField::QUERY_ORDER
            .iter()
            .map(|f| (f.query_key(), self.get(*f)))
            .chain([(CHAT_ID_QUERY_KEY, self.origin_chat_id.as_str()), (MESSAGE_ID_QUERY_KEY, self.origin_message_id.as_str())])
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Decodes a registration link query string.
    ///
    /// Accepts both `%20` and form-style `+` for spaces.  Unknown keys are
    /// ignored and missing keys decode as empty values.
    pub fn decode_query(query: &str) -> WorkflowRes<Self> {
        let query: EventQuery = serde_urlencoded::from_str(query).map_err(|e| WorkflowError::MalformedEventTemplate(format!("invalid link query: {e}")))?;

        Ok(query.into())
    }

    /// Parses the organizer's authoring markup.
    ///
    /// The markup starts with `newEvent:` and continues with one `Key: value`
    /// line per field.  Values may be wrapped in double quotes, and the whole
    /// block may be wrapped in a code fence.
    pub fn parse_markup(markup: &str) -> WorkflowRes<Self> {
        let malformed = |msg: String| WorkflowError::MalformedEventTemplate(msg);

        let mut lines = markup.lines().map(strip_fence).filter(|l| !l.is_empty());

        match lines.next() {
            Some(first) if first.starts_with(NEW_EVENT_PREFIX) && first[NEW_EVENT_PREFIX.len()..].trim().is_empty() => {}
            _ => return Err(malformed(format!("the block must start with `{NEW_EVENT_PREFIX}`"))),
        }

        let mut result = Self::default();
        let mut seen = Vec::new();

        for line in lines {
            let (key, value) = line.split_once(':').ok_or_else(|| malformed(format!("expected `Key: value`, found `{line}`")))?;
            let key = key.trim();
            let value = unquote(value.trim()).to_string();

            if seen.contains(&key) {
                return Err(malformed(format!("`{key}` appears more than once")));
            }
            seen.push(key);

            match key {
                CHAT_ID_KEY => result.origin_chat_id = value,
                MESSAGE_ID_KEY => result.origin_message_id = value,
                _ => {
                    let field = EventField::from_markup_key(key).ok_or_else(|| malformed(format!("unknown field `{key}`")))?;
                    result.set(field, value);
                }
            }
        }

        if let Some(missing) = EventField::ALL.into_iter().find(|f| f.is_required() && !seen.contains(&f.markup_key())) {
            return Err(malformed(format!("missing required field `{}`", missing.markup_key())));
        }

        Ok(result)
    }

    /// Renders the metadata as authoring markup that [`EventMetadata::parse_markup`] accepts.
    pub fn render_markup(&self) -> String {
        let mut markup = render_markup_with(|f| self.get(f));

        if !self.origin_chat_id.is_empty() {
            let _ = write!(markup, "\n{CHAT_ID_KEY}: \"{}\"", self.origin_chat_id);
        }

        if !self.origin_message_id.is_empty() {
            let _ = write!(markup, "\n{MESSAGE_ID_KEY}: \"{}\"", self.origin_message_id);
        }

        markup
    }

    /// Human-readable summary used as the roster header.
    pub fn render_summary(&self) -> String {
        EventField::ALL
            .iter()
            .filter(|f| !self.get(**f).is_empty())
            .map(|f| format!("{}: {}", f.label(), self.get(*f)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Renders the empty authoring template, with each field's description as its placeholder value.
pub fn render_template() -> String {
    render_markup_with(EventField::description)
}

/// Renders the authoring template wrapped in a code fence, ready to be sent to a chat.
pub fn render_fenced_template() -> String {
    format!("```\n{}\n```", render_template())
}

fn render_markup_with<'a>(value: impl Fn(EventField) -> &'a str) -> String {
    let mut markup = NEW_EVENT_PREFIX.to_string();

    for field in EventField::ALL {
        let _ = write!(markup, "\n{}: \"{}\"", field.markup_key(), value(field));
    }

    markup
}

/// Removes code fence markers from a markup line.
fn strip_fence(line: &str) -> &str {
    let mut line = line.trim();

    if let Some(rest) = line.strip_prefix("```") {
        line = rest.strip_prefix("yaml").unwrap_or(rest).trim_start();
    }

    if let Some(rest) = line.strip_suffix("```") {
        line = rest.trim_end();
    }

    line
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

// Link query.

/// The query string of a registration link, as the form page receives it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventQuery {
    pub title: String,
    pub msg: String,
    #[serde(rename = "eventTypeName")]
    pub event_type_name: String,
    pub address: String,
    pub period: String,
    pub date: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

impl From<EventQuery> for EventMetadata {
    fn from(query: EventQuery) -> Self {
        Self {
            title: query.title,
            description: query.msg,
            event_date: query.date,
            event_type_name: query.event_type_name,
            period: query.period,
            address: query.address,
            origin_chat_id: query.chat_id,
            origin_message_id: query.message_id,
        }
    }
}

// Links.

/// A shareable registration link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLink {
    pub url: String,
}

impl EventLink {
    /// Builds the link for the given public origin.
    pub fn new(base_server_url: &str, metadata: &EventMetadata) -> Self {
        Self {
            url: format!("{base_server_url}/event?{}", metadata.encode_query()),
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> EventMetadata {
        EventMetadata {
            title: "Demo Day".to_string(),
            description: "Show what you built".to_string(),
            event_date: "12.05.2025".to_string(),
            event_type_name: "Meetup".to_string(),
            period: "13.00-15.00".to_string(),
            address: "Main st. 1".to_string(),
            origin_chat_id: String::new(),
            origin_message_id: String::new(),
        }
    }

    #[test]
    fn markup_round_trips() {
        let event = demo();
        assert_eq!(EventMetadata::parse_markup(&event.render_markup()).unwrap(), event);

        let event = demo().with_origin("C0123", "1717171717.000100");
        assert_eq!(EventMetadata::parse_markup(&event.render_markup()).unwrap(), event);
    }

    #[test]
    fn template_lists_every_field_in_order() {
        let template = render_template();
        let keys: Vec<_> = template.lines().skip(1).map(|l| l.split_once(':').unwrap().0).collect();

        assert!(template.starts_with("newEvent:"));
        assert_eq!(keys, EventField::ALL.iter().map(|f| f.markup_key()).collect::<Vec<_>>());
        assert!(template.contains("Period: \"Time of the event, e.g. 13.00-15.00\""));
    }

    #[test]
    fn filled_template_parses() {
        let markup = render_template();
        let parsed = EventMetadata::parse_markup(&markup).unwrap();

        assert_eq!(parsed.title, "Event title");
        assert_eq!(parsed.address, "Event address");
    }

    #[test]
    fn parses_fenced_markup_without_description() {
        let markup = "```yaml\nnewEvent:\nTitle: Demo Day\nEventDate: \"today\"\nEventTypeName: Meetup\nPeriod: 10-12\nAddress: Hall\n```";
        let parsed = EventMetadata::parse_markup(markup).unwrap();

        assert_eq!(parsed.title, "Demo Day");
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.period, "10-12");
    }

    #[test]
    fn rejects_malformed_markup() {
        let cases = [
            "Title: Demo",
            "newEvent:\nTitle Demo",
            "newEvent:\nTitle: Demo",
            "newEvent:\nTitle: a\nTitle: b\nEventDate: d\nEventTypeName: t\nPeriod: p\nAddress: x",
            "newEvent:\nTitle: a\nColor: red\nEventDate: d\nEventTypeName: t\nPeriod: p\nAddress: x",
        ];

        for case in cases {
            assert!(matches!(EventMetadata::parse_markup(case), Err(WorkflowError::MalformedEventTemplate(_))), "accepted: {case}");
        }
    }

    #[test]
    fn query_escapes_and_round_trips() {
        let event = demo().with_origin("C0123", "1717171717.000100");
        let query = event.encode_query();

        assert!(query.starts_with("title=Demo%20Day&msg=Show%20what%20you%20built&eventTypeName=Meetup"));
        assert!(query.ends_with("chatId=C0123&messageId=1717171717.000100"));
        assert_eq!(EventMetadata::decode_query(&query).unwrap(), event);
    }

    #[test]
    fn query_escapes_reserved_characters() {
        let mut event = demo();
        event.set(EventField::Title, "R&D = fun?");

        let query = event.encode_query();
        assert!(query.contains("title=R%26D%20%3D%20fun%3F&"));
        assert_eq!(EventMetadata::decode_query(&query).unwrap(), event);
    }

    #[test]
    fn query_accepts_form_encoded_spaces() {
        let event = EventMetadata::decode_query("title=Demo+Day&address=Main+st.%201&chatId=C1&utm_source=feed").unwrap();

        assert_eq!(event.title, "Demo Day");
        assert_eq!(event.address, "Main st. 1");
        assert_eq!(event.origin_chat_id, "C1");
        assert_eq!(event.origin_message_id, "");
    }

    #[test]
    fn link_embeds_origin() {
        let link = EventLink::new("https://events.example.com", &demo().with_origin("C1", "42.1"));

        assert!(link.url.starts_with("https://events.example.com/event?title=Demo%20Day"));
        assert!(link.url.contains("&chatId=C1&messageId=42.1"));
    }

    #[test]
    fn summary_skips_empty_fields() {
        let mut event = demo();
        event.set(EventField::Description, "");

        assert_eq!(event.render_summary(), "Title: Demo Day\nDate: 12.05.2025\nType: Meetup\nTime: 13.00-15.00\nAddress: Main st. 1");
    }

    #[test]
    fn edit_payloads_round_trip() {
        for field in EventField::ALL {
            assert_eq!(EventField::from_edit_payload(&field.edit_payload()), Some(field));
        }

        assert_eq!(EventField::from_edit_payload("0-1"), None);
    }
}
