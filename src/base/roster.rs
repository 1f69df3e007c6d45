//! The roster as it lives in the body of a chat message.
//!
//! There is no datastore behind a roster: every mutation is a pure function
//! from the previous message text to the next one.  Lines that are not
//! touched by an operation are carried over verbatim.

use std::fmt;

use super::messages::{ABSENT_LABEL, FINISH_TAG, LINK_PREFIX, PARTICIPANTS_HEADER, PRESENT_LABEL};

// Types.

/// Attendance status of a single roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Unmarked,
}

impl AttendanceStatus {
    /// Marker that prefixes the entry line.
    pub fn marker(self) -> char {
        match self {
            AttendanceStatus::Present => '+',
            AttendanceStatus::Absent => '-',
            AttendanceStatus::Unmarked => '?',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '+' => Some(AttendanceStatus::Present),
            '-' => Some(AttendanceStatus::Absent),
            '?' => Some(AttendanceStatus::Unmarked),
            _ => None,
        }
    }

    /// Label of the toggle cell showing this status.  Unmarked entries show as absent.
    pub fn toggle_label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => PRESENT_LABEL,
            AttendanceStatus::Absent | AttendanceStatus::Unmarked => ABSENT_LABEL,
        }
    }

    /// The status a toggle cell label stands for, if it is a toggle label at all.
    pub fn from_toggle_label(label: &str) -> Option<Self> {
        match label {
            PRESENT_LABEL => Some(AttendanceStatus::Present),
            ABSENT_LABEL => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

/// One attendee line of the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub status: AttendanceStatus,
    pub label: String,
}

impl RosterEntry {
    pub fn new(status: AttendanceStatus, label: impl Into<String>) -> Self {
        Self { status, label: label.into() }
    }

    /// Parses a `<marker> | <label>` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut chars = line.chars();
        let status = AttendanceStatus::from_marker(chars.next()?)?;
        let label = chars.as_str().strip_prefix(" | ")?;

        Some(Self::new(status, label))
    }
}

impl fmt::Display for RosterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.status.marker(), self.label)
    }
}

// Text operations.

/// Builds the text of a freshly created roster.
pub fn render_header(summary: &str, link: &str) -> String {
    format!("{summary}\n{LINK_PREFIX} {link}\n{PARTICIPANTS_HEADER}")
}

/// Appends one entry line, leaving every prior line untouched.
pub fn append_entry(text: &str, entry: &RosterEntry) -> String {
    if text.is_empty() {
        entry.to_string()
    } else {
        format!("{text}\n{entry}")
    }
}

/// Removes the line carrying the registration link.
pub fn strip_link_line(text: &str) -> String {
    text.lines().filter(|l| !is_link_line(l)).collect::<Vec<_>>().join("\n")
}

/// Whether the roster carries the finish marker line.
pub fn is_finished(text: &str) -> bool {
    text.lines().any(|l| l.trim() == FINISH_TAG)
}

/// Locks the roster: prepends the finish marker and drops the link line.
pub fn finish(text: &str) -> String {
    if is_finished(text) {
        return text.to_string();
    }

    format!("{FINISH_TAG}\n{}", strip_link_line(text))
}

/// All entries of the roster, in submission order.
pub fn entries(text: &str) -> Vec<RosterEntry> {
    entry_lines(text).filter_map(|(_, l)| RosterEntry::parse(l)).collect()
}

/// Rewrites the status marker of the entry at `index`.
///
/// Returns `None` if the roster has no such entry.
pub fn set_entry_status(text: &str, index: usize, status: AttendanceStatus) -> Option<String> {
    let (line_index, line) = entry_lines(text).filter(|(_, l)| RosterEntry::parse(l).is_some()).nth(index)?;
    let mut entry = RosterEntry::parse(line)?;
    entry.status = status;

    let replaced = entry.to_string();
    let lines: Vec<&str> = text.lines().enumerate().map(|(i, l)| if i == line_index { replaced.as_str() } else { l }).collect();

    Some(lines.join("\n"))
}

fn is_link_line(line: &str) -> bool {
    line.trim_start().starts_with(LINK_PREFIX)
}

/// Lines that may hold entries: those after the participants header, or all
/// lines when the header is missing.
fn entry_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let start = text.lines().position(|l| l.trim() == PARTICIPANTS_HEADER).map(|p| p + 1).unwrap_or(0);

    text.lines().enumerate().skip(start)
}

// Structured view.

/// A parsed roster.  `to_string` reproduces the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMessage {
    pub finished: bool,
    pub header: Vec<String>,
    pub entries: Vec<RosterEntry>,
}

impl RosterMessage {
    /// Parses roster text.
    ///
    /// Returns `None` if a line after the participants header is not an entry.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines: Vec<&str> = text.lines().collect();

        let finished = lines.first().is_some_and(|l| *l == FINISH_TAG);
        if finished {
            lines.remove(0);
        }

        let split = lines.iter().position(|l| *l == PARTICIPANTS_HEADER).map(|p| p + 1).unwrap_or(lines.len());
        let (header, rest) = lines.split_at(split);

        let entries = rest.iter().map(|l| RosterEntry::parse(l)).collect::<Option<Vec<_>>>()?;

        Some(Self {
            finished,
            header: header.iter().map(|l| l.to_string()).collect(),
            entries,
        })
    }
}

impl fmt::Display for RosterMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let finish = self.finished.then(|| FINISH_TAG.to_string());
        let lines: Vec<String> = finish.into_iter().chain(self.header.iter().cloned()).chain(self.entries.iter().map(|e| e.to_string())).collect();

        write!(f, "{}", lines.join("\n"))
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> String {
        render_header("Title: Demo Day\nAddress: Hall", "https://events.example.com/event?title=Demo%20Day")
    }

    #[test]
    fn appends_preserve_prior_lines_in_order() {
        let names = ["Ann, @ann, 555", "Bob, 777", "Cid, @cid, 123"];
        let mut text = roster();

        for name in names {
            let before = text.clone();
            text = append_entry(&text, &RosterEntry::new(AttendanceStatus::Present, name));
            assert!(text.starts_with(&before));
        }

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[..4], roster().lines().collect::<Vec<_>>()[..]);
        assert_eq!(lines[4..], ["+ | Ann, @ann, 555", "+ | Bob, 777", "+ | Cid, @cid, 123"]);
        assert_eq!(entries(&text).len(), 3);
    }

    #[test]
    fn finish_strips_link_and_keeps_entries() {
        let text = append_entry(&roster(), &RosterEntry::new(AttendanceStatus::Absent, "Bob, 777"));
        assert!(!is_finished(&text));

        let finished = finish(&text);

        assert!(is_finished(&finished));
        assert!(finished.starts_with("#finished\nTitle: Demo Day"));
        assert!(!finished.contains("link:"));
        assert!(finished.ends_with("[Participants]\n- | Bob, 777"));
        assert_eq!(finish(&finished), finished);
    }

    #[test]
    fn strip_link_line_only_touches_the_link() {
        let text = append_entry(&roster(), &RosterEntry::new(AttendanceStatus::Present, "link: not really"));
        let stripped = strip_link_line(&text);

        assert_eq!(stripped, "Title: Demo Day\nAddress: Hall\n[Participants]\n+ | link: not really");
    }

    #[test]
    fn sets_status_of_a_single_entry() {
        let mut text = roster();
        text = append_entry(&text, &RosterEntry::new(AttendanceStatus::Present, "Ann, 1"));
        text = append_entry(&text, &RosterEntry::new(AttendanceStatus::Present, "Bob, 2"));

        let updated = set_entry_status(&text, 1, AttendanceStatus::Absent).unwrap();

        assert!(updated.ends_with("+ | Ann, 1\n- | Bob, 2"));
        assert!(set_entry_status(&text, 2, AttendanceStatus::Absent).is_none());
    }

    #[test]
    fn header_lines_are_never_entries() {
        let text = append_entry(&render_header("Title: + | tricky", "https://x"), &RosterEntry::new(AttendanceStatus::Present, "Ann, 1"));

        assert_eq!(entries(&text), vec![RosterEntry::new(AttendanceStatus::Present, "Ann, 1")]);
    }

    #[test]
    fn parse_round_trips() {
        let mut text = append_entry(&roster(), &RosterEntry::new(AttendanceStatus::Present, "Ann, @ann, 555"));
        text = append_entry(&text, &RosterEntry::new(AttendanceStatus::Unmarked, "Bob, 777"));

        let parsed = RosterMessage::parse(&text).unwrap();
        assert!(!parsed.finished);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.to_string(), text);

        let finished = finish(&text);
        let parsed = RosterMessage::parse(&finished).unwrap();
        assert!(parsed.finished);
        assert_eq!(parsed.to_string(), finished);
    }

    #[test]
    fn parse_rejects_garbage_after_header() {
        let text = format!("{}\nnot an entry", roster());

        assert!(RosterMessage::parse(&text).is_none());
    }

    #[test]
    fn toggle_labels_map_to_statuses() {
        assert_eq!(AttendanceStatus::from_toggle_label(AttendanceStatus::Present.toggle_label()), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::from_toggle_label(AttendanceStatus::Unmarked.toggle_label()), Some(AttendanceStatus::Absent));
        assert_eq!(AttendanceStatus::from_toggle_label("Ann, 1"), None);
    }
}
