//! The coordinate-addressed attendance control grid.
//!
//! The grid has no identity of its own between calls.  Each operation takes
//! the grid that is currently rendered on the roster message and returns a
//! freshly built one.

use std::{fmt, str::FromStr};

use super::{
    messages::{FINISH_LABEL, FINISH_TAG},
    roster::{AttendanceStatus, RosterEntry},
    types::WorkflowError,
};

// Payloads.

/// What a pressed control asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Flip the cell at the given coordinate.
    Toggle { row: usize, col: usize },
    /// Lock the roster.
    Finish,
}

impl FromStr for ControlAction {
    type Err = WorkflowError;

    /// Parses a `row-col` coordinate or the exact finish tag.
    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        if payload == FINISH_TAG {
            return Ok(ControlAction::Finish);
        }

        let invalid = || WorkflowError::InvalidPayload(payload.to_string());

        let mut parts = payload.split('-');
        let (Some(row), Some(col), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let row = row.parse().map_err(|_| invalid())?;
        let col = col.parse().map_err(|_| invalid())?;

        Ok(ControlAction::Toggle { row, col })
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Toggle { row, col } => write!(f, "{row}-{col}"),
            ControlAction::Finish => write!(f, "{FINISH_TAG}"),
        }
    }
}

// Grid.

/// One interactive cell: what it shows, and what it sends back when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub label: String,
    pub payload: String,
}

impl Cell {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of cells, as rendered below a chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlGrid {
    pub rows: Vec<Vec<Cell>>,
}

/// Column of the name cell in an attendee row.
pub const NAME_COL: usize = 0;
/// Column of the present/absent toggle in an attendee row.
pub const TOGGLE_COL: usize = 1;

impl ControlGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Lays out one row per attendee, each with a name cell and an absent toggle.
    pub fn build_initial<S: AsRef<str>>(labels: &[S]) -> Self {
        labels.iter().fold(Self::default(), |grid, label| grid.push_entry(label.as_ref(), AttendanceStatus::Absent))
    }

    /// Lays out one row per roster entry, with toggles showing each entry's status.
    pub fn from_entries(entries: &[RosterEntry]) -> Self {
        entries.iter().fold(Self::default(), |grid, entry| grid.push_entry(&entry.label, entry.status))
    }

    /// Adds an attendee row after the existing attendee rows.
    ///
    /// The finish control, if any, stays last.
    pub fn push_entry(&self, label: &str, status: AttendanceStatus) -> Self {
        let mut rows = self.rows.clone();
        let index = self.attendee_rows();

        let row = vec![
            Cell::new(label, ControlAction::Toggle { row: index, col: NAME_COL }.to_string()),
            Cell::new(status.toggle_label(), ControlAction::Toggle { row: index, col: TOGGLE_COL }.to_string()),
        ];

        rows.insert(index, row);

        Self { rows }
    }

    /// Rebuilds the grid with the cell at `(row, col)` flipped between the
    /// present and absent labels.
    ///
    /// Every other cell is copied unchanged.  A target that is not a toggle
    /// label, or does not exist, leaves the grid as it was.
    pub fn apply_toggle(&self, row: usize, col: usize) -> Self {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(r, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(c, cell)| if (r, c) == (row, col) { toggled(cell) } else { cell.clone() })
                    .collect()
            })
            .collect();

        Self { rows }
    }

    /// Appends the finish control unless it is already there.
    pub fn attach_finish_control(&self) -> Self {
        if self.has_finish_control() {
            return self.clone();
        }

        let mut rows = self.rows.clone();
        rows.push(vec![Cell::new(FINISH_LABEL, ControlAction::Finish.to_string())]);

        Self { rows }
    }

    pub fn has_finish_control(&self) -> bool {
        self.cells().any(|c| c.payload == FINISH_TAG)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flatten()
    }

    /// Number of rows before the finish control.
    fn attendee_rows(&self) -> usize {
        self.rows.iter().take_while(|r| !r.iter().any(|c| c.payload == FINISH_TAG)).count()
    }
}

fn toggled(cell: &Cell) -> Cell {
    let label = match AttendanceStatus::from_toggle_label(&cell.label) {
        Some(AttendanceStatus::Present) => AttendanceStatus::Absent.toggle_label(),
        Some(_) => AttendanceStatus::Present.toggle_label(),
        None => cell.label.as_str(),
    };

    Cell::new(label, cell.payload.clone())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::messages::{ABSENT_LABEL, PRESENT_LABEL};

    fn grid() -> ControlGrid {
        ControlGrid::build_initial(&["Ann, @ann, 555", "Bob, 777", "Cid, 123"]).attach_finish_control()
    }

    #[test]
    fn builds_one_row_per_label() {
        let grid = ControlGrid::build_initial(&["Ann, 1", "Bob, 2"]);

        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.cell(1, NAME_COL), Some(&Cell::new("Bob, 2", "1-0")));
        assert_eq!(grid.cell(1, TOGGLE_COL), Some(&Cell::new(ABSENT_LABEL, "1-1")));
        assert!(!grid.has_finish_control());
    }

    #[test]
    fn toggle_changes_only_the_target() {
        let before = grid();
        let after = before.apply_toggle(1, TOGGLE_COL);

        assert_eq!(after.cell(1, TOGGLE_COL).unwrap().label, PRESENT_LABEL);

        for (r, row) in before.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if (r, c) != (1, TOGGLE_COL) {
                    assert_eq!(after.cell(r, c), Some(cell));
                }
            }
        }
    }

    #[test]
    fn toggle_is_an_involution() {
        let before = grid();

        for (r, row) in before.rows.iter().enumerate() {
            for c in 0..row.len() {
                assert_eq!(before.apply_toggle(r, c).apply_toggle(r, c), before);
            }
        }
    }

    #[test]
    fn toggle_leaves_unknown_labels_alone() {
        let before = grid();

        assert_eq!(before.apply_toggle(0, NAME_COL), before);
        assert_eq!(before.apply_toggle(3, 0), before);
        assert_eq!(before.apply_toggle(42, 7), before);
    }

    #[test]
    fn finish_control_is_attached_once_and_stays_last() {
        let grid = grid().attach_finish_control();
        assert_eq!(grid.rows.len(), 4);
        assert_eq!(grid.rows[3], vec![Cell::new(FINISH_LABEL, FINISH_TAG)]);

        let grid = grid.push_entry("Dan, 9", AttendanceStatus::Present);
        assert_eq!(grid.rows.len(), 5);
        assert_eq!(grid.cell(3, TOGGLE_COL), Some(&Cell::new(PRESENT_LABEL, "3-1")));
        assert_eq!(grid.rows[4], vec![Cell::new(FINISH_LABEL, FINISH_TAG)]);
    }

    #[test]
    fn rows_mirror_entries() {
        let entries = [RosterEntry::new(AttendanceStatus::Present, "Ann, 1"), RosterEntry::new(AttendanceStatus::Unmarked, "Bob, 2")];
        let grid = ControlGrid::from_entries(&entries);

        assert_eq!(grid.cell(0, TOGGLE_COL).unwrap().label, PRESENT_LABEL);
        assert_eq!(grid.cell(1, TOGGLE_COL).unwrap().label, ABSENT_LABEL);
    }

    #[test]
    fn parses_payloads() {
        assert_eq!("2-1".parse::<ControlAction>().unwrap(), ControlAction::Toggle { row: 2, col: 1 });
        assert_eq!(FINISH_TAG.parse::<ControlAction>().unwrap(), ControlAction::Finish);

        for bad in ["", "1", "1-", "-1", "a-1", "1-2-3", "#finished ", "publish", "edit:Title"] {
            assert!(matches!(bad.parse::<ControlAction>(), Err(WorkflowError::InvalidPayload(_))), "accepted: {bad}");
        }
    }

    #[test]
    fn payloads_round_trip() {
        for action in [ControlAction::Toggle { row: 0, col: 1 }, ControlAction::Finish] {
            assert_eq!(action.to_string().parse::<ControlAction>().unwrap(), action);
        }
    }
}
