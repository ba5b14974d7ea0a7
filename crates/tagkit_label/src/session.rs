//! Selection session state and manual lineage overrides.
//!
//! The pipeline never reads this state; hosts resolve a selection into an
//! ordered record list with [`SelectionState::order_selected`] and pass that in.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::classify::classify_record;
use crate::conf::TUP_SELECTED_GROUP_ORDER;
use crate::spec::{EnumLineage, LabelError, SpecLabelRecord};

/// Product type forced on records overridden to `MIXED`.
const C_TYPE_MIXED: &str = "Mixed";

////////////////////////////////////////////////////////////////////////////////
// #region Selection

/// Which way a move went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMoveDirection {
    ToSelected,
    ToAvailable,
}

/// One recorded move, used for undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMove {
    pub direction: EnumMoveDirection,
    /// Names actually moved, in move order.
    pub names: Vec<String>,
}

/// Available/selected product-name lists plus an undo stack.
///
/// Each name lives in at most one list; both keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub available: Vec<String>,
    pub selected: Vec<String>,
    pub history: Vec<SpecMove>,
}

impl SelectionState {
    /// Everything available, nothing selected.
    pub fn from_records(records: &[SpecLabelRecord]) -> Self {
        let mut available: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            if !available.contains(&record.product_name) {
                available.push(record.product_name.clone());
            }
        }
        Self {
            available,
            ..Self::default()
        }
    }

    fn apply_move(&mut self, direction: EnumMoveDirection, names: &[String]) -> Vec<String> {
        let (l_from, l_to) = match direction {
            EnumMoveDirection::ToSelected => (&mut self.available, &mut self.selected),
            EnumMoveDirection::ToAvailable => (&mut self.selected, &mut self.available),
        };
        let mut l_moved = Vec::new();
        for name in names {
            if let Some(n_idx) = l_from.iter().position(|item| item == name) {
                let c_name = l_from.remove(n_idx);
                l_to.push(c_name.clone());
                l_moved.push(c_name);
            }
        }
        l_moved
    }

    fn record_move(&mut self, direction: EnumMoveDirection, names: &[String]) -> usize {
        let l_moved = self.apply_move(direction, names);
        let n_moved = l_moved.len();
        if n_moved > 0 {
            self.history.push(SpecMove {
                direction,
                names: l_moved,
            });
        }
        n_moved
    }

    /// Move `names` from available to selected; returns how many moved.
    pub fn move_to_selected(&mut self, names: &[String]) -> usize {
        self.record_move(EnumMoveDirection::ToSelected, names)
    }

    /// Move `names` from selected back to available; returns how many moved.
    pub fn move_to_available(&mut self, names: &[String]) -> usize {
        self.record_move(EnumMoveDirection::ToAvailable, names)
    }

    /// Reverse the most recent move; `false` when there is nothing to undo.
    pub fn undo_last_move(&mut self) -> bool {
        let Some(last) = self.history.pop() else {
            return false;
        };
        let direction = match last.direction {
            EnumMoveDirection::ToSelected => EnumMoveDirection::ToAvailable,
            EnumMoveDirection::ToAvailable => EnumMoveDirection::ToSelected,
        };
        self.apply_move(direction, &last.names);
        true
    }

    /// Return every selected name to available and forget the history.
    pub fn clear_selected(&mut self) {
        let l_selected = std::mem::take(&mut self.selected);
        self.available.extend(l_selected);
        self.history.clear();
    }

    /// Selected records grouped by color category, selection order inside a group.
    pub fn order_selected(&self, records: &[SpecLabelRecord]) -> Vec<SpecLabelRecord> {
        let l_picked: Vec<&SpecLabelRecord> = self
            .selected
            .iter()
            .filter_map(|name| records.iter().find(|record| &record.product_name == name))
            .collect();
        let l_picked = &l_picked;
        TUP_SELECTED_GROUP_ORDER
            .iter()
            .flat_map(move |category| {
                l_picked
                    .iter()
                    .filter(move |record| classify_record(record) == *category)
                    .map(|record| (*record).clone())
            })
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Audit

/// One manual lineage change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLineageChange {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub product_name: String,
    pub lineage_old: EnumLineage,
    pub lineage_new: EnumLineage,
}

impl SpecLineageChange {
    /// `timestamp,productName,oldLineage,newLineage`.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.timestamp, self.product_name, self.lineage_old, self.lineage_new
        )
    }
}

/// Append-only sink for lineage changes.
pub trait AuditLog {
    fn append(&mut self, change: &SpecLineageChange) -> Result<(), String>;
}

/// Audit log appending one line per change to a file.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    pub path: PathBuf,
}

impl AuditLog for FileAuditLog {
    fn append(&mut self, change: &SpecLineageChange) -> Result<(), String> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| format!("Failed to open audit log {}: {err}", self.path.display()))?;
        writeln!(file, "{}", change.to_line())
            .map_err(|err| format!("Failed to append audit log {}: {err}", self.path.display()))
    }
}

/// In-memory audit log.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    pub lines: Vec<String>,
}

impl AuditLog for MemoryAuditLog {
    fn append(&mut self, change: &SpecLineageChange) -> Result<(), String> {
        self.lines.push(change.to_line());
        Ok(())
    }
}

/// Override one record's lineage and log the change.
///
/// `MIXED` also sets the product type to `Mixed`.
pub fn change_lineage(
    records: &mut [SpecLabelRecord],
    product_name: &str,
    lineage_new: EnumLineage,
    audit: &mut dyn AuditLog,
) -> Result<SpecLineageChange, LabelError> {
    let record = records
        .iter_mut()
        .find(|record| record.product_name == product_name)
        .ok_or_else(|| LabelError::Input(format!("Unknown product {product_name:?}.")))?;

    let change = SpecLineageChange {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        product_name: product_name.to_string(),
        lineage_old: record.lineage,
        lineage_new,
    };
    record.lineage = lineage_new;
    if lineage_new == EnumLineage::Mixed {
        record.product_type = C_TYPE_MIXED.to_string();
    }
    if let Err(msg) = audit.append(&change) {
        tracing::warn!("{msg}");
    }
    tracing::debug!(
        "Lineage of {product_name:?}: {} -> {lineage_new}.",
        change.lineage_old
    );
    Ok(change)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnumProductStrain;

    fn record(name: &str, product_type: &str, lineage: EnumLineage) -> SpecLabelRecord {
        SpecLabelRecord {
            product_name: name.to_string(),
            product_type: product_type.to_string(),
            lineage,
            ..SpecLabelRecord::default()
        }
    }

    fn names(l_names: &[&str]) -> Vec<String> {
        l_names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_moves_and_undo() {
        let l_records = vec![
            record("A", "flower", EnumLineage::Sativa),
            record("B", "flower", EnumLineage::Indica),
            record("C", "flower", EnumLineage::Hybrid),
        ];
        let mut state = SelectionState::from_records(&l_records);
        assert_eq!(state.move_to_selected(&names(&["B", "C", "X"])), 2);
        assert_eq!(state.available, names(&["A"]));
        assert_eq!(state.selected, names(&["B", "C"]));

        assert_eq!(state.move_to_available(&names(&["C"])), 1);
        assert!(state.undo_last_move());
        assert_eq!(state.selected, names(&["B", "C"]));
        assert!(state.undo_last_move());
        assert_eq!(state.selected, Vec::<String>::new());
        assert_eq!(state.available, names(&["A", "B", "C"]));
        assert!(!state.undo_last_move());
    }

    #[test]
    fn test_clear_selected_returns_names_and_drops_history() {
        let l_records = vec![record("A", "flower", EnumLineage::Sativa)];
        let mut state = SelectionState::from_records(&l_records);
        state.move_to_selected(&names(&["A"]));
        state.clear_selected();
        assert!(state.selected.is_empty());
        assert!(state.history.is_empty());
        assert_eq!(state.available, names(&["A"]));
    }

    #[test]
    fn test_order_selected_groups_by_category() {
        let mut pipe = record("Pipe", "paraphernalia", EnumLineage::Hybrid);
        pipe.product_strain = EnumProductStrain::Paraphernalia;
        let l_records = vec![
            pipe,
            record("Kush", "flower", EnumLineage::Indica),
            record("Haze", "flower", EnumLineage::Sativa),
            record("Mix", "flower", EnumLineage::HybridSativa),
        ];
        let mut state = SelectionState::from_records(&l_records);
        state.move_to_selected(&names(&["Pipe", "Kush", "Haze", "Mix"]));
        let l_names: Vec<String> = state
            .order_selected(&l_records)
            .into_iter()
            .map(|r| r.product_name)
            .collect();
        assert_eq!(l_names, names(&["Haze", "Mix", "Kush", "Pipe"]));
    }

    #[test]
    fn test_change_lineage_to_mixed_logs_and_retypes() {
        let mut l_records = vec![record("Gummy", "edible (solid)", EnumLineage::Indica)];
        let mut audit = MemoryAuditLog::default();
        let change = change_lineage(&mut l_records, "Gummy", EnumLineage::Mixed, &mut audit)
            .expect("change");
        assert_eq!(l_records[0].lineage, EnumLineage::Mixed);
        assert_eq!(l_records[0].product_type, "Mixed");
        assert_eq!(audit.lines.len(), 1);
        assert!(audit.lines[0].ends_with(",Gummy,INDICA,MIXED"));
        assert_eq!(change.lineage_old, EnumLineage::Indica);

        let err = change_lineage(&mut l_records, "Nope", EnumLineage::Sativa, &mut audit);
        assert!(matches!(err, Err(LabelError::Input(_))));
    }

    #[test]
    fn test_file_audit_log_appends_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut audit = FileAuditLog {
            path: dir.path().join("lineage_changes.log"),
        };
        let mut l_records = vec![record("Haze", "flower", EnumLineage::Sativa)];
        change_lineage(&mut l_records, "Haze", EnumLineage::Hybrid, &mut audit).expect("first");
        change_lineage(&mut l_records, "Haze", EnumLineage::Indica, &mut audit).expect("second");
        let c_log = std::fs::read_to_string(&audit.path).expect("read");
        let l_lines: Vec<&str> = c_log.lines().collect();
        assert_eq!(l_lines.len(), 2);
        assert!(l_lines[1].ends_with(",Haze,HYBRID,INDICA"));
    }
}
