use crate::{Instance, LiveDelta, SitePatch};

/// In-memory list of instance summaries backing the fleet view.
///
/// Rows are keyed by `name`. Poll deltas merge field-level, operator
/// updates merge only the fields they carried, and a full reload replaces
/// everything. A delete acknowledgment never removes a row; the stale row
/// persists until the next full reload.
#[derive(Debug, Default)]
pub struct InstanceTable {
    rows: Vec<Instance>,
}

impl InstanceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rows(&self) -> &[Instance] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.rows.iter().find(|row| row.name == name)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.name == name)
    }

    /// Full reload: row existence is authoritative only through this path.
    pub fn replace_all(&mut self, rows: Vec<Instance>) {
        self.rows = rows;
    }

    /// Apply one live delta. Returns `false` when no row matches, in which
    /// case the table is left untouched (a delta never creates a row).
    pub fn apply_delta(&mut self, delta: &LiveDelta) -> bool {
        match self.rows.iter_mut().find(|row| row.name == delta.name) {
            Some(row) => {
                delta.apply_to(row);
                true
            }
            None => false,
        }
    }

    pub fn apply_deltas(&mut self, deltas: &[LiveDelta]) {
        for delta in deltas {
            self.apply_delta(delta);
        }
    }

    /// Merge an acknowledged operator update back into its row.
    pub fn apply_patch(&mut self, patch: &SitePatch) -> bool {
        match self.rows.iter_mut().find(|row| row.name == patch.name) {
            Some(row) => {
                patch.apply_to(row);
                true
            }
            None => false,
        }
    }

    /// Replace a row wholesale with a full record fetched for one
    /// instance, e.g. after loading the detail panel.
    pub fn replace_row(&mut self, record: Instance) -> bool {
        match self.rows.iter_mut().find(|row| row.name == record.name) {
            Some(row) => {
                *row = record;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(names: &[&str]) -> InstanceTable {
        let mut table = InstanceTable::new();
        table.replace_all(
            names
                .iter()
                .map(|name| Instance {
                    name: (*name).into(),
                    build_state: "OK".into(),
                    duration: 12,
                    ..Instance::default()
                })
                .collect(),
        );
        table
    }

    #[test]
    fn test_poll_merge_scenario() {
        // Scenario: one row updated in place, siblings untouched.
        let mut table = table_with(&["br-123", "br-456"]);
        let payload: crate::LivePayload = serde_json::from_str(
            r#"{"sites": [{"_id": "br-123", "build_state": "Building...", "duration": 0}]}"#,
        )
        .unwrap();

        table.apply_deltas(&payload.sites);

        let row = table.get("br-123").unwrap();
        assert_eq!(row.build_state, "Building...");
        assert_eq!(row.duration, 0);

        let other = table.get("br-456").unwrap();
        assert_eq!(other.build_state, "OK");
        assert_eq!(other.duration, 12);
    }

    #[test]
    fn test_unknown_delta_creates_no_row() {
        let mut table = table_with(&["br-123"]);
        let delta = LiveDelta {
            name: "br-999".into(),
            build_state: Some("Building...".into()),
            ..LiveDelta::default()
        };

        assert!(!table.apply_delta(&delta));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("br-123").unwrap().build_state, "OK");
    }

    #[test]
    fn test_delta_merge_idempotent_through_table() {
        let mut table = table_with(&["br-123"]);
        let delta = LiveDelta {
            name: "br-123".into(),
            build_state: Some("Scheduled".into()),
            ..LiveDelta::default()
        };

        table.apply_delta(&delta);
        let after_once = table.get("br-123").unwrap().clone();
        table.apply_delta(&delta);
        assert_eq!(table.get("br-123").unwrap(), &after_once);
    }

    #[test]
    fn test_out_of_order_patch_responses_keep_later_field() {
        // Two edits in flight; the second response resolves first. When the
        // first finally lands it must not revert the second's field.
        let mut table = table_with(&["br-123"]);
        let first = SitePatch {
            note: Some("from first edit".into()),
            ..SitePatch::for_site("br-123")
        };
        let second = SitePatch {
            title: Some("from second edit".into()),
            ..SitePatch::for_site("br-123")
        };

        table.apply_patch(&second);
        table.apply_patch(&first);

        let row = table.get("br-123").unwrap();
        assert_eq!(row.title, "from second edit");
        assert_eq!(row.note, "from first edit");
    }

    #[test]
    fn test_patch_unknown_row_is_noop() {
        let mut table = table_with(&["br-123"]);
        let patch = SitePatch {
            note: Some("x".into()),
            ..SitePatch::for_site("br-gone")
        };
        assert!(!table.apply_patch(&patch));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_replace_row_is_wholesale() {
        let mut table = table_with(&["br-123"]);
        let fresh = Instance {
            name: "br-123".into(),
            title: "reloaded".into(),
            ..Instance::default()
        };
        assert!(table.replace_row(fresh));
        let row = table.get("br-123").unwrap();
        assert_eq!(row.title, "reloaded");
        assert_eq!(row.build_state, "");
    }
}
