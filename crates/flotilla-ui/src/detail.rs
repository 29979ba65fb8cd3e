use flotilla_core::{Instance, SitePatch};

/// Editable fields of the detail panel, in render order. Everything else
/// the panel shows is read-only backend state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailField {
    Note,
    Dump,
    NoModuleUpdate,
    DockerNoCache,
    RestoreNoDevScripts,
    OdooSettings,
    OdooSettingsUpdateModulesBefore,
    Archived,
    DoBackupRegularly,
}

pub const DETAIL_FIELDS: [DetailField; 9] = [
    DetailField::Note,
    DetailField::Dump,
    DetailField::NoModuleUpdate,
    DetailField::DockerNoCache,
    DetailField::RestoreNoDevScripts,
    DetailField::OdooSettings,
    DetailField::OdooSettingsUpdateModulesBefore,
    DetailField::Archived,
    DetailField::DoBackupRegularly,
];

impl DetailField {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            DetailField::Note => "Note",
            DetailField::Dump => "Dump",
            DetailField::NoModuleUpdate => "No module update",
            DetailField::DockerNoCache => "No cache at next build",
            DetailField::RestoreNoDevScripts => "No dev scripts on restore",
            DetailField::OdooSettings => "Odoo settings",
            DetailField::OdooSettingsUpdateModulesBefore => "Update modules before",
            DetailField::Archived => "Archived",
            DetailField::DoBackupRegularly => "Backup regularly",
        }
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            DetailField::NoModuleUpdate
                | DetailField::DockerNoCache
                | DetailField::RestoreNoDevScripts
                | DetailField::Archived
                | DetailField::DoBackupRegularly
        )
    }

    #[must_use]
    pub fn current_text<'a>(&self, record: &'a Instance) -> &'a str {
        match self {
            DetailField::Note => &record.note,
            DetailField::Dump => &record.dump,
            DetailField::OdooSettings => &record.odoo_settings,
            DetailField::OdooSettingsUpdateModulesBefore => {
                &record.odoo_settings_update_modules_before
            }
            _ => "",
        }
    }

    #[must_use]
    pub fn current_bool(&self, record: &Instance) -> bool {
        match self {
            DetailField::NoModuleUpdate => record.no_module_update,
            DetailField::DockerNoCache => record.docker_no_cache,
            DetailField::RestoreNoDevScripts => record.restore_no_dev_scripts,
            DetailField::Archived => record.archived,
            DetailField::DoBackupRegularly => record.do_backup_regularly,
            _ => false,
        }
    }
}

/// Autosave-on-change state for the focused instance's detail panel.
///
/// Every committed change becomes one `update/site` patch carrying only
/// the changed field; rapid successive edits produce independent,
/// possibly overlapping requests (accepted last-write-wins race).
#[derive(Debug, Default)]
pub struct DetailState {
    pub cursor: usize,
    /// Text buffer while a field is being edited inline.
    pub editing: Option<String>,
}

impl DetailState {
    #[must_use]
    pub fn field(&self) -> DetailField {
        DETAIL_FIELDS[self.cursor % DETAIL_FIELDS.len()]
    }

    pub fn move_cursor(&mut self, down: bool) {
        if self.editing.is_some() {
            return;
        }
        let len = DETAIL_FIELDS.len();
        self.cursor = if down {
            (self.cursor + 1) % len
        } else {
            (self.cursor + len - 1) % len
        };
    }

    /// Flip the boolean under the cursor; the coerced value goes straight
    /// into a single-field patch.
    #[must_use]
    pub fn toggle_patch(&self, record: &Instance) -> Option<SitePatch> {
        let field = self.field();
        if !field.is_bool() {
            return None;
        }
        let flipped = !field.current_bool(record);
        let mut patch = SitePatch::for_site(record.name.clone());
        match field {
            DetailField::NoModuleUpdate => patch.no_module_update = Some(flipped),
            DetailField::DockerNoCache => patch.docker_no_cache = Some(flipped),
            DetailField::RestoreNoDevScripts => patch.restore_no_dev_scripts = Some(flipped),
            DetailField::Archived => patch.archived = Some(flipped),
            DetailField::DoBackupRegularly => patch.do_backup_regularly = Some(flipped),
            _ => return None,
        }
        Some(patch)
    }

    /// Begin inline editing of the text field under the cursor.
    pub fn start_editing(&mut self, record: &Instance) {
        let field = self.field();
        if !field.is_bool() {
            self.editing = Some(field.current_text(record).to_string());
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(buffer) = &mut self.editing {
            buffer.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(buffer) = &mut self.editing {
            buffer.pop();
        }
    }

    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    /// Commit the edit buffer into a single-field patch.
    #[must_use]
    pub fn commit_editing(&mut self, record: &Instance) -> Option<SitePatch> {
        let buffer = self.editing.take()?;
        let mut patch = SitePatch::for_site(record.name.clone());
        match self.field() {
            DetailField::Note => patch.note = Some(buffer),
            DetailField::Dump => patch.dump = Some(buffer),
            DetailField::OdooSettings => patch.odoo_settings = Some(buffer),
            DetailField::OdooSettingsUpdateModulesBefore => {
                patch.odoo_settings_update_modules_before = Some(buffer);
            }
            _ => return None,
        }
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Instance {
        Instance {
            name: "br-123".into(),
            note: "old note".into(),
            archived: false,
            ..Instance::default()
        }
    }

    fn cursor_of(field: DetailField) -> usize {
        DETAIL_FIELDS.iter().position(|f| *f == field).unwrap()
    }

    #[test]
    fn test_toggle_emits_single_field_patch() {
        let state = DetailState {
            cursor: cursor_of(DetailField::Archived),
            editing: None,
        };
        let patch = state.toggle_patch(&record()).unwrap();
        assert_eq!(patch.name, "br-123");
        assert_eq!(patch.archived, Some(true));
        // nothing else rides along
        assert_eq!(patch.note, None);
        assert_eq!(patch.docker_no_cache, None);
    }

    #[test]
    fn test_toggle_on_text_field_is_none() {
        let state = DetailState {
            cursor: cursor_of(DetailField::Note),
            editing: None,
        };
        assert!(state.toggle_patch(&record()).is_none());
    }

    #[test]
    fn test_text_edit_commits_only_that_field() {
        let mut state = DetailState {
            cursor: cursor_of(DetailField::Note),
            editing: None,
        };
        let record = record();
        state.start_editing(&record);
        state.push_char('!');
        let patch = state.commit_editing(&record).unwrap();
        assert_eq!(patch.note.as_deref(), Some("old note!"));
        assert_eq!(patch.archived, None);
        assert!(state.editing.is_none());
    }

    #[test]
    fn test_cancel_discards_buffer() {
        let mut state = DetailState {
            cursor: cursor_of(DetailField::Note),
            editing: None,
        };
        let record = record();
        state.start_editing(&record);
        state.push_char('x');
        state.cancel_editing();
        assert!(state.commit_editing(&record).is_none());
    }
}
