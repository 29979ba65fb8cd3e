use crossterm::event::{KeyCode, KeyEvent};
use flotilla_core::{AppSettings, DumpOption, Instance, SitePatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormKind {
    Create,
    Backup,
    Rebuild,
    TransformDump,
    Settings,
    AppSettings,
}

/// What a confirmed form asks the console to send. Exactly one request
/// per submit; cancellation produces none.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmit {
    Create {
        name: String,
    },
    Backup {
        dumpname: String,
    },
    Rebuild {
        dump: Option<String>,
        no_cache: bool,
        no_module_update: bool,
    },
    Transform {
        dump: String,
        anonymize: bool,
        erase: bool,
    },
    Settings(SitePatch),
    AppSettings(AppSettings),
}

#[derive(Debug)]
pub enum FormOutcome {
    Continue,
    Cancel,
    Submit(FormSubmit),
}

/// One renderable form line; the widget layer draws these uniformly.
pub struct FormRow {
    pub label: &'static str,
    pub value: String,
    pub is_checkbox: bool,
    pub focused: bool,
}

#[derive(Debug)]
pub enum FormState {
    Create(CreateForm),
    Backup(BackupForm),
    Rebuild(RebuildForm),
    Transform(TransformForm),
    Settings(SettingsForm),
    AppSettings(AppSettingsForm),
}

impl FormState {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            FormState::Create(_) => "Make New Instance",
            FormState::Backup(_) => "Backup Database",
            FormState::Rebuild(_) => "Reset Instance",
            FormState::Transform(_) => "Transform Input Dump",
            FormState::Settings(_) => "Instance Settings",
            FormState::AppSettings(_) => "App Settings",
        }
    }

    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            FormState::Backup(_) => "Dumping postgres.",
            FormState::Rebuild(_) => {
                "Rebuilding the instance in background. Will take some time until the instance is up again."
            }
            _ => "",
        }
    }

    pub fn rows(&self) -> Vec<FormRow> {
        match self {
            FormState::Create(form) => form.rows(),
            FormState::Backup(form) => form.rows(),
            FormState::Rebuild(form) => form.rows(),
            FormState::Transform(form) => form.rows(),
            FormState::Settings(form) => form.rows(),
            FormState::AppSettings(form) => form.rows(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormOutcome {
        match key.code {
            KeyCode::Esc => FormOutcome::Cancel,
            KeyCode::Enter => FormOutcome::Submit(self.submit()),
            _ => {
                match self {
                    FormState::Create(form) => form.handle_key(key),
                    FormState::Backup(form) => form.handle_key(key),
                    FormState::Rebuild(form) => form.handle_key(key),
                    FormState::Transform(form) => form.handle_key(key),
                    FormState::Settings(form) => form.handle_key(key),
                    FormState::AppSettings(form) => form.handle_key(key),
                }
                FormOutcome::Continue
            }
        }
    }

    fn submit(&self) -> FormSubmit {
        match self {
            FormState::Create(form) => form.submit(),
            FormState::Backup(form) => form.submit(),
            FormState::Rebuild(form) => form.submit(),
            FormState::Transform(form) => form.submit(),
            FormState::Settings(form) => form.submit(),
            FormState::AppSettings(form) => form.submit(),
        }
    }
}

fn edit_text(buffer: &mut String, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => buffer.push(c),
        KeyCode::Backspace => {
            buffer.pop();
        }
        _ => {}
    }
}

fn move_focus(focus: &mut usize, count: usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Down | KeyCode::Tab => {
            *focus = (*focus + 1) % count;
            true
        }
        KeyCode::Up | KeyCode::BackTab => {
            *focus = (*focus + count - 1) % count;
            true
        }
        _ => false,
    }
}

fn cycle_combo(index: &mut usize, len: usize, key: KeyEvent) -> bool {
    if len == 0 {
        return false;
    }
    match key.code {
        KeyCode::Left => {
            *index = (*index + len - 1) % len;
            true
        }
        KeyCode::Right => {
            *index = (*index + 1) % len;
            true
        }
        _ => false,
    }
}

fn combo_label(dumps: &[DumpOption], index: usize) -> String {
    dumps
        .get(index)
        .map(|dump| dump.value.clone())
        .unwrap_or_else(|| "(no dumps available)".into())
}

fn checkbox(value: bool) -> String {
    if value { "[x]".into() } else { "[ ]".into() }
}

#[derive(Debug, Default)]
pub struct CreateForm {
    pub name: String,
}

impl CreateForm {
    fn rows(&self) -> Vec<FormRow> {
        vec![FormRow {
            label: "Name",
            value: self.name.clone(),
            is_checkbox: false,
            focused: true,
        }]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        edit_text(&mut self.name, key);
    }

    fn submit(&self) -> FormSubmit {
        FormSubmit::Create {
            name: self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BackupForm {
    pub dumpname: String,
}

impl BackupForm {
    fn rows(&self) -> Vec<FormRow> {
        vec![FormRow {
            label: "Dumpname",
            value: self.dumpname.clone(),
            is_checkbox: false,
            focused: true,
        }]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        edit_text(&mut self.dumpname, key);
    }

    fn submit(&self) -> FormSubmit {
        FormSubmit::Backup {
            dumpname: self.dumpname.trim().to_string(),
        }
    }
}

/// Rebuild-from-dump parameters. Selecting "no module update" means
/// "build from scratch without reapplying a snapshot-derived upgrade", so
/// it hides the dump choice and the submitted request carries no dump.
#[derive(Debug)]
pub struct RebuildForm {
    pub dumps: Vec<DumpOption>,
    pub dump_index: usize,
    pub no_cache: bool,
    pub no_module_update: bool,
    focus: usize,
}

impl RebuildForm {
    #[must_use]
    pub fn new(dumps: Vec<DumpOption>) -> Self {
        Self {
            dumps,
            dump_index: 0,
            no_cache: false,
            no_module_update: false,
            focus: 0,
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        let mut rows = Vec::new();
        if !self.no_module_update {
            rows.push(FormRow {
                label: "Dump",
                value: combo_label(&self.dumps, self.dump_index),
                is_checkbox: false,
                focused: self.focus == 0,
            });
        }
        rows.push(FormRow {
            label: "Docker Build: No Cache",
            value: checkbox(self.no_cache),
            is_checkbox: true,
            focused: self.focus == 1,
        });
        rows.push(FormRow {
            label: "No module update",
            value: checkbox(self.no_module_update),
            is_checkbox: true,
            focused: self.focus == 2,
        });
        rows
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if move_focus(&mut self.focus, 3, key) {
            if self.no_module_update && self.focus == 0 {
                // Dump field is hidden; skip over it.
                self.focus = 1;
            }
            return;
        }
        match self.focus {
            0 => {
                cycle_combo(&mut self.dump_index, self.dumps.len(), key);
            }
            1 => {
                if key.code == KeyCode::Char(' ') {
                    self.no_cache = !self.no_cache;
                }
            }
            2 => {
                if key.code == KeyCode::Char(' ') {
                    self.no_module_update = !self.no_module_update;
                }
            }
            _ => {}
        }
    }

    fn submit(&self) -> FormSubmit {
        let dump = if self.no_module_update {
            None
        } else {
            self.dumps.get(self.dump_index).map(|d| d.id.clone())
        };
        FormSubmit::Rebuild {
            dump,
            no_cache: self.no_cache,
            no_module_update: self.no_module_update,
        }
    }
}

#[derive(Debug)]
pub struct TransformForm {
    pub dumps: Vec<DumpOption>,
    pub dump_index: usize,
    pub anonymize: bool,
    pub erase: bool,
    focus: usize,
}

impl TransformForm {
    #[must_use]
    pub fn new(dumps: Vec<DumpOption>) -> Self {
        // Both sanitation steps default to on, like the original form.
        Self {
            dumps,
            dump_index: 0,
            anonymize: true,
            erase: true,
            focus: 0,
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        vec![
            FormRow {
                label: "Dump",
                value: combo_label(&self.dumps, self.dump_index),
                is_checkbox: false,
                focused: self.focus == 0,
            },
            FormRow {
                label: "Anonymize",
                value: checkbox(self.anonymize),
                is_checkbox: true,
                focused: self.focus == 1,
            },
            FormRow {
                label: "Erase Data (make small)",
                value: checkbox(self.erase),
                is_checkbox: true,
                focused: self.focus == 2,
            },
        ]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if move_focus(&mut self.focus, 3, key) {
            return;
        }
        match self.focus {
            0 => {
                cycle_combo(&mut self.dump_index, self.dumps.len(), key);
            }
            1 => {
                if key.code == KeyCode::Char(' ') {
                    self.anonymize = !self.anonymize;
                }
            }
            2 => {
                if key.code == KeyCode::Char(' ') {
                    self.erase = !self.erase;
                }
            }
            _ => {}
        }
    }

    fn submit(&self) -> FormSubmit {
        FormSubmit::Transform {
            dump: self
                .dumps
                .get(self.dump_index)
                .map(|d| d.id.clone())
                .unwrap_or_default(),
            anonymize: self.anonymize,
            erase: self.erase,
        }
    }
}

/// Instance settings form; submits one full-record update whose fields
/// merge back into the table row by identity.
#[derive(Debug)]
pub struct SettingsForm {
    pub name: String,
    pub title: String,
    pub note: String,
    pub dumps: Vec<DumpOption>,
    pub dump_index: usize,
    pub archived: bool,
    pub keep_data: bool,
    focus: usize,
}

impl SettingsForm {
    #[must_use]
    pub fn new(record: &Instance, dumps: Vec<DumpOption>) -> Self {
        let dump_index = dumps
            .iter()
            .position(|dump| dump.id == record.dump)
            .unwrap_or(0);
        Self {
            name: record.name.clone(),
            title: record.title.clone(),
            note: record.note.clone(),
            dumps,
            dump_index,
            archived: record.archived,
            keep_data: false,
            focus: 0,
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        vec![
            FormRow {
                label: "Title",
                value: self.title.clone(),
                is_checkbox: false,
                focused: self.focus == 0,
            },
            FormRow {
                label: "Note",
                value: self.note.clone(),
                is_checkbox: false,
                focused: self.focus == 1,
            },
            FormRow {
                label: "Dump",
                value: combo_label(&self.dumps, self.dump_index),
                is_checkbox: false,
                focused: self.focus == 2,
            },
            FormRow {
                label: "Archived",
                value: checkbox(self.archived),
                is_checkbox: true,
                focused: self.focus == 3,
            },
            FormRow {
                label: "Dont anonymize / clear data",
                value: checkbox(self.keep_data),
                is_checkbox: true,
                focused: self.focus == 4,
            },
        ]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if move_focus(&mut self.focus, 5, key) {
            return;
        }
        match self.focus {
            0 => edit_text(&mut self.title, key),
            1 => edit_text(&mut self.note, key),
            2 => {
                cycle_combo(&mut self.dump_index, self.dumps.len(), key);
            }
            3 => {
                if key.code == KeyCode::Char(' ') {
                    self.archived = !self.archived;
                }
            }
            4 => {
                if key.code == KeyCode::Char(' ') {
                    self.keep_data = !self.keep_data;
                }
            }
            _ => {}
        }
    }

    fn submit(&self) -> FormSubmit {
        FormSubmit::Settings(SitePatch {
            title: Some(self.title.clone()),
            note: Some(self.note.clone()),
            dump: self.dumps.get(self.dump_index).map(|d| d.id.clone()),
            archived: Some(self.archived),
            keep_data: Some(self.keep_data),
            ..SitePatch::for_site(self.name.clone())
        })
    }
}

#[derive(Debug)]
pub struct AppSettingsForm {
    pub concurrent_builds: String,
    pub default_merge_target: String,
    pub auto_create_new_branches: bool,
    pub odoo_settings: String,
    pub no_i18n: bool,
    focus: usize,
}

impl AppSettingsForm {
    #[must_use]
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            concurrent_builds: settings.concurrent_builds.to_string(),
            default_merge_target: settings.default_merge_target.clone(),
            auto_create_new_branches: settings.auto_create_new_branches,
            odoo_settings: settings.odoo_settings.clone(),
            no_i18n: settings.no_i18n,
            focus: 0,
        }
    }

    fn rows(&self) -> Vec<FormRow> {
        vec![
            FormRow {
                label: "Dont update translations",
                value: checkbox(self.no_i18n),
                is_checkbox: true,
                focused: self.focus == 0,
            },
            FormRow {
                label: "Concurrent Builds",
                value: self.concurrent_builds.clone(),
                is_checkbox: false,
                focused: self.focus == 1,
            },
            FormRow {
                label: "Default Merge Destination",
                value: self.default_merge_target.clone(),
                is_checkbox: false,
                focused: self.focus == 2,
            },
            FormRow {
                label: "Auto Create New Branches",
                value: checkbox(self.auto_create_new_branches),
                is_checkbox: true,
                focused: self.focus == 3,
            },
            FormRow {
                label: "Odoo Settings",
                value: self.odoo_settings.clone(),
                is_checkbox: false,
                focused: self.focus == 4,
            },
        ]
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if move_focus(&mut self.focus, 5, key) {
            return;
        }
        match self.focus {
            0 => {
                if key.code == KeyCode::Char(' ') {
                    self.no_i18n = !self.no_i18n;
                }
            }
            1 => edit_text(&mut self.concurrent_builds, key),
            2 => edit_text(&mut self.default_merge_target, key),
            3 => {
                if key.code == KeyCode::Char(' ') {
                    self.auto_create_new_branches = !self.auto_create_new_branches;
                }
            }
            4 => edit_text(&mut self.odoo_settings, key),
            _ => {}
        }
    }

    fn submit(&self) -> FormSubmit {
        FormSubmit::AppSettings(AppSettings {
            concurrent_builds: self.concurrent_builds.trim().parse().unwrap_or(0),
            default_merge_target: self.default_merge_target.clone(),
            auto_create_new_branches: self.auto_create_new_branches,
            odoo_settings: self.odoo_settings.clone(),
            no_i18n: self.no_i18n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn dumps() -> Vec<DumpOption> {
        vec![
            DumpOption {
                id: "snap-2024-01".into(),
                value: "snap-2024-01 [2024-01-05]".into(),
            },
            DumpOption {
                id: "snap-2024-02".into(),
                value: "snap-2024-02 [2024-02-01]".into(),
            },
        ]
    }

    #[test]
    fn test_rebuild_submit_parameters() {
        let mut form = FormState::Rebuild(RebuildForm::new(dumps()));
        // toggle no_cache on
        form.handle_key(key(KeyCode::Down));
        form.handle_key(key(KeyCode::Char(' ')));

        match form.handle_key(key(KeyCode::Enter)) {
            FormOutcome::Submit(FormSubmit::Rebuild {
                dump,
                no_cache,
                no_module_update,
            }) => {
                assert_eq!(dump.as_deref(), Some("snap-2024-01"));
                assert!(no_cache);
                assert!(!no_module_update);
            }
            other => panic!("expected rebuild submit, got {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_no_module_update_drops_dump() {
        let mut form = RebuildForm::new(dumps());
        form.no_module_update = true;
        assert_eq!(
            form.submit(),
            FormSubmit::Rebuild {
                dump: None,
                no_cache: false,
                no_module_update: true,
            }
        );
        // the dump row disappears from the rendered form
        assert!(form.rows().iter().all(|row| row.label != "Dump"));
    }

    #[test]
    fn test_cancel_produces_no_submit() {
        let mut form = FormState::Create(CreateForm::default());
        form.handle_key(key(KeyCode::Char('b')));
        assert!(matches!(
            form.handle_key(key(KeyCode::Esc)),
            FormOutcome::Cancel
        ));
    }

    #[test]
    fn test_create_form_collects_name() {
        let mut form = CreateForm::default();
        for c in "br-9".chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(
            form.submit(),
            FormSubmit::Create {
                name: "br-9".into()
            }
        );
    }

    #[test]
    fn test_transform_defaults_to_full_sanitation() {
        let form = TransformForm::new(dumps());
        assert_eq!(
            form.submit(),
            FormSubmit::Transform {
                dump: "snap-2024-01".into(),
                anonymize: true,
                erase: true,
            }
        );
    }

    #[test]
    fn test_settings_submit_carries_whitelisted_fields() {
        let record = Instance {
            name: "br-123".into(),
            title: "Old".into(),
            note: "note".into(),
            dump: "snap-2024-02".into(),
            ..Instance::default()
        };
        let form = SettingsForm::new(&record, dumps());
        match form.submit() {
            FormSubmit::Settings(patch) => {
                assert_eq!(patch.name, "br-123");
                assert_eq!(patch.title.as_deref(), Some("Old"));
                assert_eq!(patch.dump.as_deref(), Some("snap-2024-02"));
                assert_eq!(patch.archived, Some(false));
                // detail-panel-only fields stay untouched
                assert_eq!(patch.odoo_settings, None);
                assert_eq!(patch.docker_no_cache, None);
            }
            other => panic!("expected settings submit, got {other:?}"),
        }
    }

    #[test]
    fn test_app_settings_parses_concurrency() {
        let mut form = AppSettingsForm::new(&AppSettings::default());
        form.focus = 1;
        form.handle_key(key(KeyCode::Backspace));
        for c in "4".chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
        match form.submit() {
            FormSubmit::AppSettings(settings) => assert_eq!(settings.concurrent_builds, 4),
            other => panic!("expected app settings submit, got {other:?}"),
        }
    }
}
