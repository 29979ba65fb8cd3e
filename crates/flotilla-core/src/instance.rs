use serde::{Deserialize, Serialize};

/// One deployed feature-branch environment as reported by the backend.
///
/// `name` is the stable identity; every other field is display state owned
/// by the backend. Unknown wire fields are ignored and missing fields
/// default so the console tolerates backend schema drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub name: String,
    pub title: String,
    pub build_state: String,
    pub docker_state: String,
    pub db_size: u64,
    pub db_size_humanize: String,
    pub source_size: u64,
    pub source_size_humanize: String,
    /// Last build time in seconds.
    pub duration: i64,
    pub note: String,
    #[serde(alias = "archive")]
    pub archived: bool,
    /// Name of the snapshot the instance was last built from.
    pub dump: String,
    pub docker_no_cache: bool,
    pub no_module_update: bool,
    pub restore_no_dev_scripts: bool,
    pub do_backup_regularly: bool,
    pub odoo_settings: String,
    pub odoo_settings_update_modules_before: String,
    pub date_registered: String,
    pub updated: String,
    pub git_author: String,
    pub sha: String,
    pub git_desc: String,
    pub robot_result: String,
}

/// Sparse per-instance update from the incremental live-values poll.
///
/// The backend keys these by `_id`, which carries the same identity the
/// table tracks as `name`. Only fields present in the payload are applied;
/// everything else on the target row stays untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveDelta {
    #[serde(rename = "_id")]
    pub name: String,
    pub build_state: Option<String>,
    pub docker_state: Option<String>,
    pub db_size_humanize: Option<String>,
    pub source_size_humanize: Option<String>,
    pub duration: Option<i64>,
    pub updated: Option<String>,
}

impl LiveDelta {
    /// Field-level merge into `row`: only `Some` fields overwrite.
    pub fn apply_to(&self, row: &mut Instance) {
        if let Some(build_state) = &self.build_state {
            row.build_state = build_state.clone();
        }
        if let Some(docker_state) = &self.docker_state {
            row.docker_state = docker_state.clone();
        }
        if let Some(db_size) = &self.db_size_humanize {
            row.db_size_humanize = db_size.clone();
        }
        if let Some(source_size) = &self.source_size_humanize {
            row.source_size_humanize = source_size.clone();
        }
        if let Some(duration) = self.duration {
            row.duration = duration;
        }
        if let Some(updated) = &self.updated {
            row.updated = updated.clone();
        }
    }
}

/// Wire shape of the live-values endpoint: `{ "sites": [LiveDelta, ...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LivePayload {
    pub sites: Vec<LiveDelta>,
}

/// Whitelisted mutable fields for `update/site`.
///
/// The detail panel submits one patch per field change with only that field
/// set; the settings form sets several. The raw panel state is never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitePatch {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<String>,
    #[serde(rename = "archive", skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_no_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_module_update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_no_dev_scripts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_backup_regularly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odoo_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odoo_settings_update_modules_before: Option<String>,
}

impl SitePatch {
    #[must_use]
    pub fn for_site(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Field-level merge into `row`, mirroring `LiveDelta::apply_to`.
    ///
    /// Used when an update acknowledgment comes back: only the fields this
    /// patch carried are written, so a slow earlier response cannot revert
    /// fields a later response already settled.
    pub fn apply_to(&self, row: &mut Instance) {
        if let Some(title) = &self.title {
            row.title = title.clone();
        }
        if let Some(note) = &self.note {
            row.note = note.clone();
        }
        if let Some(dump) = &self.dump {
            row.dump = dump.clone();
        }
        if let Some(archived) = self.archived {
            row.archived = archived;
        }
        if let Some(no_cache) = self.docker_no_cache {
            row.docker_no_cache = no_cache;
        }
        if let Some(no_module_update) = self.no_module_update {
            row.no_module_update = no_module_update;
        }
        if let Some(no_dev_scripts) = self.restore_no_dev_scripts {
            row.restore_no_dev_scripts = no_dev_scripts;
        }
        if let Some(backup) = self.do_backup_regularly {
            row.do_backup_regularly = backup;
        }
        if let Some(settings) = &self.odoo_settings {
            row.odoo_settings = settings.clone();
        }
        if let Some(before) = &self.odoo_settings_update_modules_before {
            row.odoo_settings_update_modules_before = before.clone();
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::for_site(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Instance {
        Instance {
            name: "br-123".into(),
            title: "Feature branch".into(),
            build_state: "OK".into(),
            duration: 12,
            note: "keep".into(),
            ..Instance::default()
        }
    }

    #[test]
    fn test_delta_applies_only_present_fields() {
        let mut row = sample_row();
        let delta = LiveDelta {
            name: "br-123".into(),
            build_state: Some("Building...".into()),
            duration: Some(0),
            ..LiveDelta::default()
        };

        delta.apply_to(&mut row);

        assert_eq!(row.build_state, "Building...");
        assert_eq!(row.duration, 0);
        assert_eq!(row.title, "Feature branch");
        assert_eq!(row.note, "keep");
    }

    #[test]
    fn test_delta_merge_is_idempotent() {
        let mut once = sample_row();
        let mut twice = sample_row();
        let delta = LiveDelta {
            name: "br-123".into(),
            build_state: Some("FAILED".into()),
            db_size_humanize: Some("2.1 GB".into()),
            ..LiveDelta::default()
        };

        delta.apply_to(&mut once);
        delta.apply_to(&mut twice);
        delta.apply_to(&mut twice);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_delta_deserializes_backend_identity_key() {
        let delta: LiveDelta =
            serde_json::from_str(r#"{"_id": "br-123", "build_state": "Scheduled"}"#).unwrap();
        assert_eq!(delta.name, "br-123");
        assert_eq!(delta.build_state.as_deref(), Some("Scheduled"));
        assert_eq!(delta.duration, None);
    }

    #[test]
    fn test_instance_ignores_unknown_wire_fields() {
        let row: Instance = serde_json::from_str(
            r#"{"name": "br-1", "archive": true, "repo_url": "https://example/x", "id": "abc"}"#,
        )
        .unwrap();
        assert_eq!(row.name, "br-1");
        assert!(row.archived);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = SitePatch {
            note: Some("new note".into()),
            ..SitePatch::for_site("br-1")
        };
        let json = serde_json::to_value(&patch).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["name"], "br-1");
        assert_eq!(obj["note"], "new note");
    }

    #[test]
    fn test_patch_archive_wire_name() {
        let patch = SitePatch {
            archived: Some(true),
            ..SitePatch::for_site("br-1")
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["archive"], true);
    }

    #[test]
    fn test_patch_apply_leaves_other_fields() {
        let mut row = sample_row();
        let patch = SitePatch {
            note: Some("changed".into()),
            ..SitePatch::for_site("br-123")
        };
        patch.apply_to(&mut row);
        assert_eq!(row.note, "changed");
        assert_eq!(row.title, "Feature branch");
        assert_eq!(row.build_state, "OK");
    }
}
