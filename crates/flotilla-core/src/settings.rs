use serde::{Deserialize, Serialize};

/// Fleet-wide settings edited through the app-settings form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub concurrent_builds: i64,
    pub default_merge_target: String,
    pub auto_create_new_branches: bool,
    pub odoo_settings: String,
    pub no_i18n: bool,
}

/// Console user account. `password` is write-only: it is sent when set and
/// never rendered back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub login: String,
    pub name: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// One (user, instance) allowed-sites grant, toggleable on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteGrant {
    pub name: String,
    pub allowed: bool,
}

/// One selectable snapshot as `possible_dumps` enumerates them: `id` is
/// the dump filename, `value` a display label with the modification date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOption {
    pub id: String,
    pub value: String,
}

/// Startup handshake payload carrying the session's permission level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartInfo {
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_settings_roundtrip() {
        let settings = AppSettings {
            concurrent_builds: 4,
            default_merge_target: "main".into(),
            auto_create_new_branches: true,
            odoo_settings: "[options]".into(),
            no_i18n: false,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_empty_password_not_serialized() {
        let user = User {
            id: "u1".into(),
            login: "kara".into(),
            name: "Kara".into(),
            is_admin: true,
            password: String::new(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["login"], "kara");
    }

    #[test]
    fn test_dump_option_wire_shape() {
        let option: DumpOption =
            serde_json::from_str(r#"{"id": "snap-2024-01", "value": "snap-2024-01 [2024-01-05]"}"#)
                .unwrap();
        assert_eq!(option.id, "snap-2024-01");
        assert!(option.value.starts_with("snap-2024-01"));
    }
}
