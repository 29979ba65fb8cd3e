use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Admin,
    User,
}

impl Permission {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Permission::Admin => "admin",
            Permission::User => "user",
        }
    }
}

/// Identity of the currently-focused instance plus the session's
/// permission level. Mutated only by row selection and the one-time
/// `start_info` fetch; every command handler reads its target from here.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub focused: Option<String>,
    pub permission: Permission,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            focused: None,
            permission: Permission::User,
        }
    }
}

impl SessionContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.permission == Permission::Admin
    }

    pub fn focus(&mut self, name: impl Into<String>) {
        self.focused = Some(name.into());
    }

    pub fn clear_focus(&mut self) {
        self.focused = None;
    }

    #[must_use]
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_is_unprivileged() {
        let session = SessionContext::default();
        assert!(!session.is_admin());
        assert_eq!(session.focused(), None);
    }

    #[test]
    fn test_focus_roundtrip() {
        let mut session = SessionContext::default();
        session.focus("br-123");
        assert_eq!(session.focused(), Some("br-123"));
        session.clear_focus();
        assert_eq!(session.focused(), None);
    }
}
