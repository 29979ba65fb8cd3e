use crossterm::event::{KeyCode, KeyEvent};
use flotilla_core::{SiteGrant, User};

/// Which pane of the user-admin screen owns the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsersPane {
    List,
    Grants,
}

/// Edit/new-user modal form.
#[derive(Debug, Default)]
pub struct UserForm {
    /// Empty for a new user.
    pub id: String,
    pub login: String,
    pub name: String,
    pub is_admin: bool,
    pub password: String,
    pub focus: usize,
}

impl UserForm {
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            login: user.login.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
            password: String::new(),
            focus: 0,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Tab => self.focus = (self.focus + 1) % 4,
            KeyCode::Up | KeyCode::BackTab => self.focus = (self.focus + 3) % 4,
            KeyCode::Char(' ') if self.focus == 2 => self.is_admin = !self.is_admin,
            KeyCode::Char(c) => match self.focus {
                0 => self.login.push(c),
                1 => self.name.push(c),
                3 => self.password.push(c),
                _ => {}
            },
            KeyCode::Backspace => {
                match self.focus {
                    0 => self.login.pop(),
                    1 => self.name.pop(),
                    3 => self.password.pop(),
                    _ => None,
                };
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn submit(&self) -> User {
        User {
            id: self.id.clone(),
            login: self.login.trim().to_string(),
            name: self.name.trim().to_string(),
            is_admin: self.is_admin,
            password: self.password.clone(),
        }
    }
}

/// State of the user-admin screen: account list, per-user allowed-sites
/// grants and the optional edit form.
#[derive(Debug, Default)]
pub struct UserAdminState {
    pub users: Vec<User>,
    pub selected: usize,
    pub grants: Vec<SiteGrant>,
    pub grant_cursor: usize,
    pub pane: Option<UsersPane>,
    pub form: Option<UserForm>,
}

impl UserAdminState {
    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
        if self.selected >= self.users.len() {
            self.selected = self.users.len().saturating_sub(1);
        }
    }

    #[must_use]
    pub fn selected_user(&self) -> Option<&User> {
        self.users.get(self.selected)
    }

    pub fn set_grants(&mut self, grants: Vec<SiteGrant>) {
        self.grants = grants;
        self.grant_cursor = 0;
    }

    pub fn move_selection(&mut self, down: bool) -> bool {
        match self.pane.unwrap_or(UsersPane::List) {
            UsersPane::List => {
                let len = self.users.len();
                if len == 0 {
                    return false;
                }
                let before = self.selected;
                self.selected = if down {
                    (self.selected + 1).min(len - 1)
                } else {
                    self.selected.saturating_sub(1)
                };
                before != self.selected
            }
            UsersPane::Grants => {
                let len = self.grants.len();
                if len == 0 {
                    return false;
                }
                self.grant_cursor = if down {
                    (self.grant_cursor + 1).min(len - 1)
                } else {
                    self.grant_cursor.saturating_sub(1)
                };
                false
            }
        }
    }

    pub fn switch_pane(&mut self) {
        self.pane = Some(match self.pane.unwrap_or(UsersPane::List) {
            UsersPane::List => UsersPane::Grants,
            UsersPane::Grants => UsersPane::List,
        });
    }

    /// The grant under the cursor with its toggled value, for posting.
    #[must_use]
    pub fn toggled_grant(&self) -> Option<SiteGrant> {
        let grant = self.grants.get(self.grant_cursor)?;
        Some(SiteGrant {
            name: grant.name.clone(),
            allowed: !grant.allowed,
        })
    }

    /// Apply a confirmed toggle locally.
    pub fn apply_grant(&mut self, grant: &SiteGrant) {
        if let Some(row) = self.grants.iter_mut().find(|g| g.name == grant.name) {
            row.allowed = grant.allowed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_user_form_edit_roundtrip() {
        let user = User {
            id: "u1".into(),
            login: "kara".into(),
            name: "Kara".into(),
            is_admin: false,
            password: String::new(),
        };
        let mut form = UserForm::for_user(&user);
        assert!(!form.is_new());
        // toggle admin
        form.handle_key(key(KeyCode::Down));
        form.handle_key(key(KeyCode::Down));
        form.handle_key(key(KeyCode::Char(' ')));
        let saved = form.submit();
        assert!(saved.is_admin);
        assert_eq!(saved.login, "kara");
        assert!(saved.password.is_empty());
    }

    #[test]
    fn test_grant_toggle_flips_allowed() {
        let mut state = UserAdminState::default();
        state.set_grants(vec![
            SiteGrant {
                name: "br-1".into(),
                allowed: false,
            },
            SiteGrant {
                name: "br-2".into(),
                allowed: true,
            },
        ]);
        let toggled = state.toggled_grant().unwrap();
        assert_eq!(toggled.name, "br-1");
        assert!(toggled.allowed);

        state.apply_grant(&toggled);
        assert!(state.grants[0].allowed);
        assert!(state.grants[1].allowed);
    }

    #[test]
    fn test_selection_clamps_after_shrink() {
        let mut state = UserAdminState::default();
        state.set_users(vec![User::default(), User::default()]);
        state.selected = 1;
        state.set_users(vec![User::default()]);
        assert_eq!(state.selected, 0);
    }
}
