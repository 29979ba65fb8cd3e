use crate::forms::FormKind;
use flotilla_core::SessionContext;

/// Direct backend operations needing no extra parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectOp {
    Restart,
    Delete,
    ReloadRestart,
    BuildAgain { all: bool },
    TurnIntoDev,
    RunRobotTests,
    RestartDelegator,
    StartAll,
    Cleanup,
}

/// Backend pages the original console opened in a browser window. The
/// terminal console surfaces the URL instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    Start,
    Mails,
    Logs,
    BuildLog,
    Shell,
    Debug,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Fires straight through the gateway.
    Direct(DirectOp),
    /// Destructive: requires an explicit confirmation step first.
    Confirm(DirectOp, &'static str),
    /// Opens a parameterized form modal.
    Form(FormKind),
    /// Surfaces a backend page URL.
    OpenPage(PageKind),
    /// Switches to the user-admin screen.
    UsersScreen,
}

/// One named lifecycle command, addressable by its stable id.
#[derive(Clone, Copy, Debug)]
pub struct Command {
    pub id: &'static str,
    pub label: &'static str,
    pub admin_only: bool,
    /// Addressed to the focused instance; a no-op with nothing focused.
    pub needs_focus: bool,
    pub kind: CommandKind,
}

/// Maps stable command ids to behavior. Resolving an unknown id yields
/// `None` and dispatch degrades to a no-op, so stale menu data can never
/// crash the console.
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CommandRegistry {
    #[must_use]
    pub fn with_defaults() -> Self {
        use CommandKind::{Confirm, Direct, Form, OpenPage, UsersScreen};

        let commands = vec![
            Command {
                id: "settings",
                label: "Settings",
                admin_only: true,
                needs_focus: true,
                kind: Form(FormKind::Settings),
            },
            Command {
                id: "restart",
                label: "Restart",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::Restart),
            },
            Command {
                id: "delete_instance",
                label: "Destroy (unrecoverable)",
                admin_only: true,
                needs_focus: true,
                kind: Confirm(DirectOp::Delete, "Going to erase this instance."),
            },
            Command {
                id: "reload_restart",
                label: "Reload & Restart",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::ReloadRestart),
            },
            Command {
                id: "build_again",
                label: "Update recently changed modules",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::BuildAgain { all: false }),
            },
            Command {
                id: "build_again_all",
                label: "Update all modules",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::BuildAgain { all: true }),
            },
            Command {
                id: "rebuild",
                label: "Rebuild from Dump (Data lost)",
                admin_only: true,
                needs_focus: true,
                kind: Form(FormKind::Rebuild),
            },
            Command {
                id: "backup_db",
                label: "Make Database Dump",
                admin_only: true,
                needs_focus: true,
                kind: Form(FormKind::Backup),
            },
            Command {
                id: "turn_into_dev",
                label: "Apply Developer Settings",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::TurnIntoDev),
            },
            Command {
                id: "run_robot_tests",
                label: "Rerun Robot Tests",
                admin_only: true,
                needs_focus: true,
                kind: Direct(DirectOp::RunRobotTests),
            },
            Command {
                id: "restart_delegator",
                label: "Restart Delegator",
                admin_only: true,
                needs_focus: false,
                kind: Direct(DirectOp::RestartDelegator),
            },
            Command {
                id: "start_all",
                label: "Start All Docker Containers",
                admin_only: true,
                needs_focus: false,
                kind: Direct(DirectOp::StartAll),
            },
            Command {
                id: "delete_unused",
                label: "Spring Clean",
                admin_only: true,
                needs_focus: false,
                kind: Confirm(
                    DirectOp::Cleanup,
                    "Cleaning up intermediate docker images, unused networks/containers and unused databases.",
                ),
            },
            Command {
                id: "make_new_instance",
                label: "New Instance",
                admin_only: true,
                needs_focus: false,
                kind: Form(FormKind::Create),
            },
            Command {
                id: "appsettings",
                label: "App Settings",
                admin_only: true,
                needs_focus: false,
                kind: Form(FormKind::AppSettings),
            },
            Command {
                id: "fetch_dump",
                label: "Transform Input Dump",
                admin_only: true,
                needs_focus: false,
                kind: Form(FormKind::TransformDump),
            },
            Command {
                id: "users_admin",
                label: "Users",
                admin_only: true,
                needs_focus: false,
                kind: UsersScreen,
            },
            Command {
                id: "start_instance",
                label: "Open UI",
                admin_only: false,
                needs_focus: true,
                kind: OpenPage(PageKind::Start),
            },
            Command {
                id: "show_mails",
                label: "Mails",
                admin_only: false,
                needs_focus: true,
                kind: OpenPage(PageKind::Mails),
            },
            Command {
                id: "show_logs",
                label: "Live Log",
                admin_only: true,
                needs_focus: true,
                kind: OpenPage(PageKind::Logs),
            },
            Command {
                id: "build_log",
                label: "Build Log",
                admin_only: true,
                needs_focus: true,
                kind: OpenPage(PageKind::BuildLog),
            },
            Command {
                id: "shell",
                label: "Shell",
                admin_only: true,
                needs_focus: true,
                kind: OpenPage(PageKind::Shell),
            },
            Command {
                id: "debug",
                label: "Debug",
                admin_only: true,
                needs_focus: true,
                kind: OpenPage(PageKind::Debug),
            },
        ];

        Self { commands }
    }

    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.id == id)
    }

    /// Commands executable in the given session, for the command menu.
    pub fn available<'a>(
        &'a self,
        session: &'a SessionContext,
    ) -> impl Iterator<Item = &'a Command> {
        self.commands.iter().filter(move |command| {
            (!command.admin_only || session.is_admin())
                && (!command.needs_focus || session.focused().is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::Permission;

    #[test]
    fn test_unknown_id_resolves_to_none() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.resolve("definitely_not_registered").is_none());
    }

    #[test]
    fn test_destructive_commands_are_confirm_gated() {
        let registry = CommandRegistry::with_defaults();
        for id in ["delete_instance", "delete_unused"] {
            let command = registry.resolve(id).unwrap();
            assert!(
                matches!(command.kind, CommandKind::Confirm(_, _)),
                "{id} must require confirmation"
            );
        }
    }

    #[test]
    fn test_non_admin_session_sees_only_user_commands() {
        let registry = CommandRegistry::with_defaults();
        let mut session = SessionContext::default();
        session.focus("br-1");
        let ids: Vec<_> = registry.available(&session).map(|c| c.id).collect();
        assert_eq!(ids, vec!["start_instance", "show_mails"]);
    }

    #[test]
    fn test_focus_commands_hidden_without_focus() {
        let registry = CommandRegistry::with_defaults();
        let session = SessionContext {
            focused: None,
            permission: Permission::Admin,
        };
        assert!(
            registry
                .available(&session)
                .all(|command| !command.needs_focus)
        );
    }
}
