use crate::colors::{Theme, ThemeMode};
use crate::command::{CommandKind, CommandRegistry, DirectOp, PageKind};
use crate::detail::DetailState;
use crate::forms::{
    AppSettingsForm, BackupForm, CreateForm, FormKind, FormOutcome, FormState, FormSubmit,
    RebuildForm, SettingsForm, TransformForm,
};
use crate::users::{UserAdminState, UserForm, UsersPane};
use crate::widgets::{
    ConfirmDialog, DetailPanel, FleetTable, FormDialog, HeaderBar, MenuOverlay, StatusBar,
    UserFormDialog, UsersScreen,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use flotilla_client::{
    ClientConfig, ClientError, FleetEvent, Gateway, LivePoller, ResourcePoller,
};
use flotilla_core::{
    AppSettings, DumpOption, Instance, InstanceTable, Permission, SessionContext, SiteGrant,
    SitePatch, StartInfo, User,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
};
use serde_json::Value;
use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum UiError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug)]
struct StatusMessage {
    text: String,
    level: StatusLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Fleet,
    Users,
}

/// What a pending confirmation will do once the operator hits `y`.
#[derive(Debug)]
enum ConfirmAction {
    Fleet(DirectOp, Option<String>),
    DeleteUser(String),
}

enum Modal {
    Confirm {
        action: ConfirmAction,
        title: &'static str,
        prompt: String,
    },
    Form(FormState),
    Menu {
        items: Vec<(&'static str, &'static str)>,
        selected: usize,
    },
}

/// What to reload once a fire-and-forget command completes. Reloading at
/// completion, not at spawn time, keeps the follow-up GET from racing the
/// still-in-flight mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    None,
    /// Row existence may have changed; reload the fleet summary.
    Fleet,
    /// The user list has no poller to self-heal; reload it explicitly.
    Users,
}

/// Messages produced by spawned request tasks. Everything that mutates
/// console state arrives here and is applied on the event-loop task.
#[derive(Debug)]
pub enum Msg {
    SummaryLoaded(Result<Vec<Instance>, String>),
    DetailLoaded(Box<Result<Instance, String>>),
    StartInfo(Result<StartInfo, String>),
    DumpsLoaded(FormKind, Result<Vec<DumpOption>, String>),
    AppSettingsLoaded(Result<AppSettings, String>),
    /// A fire-and-forget command resolved.
    Done {
        action: &'static str,
        refresh: Refresh,
        result: Result<(), String>,
    },
    /// `update/site` acknowledged: merge exactly the sent fields back.
    PatchDone(Result<SitePatch, String>),
    TransformReady(Result<String, String>),
    UsersLoaded(Result<Vec<User>, String>),
    GrantsLoaded(Result<Vec<SiteGrant>, String>),
    GrantSaved(Result<SiteGrant, String>),
}

pub struct App {
    gateway: Arc<Gateway>,
    config: ClientConfig,
    pub table: InstanceTable,
    pub session: SessionContext,
    registry: CommandRegistry,
    pub screen: Screen,
    selected: usize,
    filter: String,
    filter_active: bool,
    show_archived: bool,
    resources: String,
    detail_record: Option<Instance>,
    detail: DetailState,
    detail_active: bool,
    users: UserAdminState,
    modal: Option<Modal>,
    status: Option<StatusMessage>,
    pub theme: Theme,
    theme_mode: ThemeMode,
    tick: usize,
    polling: bool,
    should_quit: bool,
    tx: mpsc::Sender<Msg>,
    rx: mpsc::Receiver<Msg>,
}

impl App {
    /// # Errors
    /// Returns `UiError` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, UiError> {
        let gateway = Arc::new(Gateway::new(&config)?);
        let (tx, rx) = mpsc::channel(100);
        let theme_mode = ThemeMode::detect();
        Ok(Self {
            gateway,
            config,
            table: InstanceTable::new(),
            session: SessionContext::default(),
            registry: CommandRegistry::with_defaults(),
            screen: Screen::Fleet,
            selected: 0,
            filter: String::new(),
            filter_active: false,
            show_archived: false,
            resources: String::new(),
            detail_record: None,
            detail: DetailState::default(),
            detail_active: false,
            users: UserAdminState::default(),
            modal: None,
            status: None,
            theme: Theme::for_mode(theme_mode),
            theme_mode,
            tick: 0,
            polling: false,
            should_quit: false,
            tx,
            rx,
        })
    }

    /// Run the console event loop until the operator quits.
    ///
    /// # Errors
    /// Returns `UiError` on terminal I/O failure.
    pub async fn run(&mut self) -> Result<(), UiError> {
        let mut terminal = setup_terminal()?;

        let (fleet_tx, mut fleet_rx) = mpsc::channel::<FleetEvent>(100);
        tokio::spawn(
            LivePoller::new(
                Arc::clone(&self.gateway),
                self.config.live_interval,
                fleet_tx.clone(),
            )
            .run(),
        );
        tokio::spawn(
            ResourcePoller::new(
                Arc::clone(&self.gateway),
                self.config.resource_interval,
                fleet_tx,
            )
            .run(),
        );
        self.polling = true;

        self.load_start_info();
        self.reload_summary();

        let tick_rate = Duration::from_millis(100);
        loop {
            self.drain_fleet_events(&mut fleet_rx);
            self.drain_messages();

            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(tick_rate)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key_event(key);
            }

            self.tick = self.tick.wrapping_add(1);

            if self.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    // --- background task plumbing ---

    fn drain_fleet_events(&mut self, fleet_rx: &mut mpsc::Receiver<FleetEvent>) {
        while let Ok(event) = fleet_rx.try_recv() {
            match event {
                FleetEvent::LiveDeltas(deltas) => {
                    self.table.apply_deltas(&deltas);
                    if let Some(record) = &mut self.detail_record {
                        for delta in &deltas {
                            if delta.name == record.name {
                                delta.apply_to(record);
                            }
                        }
                    }
                }
                FleetEvent::Resources(fragment) => self.resources = fragment,
                FleetEvent::PollFailed(reason) => {
                    self.set_status(format!("poll failed: {reason}"), StatusLevel::Error);
                }
            }
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.handle_message(msg);
        }
    }

    fn handle_message(&mut self, msg: Msg) {
        match msg {
            Msg::SummaryLoaded(Ok(rows)) => {
                info!(count = rows.len(), "fleet summary loaded");
                self.table.replace_all(rows);
                self.clamp_selection();
            }
            Msg::SummaryLoaded(Err(reason)) => {
                self.set_status(format!("reload failed: {reason}"), StatusLevel::Error);
            }
            Msg::DetailLoaded(result) => match *result {
                Ok(record) => {
                    self.table.replace_row(record.clone());
                    if self.session.focused() == Some(record.name.as_str()) {
                        self.detail_record = Some(record);
                    }
                    self.clamp_selection();
                }
                Err(reason) => {
                    self.set_status(format!("detail load failed: {reason}"), StatusLevel::Error);
                }
            },
            Msg::StartInfo(Ok(info)) => {
                self.session.permission = if info.is_admin {
                    Permission::Admin
                } else {
                    Permission::User
                };
            }
            Msg::StartInfo(Err(reason)) => {
                // Stay unprivileged when the probe fails.
                warn!("start_info failed: {reason}");
            }
            Msg::DumpsLoaded(kind, Ok(dumps)) => self.open_dump_form(kind, dumps),
            Msg::DumpsLoaded(_, Err(reason)) => {
                self.set_status(format!("loading dumps failed: {reason}"), StatusLevel::Error);
            }
            Msg::AppSettingsLoaded(Ok(settings)) => {
                self.modal = Some(Modal::Form(FormState::AppSettings(AppSettingsForm::new(
                    &settings,
                ))));
            }
            Msg::AppSettingsLoaded(Err(reason)) => {
                self.set_status(
                    format!("loading app settings failed: {reason}"),
                    StatusLevel::Error,
                );
            }
            Msg::Done {
                action,
                refresh,
                result: Ok(()),
            } => {
                self.set_status(format!("{action}: done"), StatusLevel::Success);
                match refresh {
                    Refresh::None => {}
                    Refresh::Fleet => self.reload_summary(),
                    Refresh::Users => self.load_users(),
                }
            }
            Msg::Done {
                action,
                result: Err(reason),
                ..
            } => {
                self.set_status(format!("{action} failed: {reason}"), StatusLevel::Error);
            }
            Msg::PatchDone(Ok(patch)) => {
                self.table.apply_patch(&patch);
                if let Some(record) = &mut self.detail_record
                    && record.name == patch.name
                {
                    patch.apply_to(record);
                }
                // A title change can shrink the filtered view.
                self.clamp_selection();
                self.set_status("saved".into(), StatusLevel::Success);
            }
            Msg::PatchDone(Err(reason)) => {
                self.set_status(format!("save failed: {reason}"), StatusLevel::Error);
            }
            Msg::TransformReady(Ok(live_url)) => {
                self.set_status(format!("dump ready: {live_url}"), StatusLevel::Success);
            }
            Msg::TransformReady(Err(reason)) => {
                self.set_status(format!("transform failed: {reason}"), StatusLevel::Error);
            }
            Msg::UsersLoaded(Ok(users)) => {
                self.users.set_users(users);
                self.load_grants_for_selection();
            }
            Msg::UsersLoaded(Err(reason)) => {
                self.set_status(format!("loading users failed: {reason}"), StatusLevel::Error);
            }
            Msg::GrantsLoaded(Ok(grants)) => self.users.set_grants(grants),
            Msg::GrantsLoaded(Err(reason)) => {
                self.set_status(
                    format!("loading user sites failed: {reason}"),
                    StatusLevel::Error,
                );
            }
            Msg::GrantSaved(Ok(grant)) => self.users.apply_grant(&grant),
            Msg::GrantSaved(Err(reason)) => {
                self.set_status(format!("grant change failed: {reason}"), StatusLevel::Error);
            }
        }
    }

    fn spawn_action<F>(&self, action: &'static str, refresh: Refresh, fut: F)
    where
        F: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = fut.await.map(|_| ()).map_err(|e| e.to_string());
            let _ = tx
                .send(Msg::Done {
                    action,
                    refresh,
                    result,
                })
                .await;
        });
    }

    fn reload_summary(&self) {
        let gateway = Arc::clone(&self.gateway);
        let archived = self.show_archived;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway
                .fleet_summary(None, archived)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(Msg::SummaryLoaded(result)).await;
        });
    }

    fn load_start_info(&self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.start_info().await.map_err(|e| e.to_string());
            let _ = tx.send(Msg::StartInfo(result)).await;
        });
    }

    fn load_detail(&self, name: String) {
        let gateway = Arc::clone(&self.gateway);
        let archived = self.show_archived;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match gateway.fleet_summary(Some(&name), archived).await {
                Ok(records) => records
                    .into_iter()
                    .next()
                    .ok_or_else(|| format!("no record for {name}")),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(Msg::DetailLoaded(Box::new(result))).await;
        });
    }

    fn load_users(&self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.users().await.map_err(|e| e.to_string());
            let _ = tx.send(Msg::UsersLoaded(result)).await;
        });
    }

    fn load_grants_for_selection(&self) {
        let Some(user) = self.users.selected_user() else {
            return;
        };
        let user_id = user.id.clone();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.user_sites(&user_id).await.map_err(|e| e.to_string());
            let _ = tx.send(Msg::GrantsLoaded(result)).await;
        });
    }

    fn send_patch(&self, patch: SitePatch) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match gateway.update_site(&patch).await {
                Ok(_) => Ok(patch),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(Msg::PatchDone(result)).await;
        });
    }

    // --- command dispatch ---

    /// Resolve and run a command by its stable id. Unknown ids, missing
    /// privileges and missing focus all degrade to a no-op.
    pub fn dispatch(&mut self, id: &str) {
        let Some(command) = self.registry.resolve(id).copied() else {
            return;
        };
        if command.admin_only && !self.session.is_admin() {
            return;
        }
        let target = self.session.focused().map(str::to_string);
        if command.needs_focus && target.is_none() {
            return;
        }

        match command.kind {
            CommandKind::Direct(op) => self.run_direct(op, target),
            CommandKind::Confirm(op, prompt) => {
                self.modal = Some(Modal::Confirm {
                    action: ConfirmAction::Fleet(op, target),
                    title: command.label,
                    prompt: prompt.to_string(),
                });
            }
            CommandKind::Form(kind) => self.open_form(kind),
            CommandKind::OpenPage(kind) => self.surface_page(kind, target),
            CommandKind::UsersScreen => {
                self.screen = Screen::Users;
                self.load_users();
            }
        }
    }

    fn run_direct(&mut self, op: DirectOp, target: Option<String>) {
        let gateway = Arc::clone(&self.gateway);
        match op {
            DirectOp::Restart => {
                let Some(name) = target else { return };
                self.spawn_action("restart", Refresh::None, async move {
                    gateway.restart_docker(&name).await
                });
            }
            DirectOp::Delete => {
                let Some(name) = target else { return };
                self.spawn_action("destroy", Refresh::Fleet, async move { gateway.delete(&name).await });
            }
            DirectOp::ReloadRestart => {
                let Some(name) = target else { return };
                self.spawn_action("reload & restart", Refresh::None, async move {
                    gateway.reload_restart(&name).await
                });
            }
            DirectOp::BuildAgain { all } => {
                let Some(name) = target else { return };
                self.spawn_action("update modules", Refresh::None, async move {
                    gateway.build_again(&name, all).await
                });
            }
            DirectOp::TurnIntoDev => {
                let Some(name) = target else { return };
                self.spawn_action("developer settings", Refresh::None, async move {
                    gateway.turn_into_dev(&name).await
                });
            }
            DirectOp::RunRobotTests => {
                let Some(name) = target else { return };
                self.spawn_action("robot tests", Refresh::None, async move {
                    gateway.run_robot_tests(&name).await
                });
            }
            DirectOp::RestartDelegator => {
                self.spawn_action("restart delegator", Refresh::None, async move {
                    gateway.restart_delegator().await
                });
            }
            DirectOp::StartAll => {
                self.spawn_action("start all", Refresh::None, async move { gateway.start_all().await });
            }
            DirectOp::Cleanup => {
                self.spawn_action("spring clean", Refresh::Fleet, async move { gateway.cleanup().await });
            }
        }
    }

    fn open_form(&mut self, kind: FormKind) {
        match kind {
            FormKind::Create => {
                self.modal = Some(Modal::Form(FormState::Create(CreateForm::default())));
            }
            FormKind::Backup => {
                self.modal = Some(Modal::Form(FormState::Backup(BackupForm::default())));
            }
            // Forms with a dump combo open once the list arrives.
            FormKind::Rebuild | FormKind::Settings | FormKind::TransformDump => {
                let gateway = Arc::clone(&self.gateway);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = if kind == FormKind::TransformDump {
                        gateway.possible_input_dumps().await
                    } else {
                        gateway.possible_dumps().await
                    }
                    .map_err(|e| e.to_string());
                    let _ = tx.send(Msg::DumpsLoaded(kind, result)).await;
                });
            }
            FormKind::AppSettings => {
                let gateway = Arc::clone(&self.gateway);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = gateway.app_settings().await.map_err(|e| e.to_string());
                    let _ = tx.send(Msg::AppSettingsLoaded(result)).await;
                });
            }
        }
    }

    fn open_dump_form(&mut self, kind: FormKind, dumps: Vec<DumpOption>) {
        let form = match kind {
            FormKind::Rebuild => FormState::Rebuild(RebuildForm::new(dumps)),
            FormKind::TransformDump => FormState::Transform(TransformForm::new(dumps)),
            FormKind::Settings => {
                let Some(record) = self.focused_record() else {
                    return;
                };
                FormState::Settings(SettingsForm::new(&record, dumps))
            }
            _ => return,
        };
        self.modal = Some(Modal::Form(form));
    }

    fn surface_page(&mut self, kind: PageKind, target: Option<String>) {
        let Some(name) = target else { return };
        let url = match kind {
            PageKind::Start => self.gateway.start_url(&name),
            PageKind::Mails => self.gateway.mails_url(&name),
            PageKind::Logs => self.gateway.logs_url(&name),
            PageKind::BuildLog => self.gateway.build_log_url(&name),
            PageKind::Shell => self.gateway.shell_url(&name),
            PageKind::Debug => self.gateway.debug_url(&name),
        };
        self.set_status(url, StatusLevel::Info);
    }

    fn submit_form(&mut self, submit: FormSubmit) {
        let gateway = Arc::clone(&self.gateway);
        let target = self.session.focused().map(str::to_string);
        match submit {
            FormSubmit::Create { name } => {
                self.spawn_action("create instance", Refresh::Fleet, async move {
                    gateway.create_instance(&name).await
                });
            }
            FormSubmit::Backup { dumpname } => {
                let Some(name) = target else { return };
                self.spawn_action("backup", Refresh::None, async move {
                    gateway.backup(&name, &dumpname).await
                });
            }
            FormSubmit::Rebuild {
                dump,
                no_cache,
                no_module_update,
            } => {
                let Some(name) = target else { return };
                self.spawn_action("rebuild", Refresh::None, async move {
                    gateway
                        .rebuild(&name, dump.as_deref(), no_cache, no_module_update)
                        .await
                });
            }
            FormSubmit::Transform {
                dump,
                anonymize,
                erase,
            } => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = gateway
                        .transform_input_dump(&dump, anonymize, erase)
                        .await
                        .map(|r| r.live_url)
                        .map_err(|e| e.to_string());
                    let _ = tx.send(Msg::TransformReady(result)).await;
                });
            }
            FormSubmit::Settings(patch) => self.send_patch(patch),
            FormSubmit::AppSettings(settings) => {
                self.spawn_action("app settings", Refresh::None, async move {
                    gateway.set_app_settings(&settings).await
                });
            }
        }
    }

    fn run_confirmed(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::Fleet(op, target) => self.run_direct(op, target),
            ConfirmAction::DeleteUser(id) => {
                let gateway = Arc::clone(&self.gateway);
                self.spawn_action("delete user", Refresh::Users, async move {
                    gateway.delete_user(&id).await
                });
            }
        }
    }

    // --- key handling ---

    fn handle_key_event(&mut self, key: KeyEvent) {
        let is_ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if is_ctrl && matches!(key.code, KeyCode::Char('c' | 'q')) {
            self.should_quit = true;
            return;
        }

        if self.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }

        if self.filter_active {
            self.handle_filter_key(key);
            return;
        }

        match self.screen {
            Screen::Fleet => self.handle_fleet_key(key),
            Screen::Users => self.handle_users_key(key),
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(mut modal) = self.modal.take() else {
            return;
        };
        match &mut modal {
            Modal::Confirm { .. } => match key.code {
                KeyCode::Char('y' | 'Y') => {
                    if let Modal::Confirm { action, .. } = modal {
                        self.run_confirmed(action);
                    }
                    return;
                }
                KeyCode::Char('n' | 'N') | KeyCode::Esc => return,
                _ => {}
            },
            Modal::Form(form) => match form.handle_key(key) {
                FormOutcome::Continue => {}
                FormOutcome::Cancel => return,
                FormOutcome::Submit(submit) => {
                    self.submit_form(submit);
                    return;
                }
            },
            Modal::Menu { items, selected } => match key.code {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => {
                    if *selected + 1 < items.len() {
                        *selected += 1;
                    }
                }
                KeyCode::Enter => {
                    let id = items.get(*selected).map(|(id, _)| *id);
                    if let Some(id) = id {
                        self.dispatch(id);
                    }
                    return;
                }
                KeyCode::Esc => return,
                _ => {}
            },
        }
        self.modal = Some(modal);
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.filter_active = false;
                self.clamp_selection();
            }
            KeyCode::Char(c) => {
                self.filter.push(c);
                self.clamp_selection();
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.clamp_selection();
            }
            _ => {}
        }
    }

    fn handle_fleet_key(&mut self, key: KeyEvent) {
        if self.detail_active {
            self.handle_detail_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('t') => {
                self.theme_mode = self.theme_mode.toggle();
                self.theme = Theme::for_mode(self.theme_mode);
            }
            KeyCode::Up => self.select(-1),
            KeyCode::Down => self.select(1),
            KeyCode::Char('/') => self.filter_active = true,
            KeyCode::Char('a') => {
                self.show_archived = !self.show_archived;
                self.reload_summary();
            }
            KeyCode::Char('r') => self.reload_summary(),
            KeyCode::Char('e') => {
                if self.detail_record.is_some() && self.session.is_admin() {
                    self.detail_active = true;
                }
            }
            KeyCode::Char('m') | KeyCode::Enter => self.open_menu(),
            KeyCode::Char('u') => self.dispatch("users_admin"),
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let Some(record) = self.detail_record.clone() else {
            self.detail_active = false;
            return;
        };

        if self.detail.editing.is_some() {
            match key.code {
                KeyCode::Enter => {
                    if let Some(patch) = self.detail.commit_editing(&record) {
                        self.send_patch(patch);
                    }
                }
                KeyCode::Esc => self.detail.cancel_editing(),
                KeyCode::Char(c) => self.detail.push_char(c),
                KeyCode::Backspace => self.detail.pop_char(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.detail_active = false,
            KeyCode::Up => self.detail.move_cursor(false),
            KeyCode::Down => self.detail.move_cursor(true),
            KeyCode::Char(' ') => {
                if let Some(patch) = self.detail.toggle_patch(&record) {
                    self.send_patch(patch);
                }
            }
            KeyCode::Enter => self.detail.start_editing(&record),
            _ => {}
        }
    }

    fn handle_users_key(&mut self, key: KeyEvent) {
        if let Some(form) = self.users.form.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let user = form.submit();
                    self.users.form = None;
                    let gateway = Arc::clone(&self.gateway);
                    self.spawn_action("save user", Refresh::Users, async move {
                        gateway.save_user(&user).await
                    });
                }
                KeyCode::Esc => self.users.form = None,
                _ => form.handle_key(key),
            }
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.screen = Screen::Fleet;
                self.users.pane = None;
            }
            KeyCode::Up => {
                if self.users.move_selection(false) {
                    self.load_grants_for_selection();
                }
            }
            KeyCode::Down => {
                if self.users.move_selection(true) {
                    self.load_grants_for_selection();
                }
            }
            KeyCode::Tab => self.users.switch_pane(),
            KeyCode::Char(' ') => {
                if matches!(self.users.pane, Some(UsersPane::Grants))
                    && let Some(grant) = self.users.toggled_grant()
                    && let Some(user) = self.users.selected_user()
                {
                    let user_id = user.id.clone();
                    let gateway = Arc::clone(&self.gateway);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = match gateway
                            .set_user_site(&user_id, &grant.name, grant.allowed)
                            .await
                        {
                            Ok(_) => Ok(grant),
                            Err(e) => Err(e.to_string()),
                        };
                        let _ = tx.send(Msg::GrantSaved(result)).await;
                    });
                }
            }
            KeyCode::Char('n') => self.users.form = Some(UserForm::default()),
            KeyCode::Enter => {
                if let Some(user) = self.users.selected_user() {
                    self.users.form = Some(UserForm::for_user(user));
                }
            }
            KeyCode::Char('d') => {
                if let Some(user) = self.users.selected_user() {
                    self.modal = Some(Modal::Confirm {
                        action: ConfirmAction::DeleteUser(user.id.clone()),
                        title: "Delete User",
                        prompt: format!("Going to delete user {}.", user.login),
                    });
                }
            }
            _ => {}
        }
    }

    fn open_menu(&mut self) {
        let items: Vec<(&'static str, &'static str)> = self
            .registry
            .available(&self.session)
            .map(|command| (command.id, command.label))
            .collect();
        if !items.is_empty() {
            self.modal = Some(Modal::Menu { items, selected: 0 });
        }
    }

    // --- selection & view state ---

    fn filtered_rows(&self) -> Vec<&Instance> {
        let needle = self.filter.to_lowercase();
        self.table
            .rows()
            .iter()
            .filter(|row| {
                needle.is_empty()
                    || row.name.to_lowercase().contains(&needle)
                    || row.title.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn select(&mut self, step: i32) {
        let rows = self.filtered_rows();
        if rows.is_empty() {
            return;
        }
        let last = rows.len() - 1;
        let selected = if step < 0 {
            self.selected.saturating_sub(1)
        } else {
            (self.selected + 1).min(last)
        };
        let name = rows[selected].name.clone();
        drop(rows);
        self.selected = selected;
        self.focus_row(name);
    }

    fn focus_row(&mut self, name: String) {
        if self.session.focused() == Some(name.as_str()) {
            return;
        }
        self.session.focus(name.clone());
        self.detail_record = self.table.get(&name).cloned();
        self.detail = DetailState::default();
        self.load_detail(name);
    }

    fn clamp_selection(&mut self) {
        let rows = self.filtered_rows();
        if rows.is_empty() {
            self.selected = 0;
            self.session.clear_focus();
            self.detail_record = None;
            self.detail_active = false;
            return;
        }
        let selected = self.selected.min(rows.len() - 1);
        let name = rows[selected].name.clone();
        drop(rows);
        self.selected = selected;
        if self.session.focused() != Some(name.as_str()) {
            self.focus_row(name);
        } else if let Some(fresh) = self.table.get(&name) {
            self.detail_record = Some(fresh.clone());
        }
    }

    fn set_status(&mut self, text: String, level: StatusLevel) {
        self.status = Some(StatusMessage { text, level });
    }

    /// Include archived instances in summary reloads from the start.
    pub fn set_show_archived(&mut self, show: bool) {
        self.show_archived = show;
    }

    // --- rendering ---

    fn draw(&self, frame: &mut Frame) {
        let [header_area, main_area, status_area] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(
            HeaderBar {
                resources: &self.resources,
                permission: self.session.permission,
                show_archived: self.show_archived,
                filter: &self.filter,
                filter_active: self.filter_active,
                polling: self.polling,
                tick: self.tick,
                theme: &self.theme,
            },
            header_area,
        );

        match self.screen {
            Screen::Fleet => self.draw_fleet(frame, main_area),
            Screen::Users => {
                frame.render_widget(
                    UsersScreen {
                        state: &self.users,
                        theme: &self.theme,
                    },
                    main_area,
                );
                if let Some(form) = &self.users.form {
                    frame.render_widget(
                        UserFormDialog {
                            form,
                            theme: &self.theme,
                        },
                        main_area,
                    );
                }
            }
        }

        frame.render_widget(
            StatusBar {
                message: self
                    .status
                    .as_ref()
                    .map(|status| (status.text.as_str(), status.level)),
                hints: self.hints(),
                theme: &self.theme,
            },
            status_area,
        );

        match &self.modal {
            Some(Modal::Confirm { title, prompt, .. }) => {
                frame.render_widget(
                    ConfirmDialog {
                        title,
                        message: prompt,
                        theme: &self.theme,
                    },
                    frame.area(),
                );
            }
            Some(Modal::Form(form)) => {
                frame.render_widget(
                    FormDialog {
                        form,
                        theme: &self.theme,
                    },
                    frame.area(),
                );
            }
            Some(Modal::Menu { items, selected }) => {
                frame.render_widget(
                    MenuOverlay {
                        items: items.clone(),
                        selected: *selected,
                        theme: &self.theme,
                    },
                    frame.area(),
                );
            }
            None => {}
        }
    }

    fn draw_fleet(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let rows = self.filtered_rows();
        if let Some(record) = &self.detail_record {
            let [table_area, detail_area] =
                Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .areas(area);
            frame.render_widget(
                FleetTable {
                    rows,
                    selected: Some(self.selected),
                    theme: &self.theme,
                },
                table_area,
            );
            frame.render_widget(
                DetailPanel {
                    record,
                    state: &self.detail,
                    active: self.detail_active,
                    theme: &self.theme,
                },
                detail_area,
            );
        } else {
            frame.render_widget(
                FleetTable {
                    rows,
                    selected: Some(self.selected),
                    theme: &self.theme,
                },
                area,
            );
        }
    }

    fn hints(&self) -> &'static [(&'static str, &'static str)] {
        if self.modal.is_some() {
            return &[];
        }
        match self.screen {
            Screen::Fleet if self.detail_active => &[
                ("↑/↓", "field"),
                ("Space", "toggle"),
                ("Enter", "edit"),
                ("Esc", "back"),
            ],
            Screen::Fleet => &[
                ("↑/↓", "select"),
                ("m", "commands"),
                ("e", "edit"),
                ("/", "filter"),
                ("a", "archived"),
                ("q", "quit"),
            ],
            Screen::Users => &[
                ("↑/↓", "select"),
                ("Tab", "pane"),
                ("n", "new"),
                ("d", "delete"),
                ("Esc", "back"),
            ],
        }
    }

    fn focused_record(&self) -> Option<Instance> {
        self.detail_record.clone().or_else(|| {
            self.session
                .focused()
                .and_then(|name| self.table.get(name).cloned())
        })
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, UiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), UiError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(ClientConfig::new("http://localhost:8000/cicd/")).unwrap()
    }

    fn seed(app: &mut App, names: &[&str]) {
        app.table.replace_all(
            names
                .iter()
                .map(|name| Instance {
                    name: (*name).into(),
                    ..Instance::default()
                })
                .collect(),
        );
    }

    #[test]
    fn test_dispatch_unknown_id_is_noop() {
        let mut app = app();
        app.session.permission = Permission::Admin;
        app.dispatch("definitely_not_a_command");
        assert!(app.modal.is_none());
        assert!(app.status.is_none());
    }

    #[test]
    fn test_dispatch_admin_command_denied_for_user() {
        let mut app = app();
        app.session.focus("br-1");
        app.dispatch("delete_instance");
        assert!(app.modal.is_none());
    }

    #[test]
    fn test_destroy_requires_confirmation() {
        let mut app = app();
        app.session.permission = Permission::Admin;
        app.session.focus("br-1");
        app.dispatch("delete_instance");
        assert!(matches!(
            app.modal,
            Some(Modal::Confirm {
                action: ConfirmAction::Fleet(DirectOp::Delete, _),
                ..
            })
        ));
    }

    #[test]
    fn test_open_page_surfaces_url_in_status() {
        let mut app = app();
        app.session.focus("br-1");
        app.dispatch("start_instance");
        let status = app.status.unwrap();
        assert_eq!(status.level, StatusLevel::Info);
        assert!(status.text.contains("start?name=br-1"));
    }

    #[test]
    fn test_filter_narrows_rows() {
        let mut app = app();
        seed(&mut app, &["br-feature-x", "br-hotfix", "main"]);
        app.filter = "br-".into();
        let names: Vec<_> = app.filtered_rows().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["br-feature-x", "br-hotfix"]);
    }

    #[tokio::test]
    async fn test_selection_clamps_when_filter_shrinks_list() {
        let mut app = app();
        seed(&mut app, &["br-1", "br-2", "br-3"]);
        app.selected = 2;
        app.filter = "br-1".into();
        app.clamp_selection();
        assert_eq!(app.selected, 0);
        assert_eq!(app.session.focused(), Some("br-1"));
    }

    #[test]
    fn test_live_delta_updates_open_detail_panel() {
        let mut app = app();
        seed(&mut app, &["br-1"]);
        app.session.focus("br-1");
        app.detail_record = app.table.get("br-1").cloned();

        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(FleetEvent::LiveDeltas(vec![flotilla_core::LiveDelta {
            name: "br-1".into(),
            build_state: Some("Building...".into()),
            ..flotilla_core::LiveDelta::default()
        }]))
        .unwrap();
        app.drain_fleet_events(&mut rx);

        assert_eq!(app.detail_record.unwrap().build_state, "Building...");
        assert_eq!(app.table.get("br-1").unwrap().build_state, "Building...");
    }

    #[tokio::test]
    async fn test_patch_ack_merges_only_sent_fields() {
        let mut app = app();
        seed(&mut app, &["br-1"]);
        app.table.apply_patch(&SitePatch {
            title: Some("settled".into()),
            ..SitePatch::for_site("br-1")
        });

        app.handle_message(Msg::PatchDone(Ok(SitePatch {
            note: Some("late ack".into()),
            ..SitePatch::for_site("br-1")
        })));

        let row = app.table.get("br-1").unwrap();
        assert_eq!(row.note, "late ack");
        assert_eq!(row.title, "settled");
    }

    #[tokio::test]
    async fn test_save_user_completion_reloads_user_list() {
        // The follow-up GET must fire on completion, not at spawn time,
        // so it cannot resolve against pre-mutation state.
        let mut app = App::new(ClientConfig::new("http://127.0.0.1:1/cicd")).unwrap();
        app.handle_message(Msg::Done {
            action: "save user",
            refresh: Refresh::Users,
            result: Ok(()),
        });
        match app.rx.recv().await {
            Some(Msg::UsersLoaded(_)) => {}
            other => panic!("expected a user-list reload, got {other:?}"),
        }

        app.handle_message(Msg::Done {
            action: "restart",
            refresh: Refresh::None,
            result: Ok(()),
        });
        assert!(app.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_patch_ack_reclamps_filtered_selection() {
        let mut app = app();
        app.table.replace_all(vec![
            Instance {
                name: "br-1".into(),
                title: "alpha one".into(),
                ..Instance::default()
            },
            Instance {
                name: "br-2".into(),
                title: "alpha two".into(),
                ..Instance::default()
            },
        ]);
        app.filter = "alpha".into();
        app.selected = 1;

        // The acknowledged title change drops br-2 out of the filter.
        app.handle_message(Msg::PatchDone(Ok(SitePatch {
            title: Some("beta".into()),
            ..SitePatch::for_site("br-2")
        })));

        assert_eq!(app.selected, 0);
        let rows = app.filtered_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "br-1");
    }

    #[test]
    fn test_poll_failure_surfaces_without_clearing_table() {
        let mut app = app();
        seed(&mut app, &["br-1"]);
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(FleetEvent::PollFailed("connection refused".into()))
            .unwrap();
        app.drain_fleet_events(&mut rx);

        assert_eq!(app.table.len(), 1);
        let status = app.status.unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status.text.contains("connection refused"));
    }

    #[test]
    fn test_start_info_promotes_session() {
        let mut app = app();
        app.handle_message(Msg::StartInfo(Ok(StartInfo { is_admin: true })));
        assert!(app.session.is_admin());
        app.handle_message(Msg::StartInfo(Err("boom".into())));
        assert!(app.session.is_admin()); // a failed probe never demotes
    }

    #[test]
    fn test_menu_lists_only_available_commands() {
        let mut app = app();
        app.session.focus("br-1");
        app.open_menu();
        match &app.modal {
            Some(Modal::Menu { items, .. }) => {
                let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
                assert_eq!(ids, vec!["start_instance", "show_mails"]);
            }
            other => panic!("expected menu, got {:?}", other.is_some()),
        }
    }
}
