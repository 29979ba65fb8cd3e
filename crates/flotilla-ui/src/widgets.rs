use crate::app::StatusLevel;
use crate::colors::Theme;
use crate::detail::{DETAIL_FIELDS, DetailState};
use crate::forms::FormState;
use crate::users::{UserAdminState, UserForm, UsersPane};
use flotilla_core::{Instance, Permission};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, Widget},
};

const SPINNER_FRAMES: [char; 4] = ['◐', '◓', '◑', '◒'];

#[must_use]
pub fn spinner_char(tick: usize) -> char {
    SPINNER_FRAMES[(tick / 3) % SPINNER_FRAMES.len()]
}

/// Centered modal rect, clamped to the containing area.
#[must_use]
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

pub struct HeaderBar<'a> {
    pub resources: &'a str,
    pub permission: Permission,
    pub show_archived: bool,
    pub filter: &'a str,
    pub filter_active: bool,
    pub polling: bool,
    pub tick: usize,
    pub theme: &'a Theme,
}

impl Widget for HeaderBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(self.theme.primary))
            .style(Style::default().bg(self.theme.surface));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        let spinner = if self.polling {
            spinner_char(self.tick)
        } else {
            ' '
        };
        let mut title = vec![
            Span::styled(
                "FLEET CONSOLE",
                Style::default().fg(self.theme.primary).bold(),
            ),
            Span::raw("  "),
            Span::styled(
                format!("[{}]", self.permission.label()),
                Style::default().fg(self.theme.info),
            ),
            Span::raw("  "),
            Span::styled(spinner.to_string(), Style::default().fg(self.theme.dim)),
        ];
        if self.show_archived {
            title.push(Span::styled(
                "  archived shown",
                Style::default().fg(self.theme.warning),
            ));
        }
        if self.filter_active || !self.filter.is_empty() {
            title.push(Span::styled(
                format!("  filter: {}", self.filter),
                Style::default().fg(self.theme.secondary),
            ));
            if self.filter_active {
                title.push(Span::styled("▏", Style::default().fg(self.theme.fg)));
            }
        }

        let mut lines = vec![Line::from(title)];
        if inner.height > 1 {
            // Opaque backend fragment, replaced wholesale on each refresh.
            let resources = self.resources.lines().next().unwrap_or("");
            lines.push(Line::from(Span::styled(
                resources.to_string(),
                Style::default().fg(self.theme.dim),
            )));
        }
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}

pub struct FleetTable<'a> {
    pub rows: Vec<&'a Instance>,
    pub selected: Option<usize>,
    pub theme: &'a Theme,
}

impl Widget for FleetTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new(vec![
            "Name",
            "Title",
            "Build",
            "DB Size",
            "Source Size",
            "Duration [s]",
        ])
        .style(Style::default().fg(self.theme.secondary).bold());

        let rows: Vec<Row> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, instance)| {
                let style = if self.selected == Some(i) {
                    Style::default()
                        .bg(self.theme.highlight)
                        .fg(self.theme.fg)
                        .bold()
                } else {
                    Style::default().fg(self.theme.fg)
                };
                Row::new(vec![
                    Cell::from(instance.name.clone()),
                    Cell::from(instance.title.clone()),
                    Cell::from(instance.build_state.clone()).style(
                        Style::default().fg(self.theme.build_state_color(&instance.build_state)),
                    ),
                    Cell::from(instance.db_size_humanize.clone()),
                    Cell::from(instance.source_size_humanize.clone()),
                    Cell::from(instance.duration.to_string()),
                ])
                .style(style)
            })
            .collect();

        let empty = rows.is_empty();
        let table = Table::new(
            rows,
            [
                Constraint::Min(16),
                Constraint::Min(18),
                Constraint::Length(12),
                Constraint::Length(10),
                Constraint::Length(12),
                Constraint::Length(12),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.border))
                .style(Style::default().bg(self.theme.bg))
                .title(" Instances ")
                .title_style(Style::default().fg(self.theme.secondary)),
        );
        Widget::render(table, area, buf);

        if empty && area.height > 2 {
            let msg_area = Rect::new(area.x + 2, area.y + 2, area.width.saturating_sub(4), 1);
            Paragraph::new("No instances. Waiting for the first fleet reload...")
                .style(Style::default().fg(self.theme.dim))
                .render(msg_area, buf);
        }
    }
}

pub struct DetailPanel<'a> {
    pub record: &'a Instance,
    pub state: &'a DetailState,
    /// Whether the panel owns the cursor keys.
    pub active: bool,
    pub theme: &'a Theme,
}

impl DetailPanel<'_> {
    fn info_lines(&self) -> Vec<Line<'static>> {
        let label = Style::default().fg(self.theme.secondary);
        let value = Style::default().fg(self.theme.fg);
        let record = self.record;
        let mut lines = vec![
            Line::from(vec![
                Span::styled("Name        ", label),
                Span::styled(record.name.clone(), value.bold()),
            ]),
            Line::from(vec![
                Span::styled("Build       ", label),
                Span::styled(
                    record.build_state.clone(),
                    Style::default().fg(self.theme.build_state_color(&record.build_state)),
                ),
            ]),
            Line::from(vec![
                Span::styled("Registered  ", label),
                Span::styled(record.date_registered.clone(), value),
            ]),
            Line::from(vec![
                Span::styled("Updated     ", label),
                Span::styled(record.updated.clone(), value),
            ]),
            Line::from(vec![
                Span::styled("Author      ", label),
                Span::styled(record.git_author.clone(), value),
            ]),
            Line::from(vec![
                Span::styled("SHA         ", label),
                Span::styled(record.sha.clone(), value),
            ]),
        ];
        if !record.robot_result.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Robot       ", label),
                Span::styled(record.robot_result.clone(), value),
            ]));
        }
        lines
    }

    fn field_lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(Span::styled(
            "── editable (autosaved on change) ──".to_string(),
            Style::default().fg(self.theme.dim),
        ))];
        for (i, field) in DETAIL_FIELDS.iter().enumerate() {
            let under_cursor = self.active && self.state.cursor == i;
            let marker = if under_cursor { "▸ " } else { "  " };
            let shown = if under_cursor && self.state.editing.is_some() {
                format!(
                    "{}▏",
                    self.state.editing.clone().unwrap_or_default()
                )
            } else if field.is_bool() {
                if field.current_bool(self.record) {
                    "[x]".into()
                } else {
                    "[ ]".into()
                }
            } else {
                field.current_text(self.record).to_string()
            };
            let style = if under_cursor {
                Style::default().fg(self.theme.primary).bold()
            } else {
                Style::default().fg(self.theme.fg)
            };
            lines.push(Line::from(vec![
                Span::styled(marker.to_string(), Style::default().fg(self.theme.primary)),
                Span::styled(
                    format!("{:<26}", field.label()),
                    Style::default().fg(self.theme.secondary),
                ),
                Span::styled(shown, style),
            ]));
        }
        lines
    }
}

impl Widget for DetailPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = if self.active {
            self.theme.primary
        } else {
            self.theme.border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(self.theme.surface))
            .padding(Padding::new(1, 1, 0, 0))
            .title(format!(" {} ", self.record.name))
            .title_style(Style::default().fg(self.theme.primary).bold());
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        let mut lines = self.info_lines();
        lines.push(Line::raw(""));
        lines.extend(self.field_lines());
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}

pub struct StatusBar<'a> {
    pub message: Option<(&'a str, StatusLevel)>,
    pub hints: &'a [(&'a str, &'a str)],
    pub theme: &'a Theme,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let mut spans = Vec::new();
        if let Some((message, level)) = self.message {
            let color = match level {
                StatusLevel::Info => self.theme.info,
                StatusLevel::Success => self.theme.success,
                StatusLevel::Error => self.theme.error,
            };
            spans.push(Span::styled(
                format!(" {message} "),
                Style::default().fg(color),
            ));
            spans.push(Span::raw("  "));
        }
        for (key, desc) in self.hints {
            spans.push(Span::styled(
                format!(" {key} "),
                Style::default().fg(self.theme.bg).bg(self.theme.secondary),
            ));
            spans.push(Span::styled(
                format!(" {desc}  "),
                Style::default().fg(self.theme.dim),
            ));
        }
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(self.theme.surface))
            .render(area, buf);
    }
}

pub struct ConfirmDialog<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub theme: &'a Theme,
}

impl Widget for ConfirmDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dialog = centered_rect(56, 8, area);
        Clear.render(dialog, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(self.theme.warning))
            .style(Style::default().bg(self.theme.surface))
            .title(format!(" {} ", self.title))
            .title_style(Style::default().fg(self.theme.warning).bold());
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let lines = vec![
            Line::raw(""),
            Line::from(Span::styled(
                self.message.to_string(),
                Style::default().fg(self.theme.fg),
            )),
            Line::raw(""),
            Line::from(vec![
                Span::styled("[y]", Style::default().fg(self.theme.error).bold()),
                Span::styled(" confirm   ", Style::default().fg(self.theme.dim)),
                Span::styled("[n/Esc]", Style::default().fg(self.theme.success).bold()),
                Span::styled(" cancel", Style::default().fg(self.theme.dim)),
            ]),
        ];
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(ratatui::widgets::Wrap { trim: true })
            .render(inner, buf);
    }
}

pub struct FormDialog<'a> {
    pub form: &'a FormState,
    pub theme: &'a Theme,
}

impl Widget for FormDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = self.form.rows();
        let hint = self.form.hint();
        let height = u16::try_from(rows.len()).unwrap_or(u16::MAX).saturating_add(
            if hint.is_empty() { 5 } else { 7 },
        );
        let dialog = centered_rect(64, height, area);
        Clear.render(dialog, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(self.theme.primary))
            .style(Style::default().bg(self.theme.surface))
            .padding(Padding::new(1, 1, 0, 0))
            .title(format!(" {} ", self.form.title()))
            .title_style(Style::default().fg(self.theme.primary).bold());
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let mut lines = Vec::new();
        if !hint.is_empty() {
            lines.push(Line::from(Span::styled(
                hint.to_string(),
                Style::default().fg(self.theme.dim),
            )));
            lines.push(Line::raw(""));
        }
        for row in &rows {
            let style = if row.focused {
                Style::default().fg(self.theme.primary).bold()
            } else {
                Style::default().fg(self.theme.fg)
            };
            let marker = if row.focused { "▸ " } else { "  " };
            let mut value = row.value.clone();
            if row.focused && !row.is_checkbox {
                value.push('▏');
            }
            lines.push(Line::from(vec![
                Span::styled(marker.to_string(), Style::default().fg(self.theme.primary)),
                Span::styled(
                    format!("{:<28}", row.label),
                    Style::default().fg(self.theme.secondary),
                ),
                Span::styled(value, style),
            ]));
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(vec![
            Span::styled("[Enter]", Style::default().fg(self.theme.success).bold()),
            Span::styled(" OK   ", Style::default().fg(self.theme.dim)),
            Span::styled("[Esc]", Style::default().fg(self.theme.error).bold()),
            Span::styled(" Cancel   ", Style::default().fg(self.theme.dim)),
            Span::styled(
                "[Tab] next  [Space] toggle  [←/→] choose",
                Style::default().fg(self.theme.dim),
            ),
        ]));
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}

pub struct MenuOverlay<'a> {
    pub items: Vec<(&'a str, &'a str)>,
    pub selected: usize,
    pub theme: &'a Theme,
}

impl Widget for MenuOverlay<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = u16::try_from(self.items.len())
            .unwrap_or(u16::MAX)
            .saturating_add(2);
        let dialog = centered_rect(48, height, area);
        Clear.render(dialog, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.primary))
            .style(Style::default().bg(self.theme.surface))
            .title(" Commands ")
            .title_style(Style::default().fg(self.theme.primary).bold());
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let lines: Vec<Line> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, (_, label))| {
                if i == self.selected {
                    Line::from(Span::styled(
                        format!("▸ {label}"),
                        Style::default().fg(self.theme.primary).bold(),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("  {label}"),
                        Style::default().fg(self.theme.fg),
                    ))
                }
            })
            .collect();
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}

pub struct UsersScreen<'a> {
    pub state: &'a UserAdminState,
    pub theme: &'a Theme,
}

impl Widget for UsersScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let columns =
            Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(area);

        self.render_user_list(columns[0], buf);
        self.render_grants(columns[1], buf);
    }
}

impl UsersScreen<'_> {
    fn render_user_list(&self, area: Rect, buf: &mut Buffer) {
        let active = matches!(self.state.pane, None | Some(UsersPane::List));
        let border = if active {
            self.theme.primary
        } else {
            self.theme.border
        };
        let header =
            Row::new(vec!["Login", "Name", "Admin"]).style(Style::default().fg(self.theme.secondary).bold());
        let rows: Vec<Row> = self
            .state
            .users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let style = if i == self.state.selected {
                    Style::default().bg(self.theme.highlight).bold()
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(user.login.clone()),
                    Cell::from(user.name.clone()),
                    Cell::from(if user.is_admin { "yes" } else { "" }),
                ])
                .style(style.fg(self.theme.fg))
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Min(16),
                Constraint::Min(20),
                Constraint::Length(6),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .style(Style::default().bg(self.theme.bg))
                .title(" Users ")
                .title_style(Style::default().fg(self.theme.secondary)),
        );
        Widget::render(table, area, buf);
    }

    fn render_grants(&self, area: Rect, buf: &mut Buffer) {
        let active = matches!(self.state.pane, Some(UsersPane::Grants));
        let border = if active {
            self.theme.primary
        } else {
            self.theme.border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(self.theme.surface))
            .padding(Padding::new(1, 1, 0, 0))
            .title(" Allowed Sites ")
            .title_style(Style::default().fg(self.theme.secondary));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        let lines: Vec<Line> = self
            .state
            .grants
            .iter()
            .enumerate()
            .map(|(i, grant)| {
                let marker = if active && i == self.state.grant_cursor {
                    "▸ "
                } else {
                    "  "
                };
                let check = if grant.allowed { "[x]" } else { "[ ]" };
                Line::from(vec![
                    Span::styled(marker.to_string(), Style::default().fg(self.theme.primary)),
                    Span::styled(format!("{check} "), Style::default().fg(self.theme.fg)),
                    Span::styled(grant.name.clone(), Style::default().fg(self.theme.fg)),
                ])
            })
            .collect();
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}

pub struct UserFormDialog<'a> {
    pub form: &'a UserForm,
    pub theme: &'a Theme,
}

impl Widget for UserFormDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let dialog = centered_rect(54, 10, area);
        Clear.render(dialog, buf);
        let title = if self.form.is_new() {
            " New User "
        } else {
            " Edit User "
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(self.theme.primary))
            .style(Style::default().bg(self.theme.surface))
            .padding(Padding::new(1, 1, 0, 0))
            .title(title)
            .title_style(Style::default().fg(self.theme.primary).bold());
        let inner = block.inner(dialog);
        block.render(dialog, buf);

        let rows = [
            ("Login", self.form.login.clone(), false),
            ("Name", self.form.name.clone(), false),
            (
                "Is Admin",
                if self.form.is_admin {
                    "[x]".to_string()
                } else {
                    "[ ]".to_string()
                },
                true,
            ),
            ("Password", "•".repeat(self.form.password.len()), false),
        ];
        let mut lines = Vec::new();
        for (i, (label, value, is_checkbox)) in rows.into_iter().enumerate() {
            let focused = self.form.focus == i;
            let marker = if focused { "▸ " } else { "  " };
            let mut value = value;
            if focused && !is_checkbox {
                value.push('▏');
            }
            lines.push(Line::from(vec![
                Span::styled(marker.to_string(), Style::default().fg(self.theme.primary)),
                Span::styled(
                    format!("{label:<12}"),
                    Style::default().fg(self.theme.secondary),
                ),
                Span::styled(
                    value,
                    if focused {
                        Style::default().fg(self.theme.primary).bold()
                    } else {
                        Style::default().fg(self.theme.fg)
                    },
                ),
            ]));
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "[Enter] save   [Esc] cancel",
            Style::default().fg(self.theme.dim),
        )));
        Paragraph::new(lines)
            .style(Style::default().bg(self.theme.surface))
            .render(inner, buf);
    }
}
