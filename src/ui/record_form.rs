//! Multi-step record form screen

use std::collections::HashMap;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::api::Catalogs;
use crate::records::{FieldKind, FieldSpec, FieldValue};
use crate::session::{FormSession, SessionStatus};
use crate::ui::form_field::FormField;

/// What the app should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Close,
}

/// Value as shown on the review page: catalog and choice labels resolved
pub fn display_value(spec: &FieldSpec, value: &FieldValue, catalogs: &Catalogs) -> String {
    if value.is_empty() && spec.kind != FieldKind::Flag {
        return "—".to_string();
    }
    match spec.kind {
        FieldKind::Reference(kind) => match value.as_integer() {
            Some(id) => catalogs.resolve_label(kind, id),
            None => value.display(),
        },
        FieldKind::Choice => {
            let raw = value.display();
            spec.option_label(raw.trim())
                .map(str::to_string)
                .unwrap_or(raw)
        }
        FieldKind::Flag => {
            let on = value
                .as_bool()
                .or_else(|| spec.default.as_bool())
                .unwrap_or(false);
            let label = if on { "Sí" } else { "No" };
            label.to_string()
        }
        _ => value.display(),
    }
}

/// First index to draw so that `focused` fits within `available` rows
fn scroll_start(heights: &[u16], focused: usize, available: u16) -> usize {
    let Some(&focused_height) = heights.get(focused) else {
        return 0;
    };
    let mut start = focused;
    let mut total = focused_height;
    while start > 0 && total + heights[start - 1] <= available {
        start -= 1;
        total += heights[start];
    }
    start
}

pub struct RecordForm {
    widgets: HashMap<&'static str, FormField>,
    /// Index of the focused field within the current step
    focused_index: usize,
    /// Step the widgets were last laid out for
    step: usize,
    /// Controller focus target last acted on
    last_focus: Option<String>,
    review_scroll: u16,
}

impl RecordForm {
    pub fn new(session: &FormSession) -> Self {
        let controller = session.controller();
        let widgets = controller
            .schema()
            .fields
            .iter()
            .map(|spec| {
                let widget =
                    FormField::from_spec(spec, controller.value(spec.name), session.catalogs());
                (spec.name, widget)
            })
            .collect();

        Self {
            widgets,
            focused_index: 0,
            step: controller.current_step(),
            last_focus: None,
            review_scroll: 0,
        }
    }

    fn step_fields(session: &FormSession) -> Vec<&'static str> {
        let controller = session.controller();
        controller
            .schema()
            .steps
            .get(controller.current_step())
            .map(|s| s.fields.clone())
            .unwrap_or_default()
    }

    pub fn focused_field_name(&self, session: &FormSession) -> Option<&'static str> {
        Self::step_fields(session).get(self.focused_index).copied()
    }

    /// Follow step changes, focus requests and catalog arrivals
    pub fn sync(&mut self, session: &FormSession) {
        let controller = session.controller();
        let fields = Self::step_fields(session);

        if controller.current_step() != self.step {
            self.step = controller.current_step();
            self.focused_index = 0;
            self.review_scroll = 0;
        }

        let focus = controller.focus_target().map(str::to_string);
        if focus != self.last_focus {
            if let Some(index) = focus
                .as_deref()
                .and_then(|f| fields.iter().position(|n| *n == f))
            {
                self.focused_index = index;
            }
            self.last_focus = focus;
        }

        for spec in &controller.schema().fields {
            if let (FieldKind::Reference(kind), Some(widget)) =
                (spec.kind, self.widgets.get_mut(spec.name))
            {
                widget.update_catalog(session.catalogs().state(kind));
            }
        }
    }

    pub fn handle_key(&mut self, session: &mut FormSession, key: KeyEvent, now: Instant) -> FormAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let on_review = Self::step_fields(session).is_empty();

        match key.code {
            KeyCode::Esc => return FormAction::Close,
            KeyCode::Char('s') if ctrl => return FormAction::Submit,
            KeyCode::Enter if on_review => return FormAction::Submit,
            KeyCode::PageDown => {
                let _ = session.next_step();
            }
            KeyCode::Char('n') if ctrl => {
                let _ = session.next_step();
            }
            KeyCode::PageUp => {
                session.prev_step();
            }
            KeyCode::Char('p') if ctrl => {
                session.prev_step();
            }
            KeyCode::Tab => {
                let count = Self::step_fields(session).len();
                if self.focused_index + 1 < count {
                    self.focused_index += 1;
                }
            }
            KeyCode::BackTab => {
                self.focused_index = self.focused_index.saturating_sub(1);
            }
            KeyCode::Up if on_review => {
                self.review_scroll = self.review_scroll.saturating_sub(1);
            }
            KeyCode::Down if on_review => {
                self.review_scroll = self.review_scroll.saturating_add(1);
            }
            code => self.edit_focused(session, code, now),
        }

        self.sync(session);
        FormAction::None
    }

    fn edit_focused(&mut self, session: &mut FormSession, code: KeyCode, now: Instant) {
        let Some(name) = self.focused_field_name(session) else {
            return;
        };
        let Some(widget) = self.widgets.get_mut(name) else {
            return;
        };
        if !widget.handle_key(code) {
            return;
        }

        session.set_field(name, widget.value(), now);

        // show the sanitized value when the controller rewrote the input
        let stored = session.controller().value(name);
        if *stored != widget.value() && !(stored.is_empty() && widget.value().is_empty()) {
            widget.set_value(stored);
        }
    }

    pub fn render(&mut self, frame: &mut Frame, session: &FormSession) {
        let area = frame.area();
        let controller = session.controller();
        let schema = controller.schema();

        let title = match controller.record().id {
            Some(id) => format!(" Editar {} #{} ", schema.kind.label(), id),
            None => format!(" Nuevo {} ", schema.kind.label()),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let banner = self.banner_lines(session);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),                         // Step tabs
                Constraint::Length(1),                         // Progress
                Constraint::Min(4),                            // Fields or review
                Constraint::Length(banner.len() as u16),       // Messages
                Constraint::Length(1),                         // Footer
            ])
            .split(inner);

        let with_errors = controller.steps_with_errors();
        let titles: Vec<Line> = schema
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                if with_errors.contains(&i) {
                    Line::from(vec![
                        Span::raw(step.name),
                        Span::styled(" !", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                    ])
                } else {
                    Line::from(step.name)
                }
            })
            .collect();
        let tabs = Tabs::new(titles)
            .select(controller.current_step())
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .divider("│");
        frame.render_widget(tabs, chunks[0]);

        let percent = controller.progress_percent();
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .percent(u16::from(percent))
            .label(format!(
                "Paso {}/{} · {}%",
                controller.current_step() + 1,
                controller.total_steps(),
                percent
            ));
        frame.render_widget(gauge, chunks[1]);

        if Self::step_fields(session).is_empty() {
            self.render_review(frame, chunks[2], session);
        } else {
            self.render_fields(frame, chunks[2], session);
        }

        frame.render_widget(Paragraph::new(banner).wrap(Wrap { trim: true }), chunks[3]);

        let mut footer = vec![
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(" campo  "),
            Span::styled("PgDn/Ctrl+N", Style::default().fg(Color::Yellow)),
            Span::raw(" siguiente  "),
            Span::styled("PgUp/Ctrl+P", Style::default().fg(Color::Yellow)),
            Span::raw(" anterior  "),
            Span::styled("Ctrl+S", Style::default().fg(Color::Yellow)),
            Span::raw(" guardar  "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(" salir"),
        ];
        if controller.is_last_step() {
            footer.insert(0, Span::raw(" confirmar  "));
            footer.insert(0, Span::styled("Enter", Style::default().fg(Color::Yellow)));
        }
        frame.render_widget(
            Paragraph::new(Line::from(footer)).alignment(Alignment::Center),
            chunks[4],
        );
    }

    fn render_fields(&mut self, frame: &mut Frame, area: Rect, session: &FormSession) {
        let controller = session.controller();
        let names = Self::step_fields(session);

        // Label + field + optional error line + spacing
        let heights: Vec<u16> = names
            .iter()
            .map(|name| {
                let field = self.widgets.get(name).map(|w| w.render_height()).unwrap_or(1);
                let error = u16::from(controller.field_error(name).is_some());
                1 + field + error + 1
            })
            .collect();

        let start = scroll_start(&heights, self.focused_index, area.height);
        let mut y = area.y;

        for (idx, name) in names.iter().enumerate().skip(start) {
            let height = heights[idx];
            if y + height > area.y + area.height {
                break;
            }
            let (Some(spec), Some(widget)) = (controller.schema().field(name), self.widgets.get_mut(name))
            else {
                continue;
            };
            let is_focused = idx == self.focused_index;

            let required_marker = if spec.required { "*" } else { "" };
            let label_style = if is_focused {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let label = Paragraph::new(Line::from(vec![
                Span::styled(format!("{}{}", spec.label, required_marker), label_style),
                Span::raw(" "),
                Span::styled(spec.name, Style::default().fg(Color::DarkGray)),
            ]));
            frame.render_widget(label, Rect { y, height: 1, ..area });

            let input_height = widget.render_height();
            widget.render(frame, Rect { y: y + 1, height: input_height, ..area }, is_focused);

            if let Some(error) = controller.field_error(name) {
                let line = Paragraph::new(Span::styled(error, Style::default().fg(Color::Red)));
                frame.render_widget(line, Rect { y: y + 1 + input_height, height: 1, ..area });
            }

            y += height;
        }
    }

    fn render_review(&mut self, frame: &mut Frame, area: Rect, session: &FormSession) {
        let controller = session.controller();
        let schema = controller.schema();
        let mut lines = Vec::new();

        for (index, step) in schema.steps.iter().enumerate() {
            if step.fields.is_empty() {
                continue;
            }
            let header_style = if controller.steps_with_errors().contains(&index) {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            };
            lines.push(Line::from(Span::styled(step.name, header_style)));

            for name in &step.fields {
                let Some(spec) = schema.field(name) else {
                    continue;
                };
                let value = display_value(spec, controller.value(name), session.catalogs());
                lines.push(Line::from(vec![
                    Span::styled(format!("  {}: ", spec.label), Style::default().fg(Color::Gray)),
                    Span::raw(value),
                ]));
            }
            lines.push(Line::from(""));
        }

        let review = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((self.review_scroll, 0));
        frame.render_widget(review, area);
    }

    fn banner_lines(&self, session: &FormSession) -> Vec<Line<'static>> {
        let controller = session.controller();
        let mut lines = Vec::new();

        match session.status() {
            SessionStatus::Editing => {}
            SessionStatus::Submitting => lines.push(Line::from(Span::styled(
                "Guardando…",
                Style::default().fg(Color::Yellow),
            ))),
            SessionStatus::Saved(id) => {
                let text = match id {
                    Some(id) => format!("Guardado (#{}). Esc para salir.", id),
                    None => "Guardado. Esc para salir.".to_string(),
                };
                lines.push(Line::from(Span::styled(text, Style::default().fg(Color::Green))));
            }
            SessionStatus::Rejected => lines.push(Line::from(Span::styled(
                "El servidor rechazó algunos campos.",
                Style::default().fg(Color::Red),
            ))),
            SessionStatus::Failed(message) => lines.push(Line::from(Span::styled(
                format!("Error al guardar: {}", message),
                Style::default().fg(Color::Red),
            ))),
        }

        for message in controller.record_errors() {
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        if controller.has_errors_elsewhere() {
            let names: Vec<&str> = controller
                .steps_with_errors()
                .into_iter()
                .filter(|s| *s != controller.current_step())
                .filter_map(|s| controller.schema().steps.get(s).map(|d| d.name))
                .collect();
            lines.push(Line::from(Span::styled(
                format!("Hay errores en: {}", names.join(", ")),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CatalogEntry, CatalogKind, SubmitError};
    use crate::config::FormsConfig;
    use crate::records::RecordKind;
    use crate::storage::MemoryStore;
    use ratatui::{backend::TestBackend, Terminal};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn session() -> FormSession {
        FormSession::mount(
            RecordKind::Employee.schema(),
            None,
            Arc::new(MemoryStore::new()),
            &FormsConfig::default(),
        )
    }

    fn press(form: &mut RecordForm, session: &mut FormSession, code: KeyCode) -> FormAction {
        form.handle_key(session, KeyEvent::new(code, KeyModifiers::NONE), Instant::now())
    }

    fn type_text(form: &mut RecordForm, session: &mut FormSession, text: &str) {
        for c in text.chars() {
            press(form, session, KeyCode::Char(c));
        }
    }

    fn screen(form: &mut RecordForm, session: &FormSession) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| form.render(f, session)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_scroll_start_keeps_focus_visible() {
        let heights = [3, 3, 3, 3];
        assert_eq!(scroll_start(&heights, 0, 7), 0);
        assert_eq!(scroll_start(&heights, 3, 7), 2);
        assert_eq!(scroll_start(&heights, 3, 12), 0);
    }

    #[test]
    fn test_display_value_resolves_labels() {
        let schema = RecordKind::Employee.schema();
        let mut catalogs = Catalogs::new();
        catalogs.apply(
            CatalogKind::Departamentos,
            Ok(vec![CatalogEntry {
                id: 3,
                label: "Ventas".into(),
            }]),
        );

        let depto = schema.field("departamento_id").unwrap();
        assert_eq!(display_value(depto, &FieldValue::Integer(3), &catalogs), "Ventas");
        assert_eq!(display_value(depto, &FieldValue::Integer(8), &catalogs), "8");
        assert_eq!(display_value(depto, &FieldValue::Unset, &catalogs), "—");

        let genero = schema.field("genero").unwrap();
        assert_eq!(display_value(genero, &FieldValue::text("F"), &catalogs), "Femenino");

        let activo = schema.field("activo").unwrap();
        assert_eq!(display_value(activo, &FieldValue::Unset, &catalogs), "Sí");
    }

    #[test]
    fn test_typing_updates_session_and_gating_moves_focus() {
        let mut session = session();
        let mut form = RecordForm::new(&session);

        type_text(&mut form, &mut session, "E-1");
        press(&mut form, &mut session, KeyCode::Tab);
        press(&mut form, &mut session, KeyCode::Tab);
        type_text(&mut form, &mut session, "Ruiz");
        assert_eq!(form.focused_field_name(&session), Some("apellido_paterno"));

        press(&mut form, &mut session, KeyCode::PageDown);
        assert_eq!(session.controller().current_step(), 0);
        assert_eq!(form.focused_field_name(&session), Some("nombres"));

        type_text(&mut form, &mut session, "Ana");
        press(&mut form, &mut session, KeyCode::PageDown);
        assert_eq!(session.controller().current_step(), 1);
        assert_eq!(form.focused_field_name(&session), Some("rfc"));
    }

    #[test]
    fn test_sanitized_input_is_reflected_in_widget() {
        let mut session = session();
        let mut form = RecordForm::new(&session);
        session.go_to_step(1);
        form.sync(&session);

        type_text(&mut form, &mut session, "ab-c");
        assert_eq!(session.controller().value("rfc"), &FieldValue::text("ABC"));
        assert_eq!(form.widgets["rfc"].value(), FieldValue::text("ABC"));
    }

    #[test]
    fn test_review_enter_submits_and_esc_closes() {
        let mut session = session();
        let mut form = RecordForm::new(&session);
        session.go_to_step(6);
        form.sync(&session);

        assert_eq!(press(&mut form, &mut session, KeyCode::Enter), FormAction::Submit);
        assert_eq!(press(&mut form, &mut session, KeyCode::Esc), FormAction::Close);
    }

    #[test]
    fn test_render_marks_steps_with_server_errors() {
        let mut session = session();
        session.go_to_step(6);
        let mut errors = BTreeMap::new();
        errors.insert("clabe".to_string(), vec!["Inválida".to_string()]);
        session.finish_submit(Err(SubmitError::Fields(errors)));

        let mut form = RecordForm::new(&session);
        form.sync(&session);
        let text = screen(&mut form, &session);

        assert!(text.contains("Bancario !"));
        assert!(text.contains("Hay errores en: Bancario"));
        assert!(text.contains("Paso 7/7"));
    }
}
