//! Input widgets for record form fields

use crossterm::event::KeyCode;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

use crate::api::{CatalogState, Catalogs};
use crate::records::{FieldKind, FieldSpec, FieldValue, Sanitizer};

/// One selectable option: stored value and display label
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: FieldValue,
    pub label: String,
}

/// A form field widget that can handle different input types
pub enum FormField {
    /// Single-line text input
    TextInput {
        value: String,
        /// Cursor position in characters
        cursor_pos: usize,
        placeholder: String,
        max_length: Option<usize>,
    },
    /// Multi-line text input using tui-textarea
    TextArea {
        textarea: Box<TextArea<'static>>,
        placeholder: String,
    },
    /// Selection from declared choices or a catalog
    Select {
        options: Vec<SelectOption>,
        selected: usize,
        list_state: ListState,
        /// Shown instead of the list while the catalog is loading
        pending: bool,
    },
    /// Boolean toggle
    Toggle {
        value: bool,
        true_label: String,
        false_label: String,
    },
    /// Date input (YYYY-MM-DD format)
    DateInput { value: String, cursor_pos: usize },
}

fn byte_index(value: &str, char_pos: usize) -> usize {
    value
        .char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(value.len())
}

/// Leading "none" option followed by `entries`, keeping an unknown current id
fn select_options(entries: Vec<SelectOption>, current: &FieldValue) -> Vec<SelectOption> {
    let mut options = vec![SelectOption {
        value: FieldValue::Unset,
        label: "—".to_string(),
    }];
    options.extend(entries);

    if !current.is_empty() && !options.iter().any(|o| same_choice(&o.value, current)) {
        options.push(SelectOption {
            value: current.clone(),
            label: current.display(),
        });
    }
    options
}

fn same_choice(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_integer(), b.as_integer()) {
        (Some(x), Some(y)) => x == y,
        _ => a.display() == b.display() && a.is_empty() == b.is_empty(),
    }
}

impl FormField {
    /// Create a widget for `spec` showing `value`
    pub fn from_spec(spec: &FieldSpec, value: &FieldValue, catalogs: &Catalogs) -> Self {
        match spec.kind {
            FieldKind::ShortText | FieldKind::Email | FieldKind::Numeric => {
                let value = value.display();
                let max_length = spec.sanitizer.map(|s| match s {
                    Sanitizer::UpperAlnum(max) | Sanitizer::Digits(max) => max,
                });
                FormField::TextInput {
                    cursor_pos: value.chars().count(),
                    value,
                    placeholder: spec.label.to_string(),
                    max_length,
                }
            }
            FieldKind::LongText => {
                let mut textarea = TextArea::default();
                textarea.insert_str(value.display());
                FormField::TextArea {
                    textarea: Box::new(textarea),
                    placeholder: spec.label.to_string(),
                }
            }
            FieldKind::Choice => {
                let entries = spec
                    .options
                    .iter()
                    .map(|o| SelectOption {
                        value: FieldValue::text(o.value),
                        label: o.label.to_string(),
                    })
                    .collect();
                Self::select(select_options(entries, value), value, false)
            }
            FieldKind::Reference(kind) => {
                let (entries, pending) = match catalogs.state(kind) {
                    Some(CatalogState::Loaded(entries)) => (
                        entries
                            .iter()
                            .map(|e| SelectOption {
                                value: FieldValue::Integer(e.id),
                                label: e.label.clone(),
                            })
                            .collect(),
                        false,
                    ),
                    Some(CatalogState::Pending) => (Vec::new(), true),
                    _ => (Vec::new(), false),
                };
                Self::select(select_options(entries, value), value, pending)
            }
            FieldKind::Flag => FormField::Toggle {
                value: value
                    .as_bool()
                    .or_else(|| spec.default.as_bool())
                    .unwrap_or(false),
                true_label: "Sí".to_string(),
                false_label: "No".to_string(),
            },
            FieldKind::Date => {
                let value = value.display();
                FormField::DateInput {
                    cursor_pos: value.chars().count(),
                    value,
                }
            }
        }
    }

    fn select(options: Vec<SelectOption>, current: &FieldValue, pending: bool) -> Self {
        let selected = options
            .iter()
            .position(|o| same_choice(&o.value, current))
            .unwrap_or(0);
        let mut list_state = ListState::default();
        list_state.select(Some(selected));
        FormField::Select {
            options,
            selected,
            list_state,
            pending,
        }
    }

    /// Get the current value
    pub fn value(&self) -> FieldValue {
        match self {
            FormField::TextInput { value, .. } | FormField::DateInput { value, .. } => {
                FieldValue::text(value.clone())
            }
            FormField::TextArea { textarea, .. } => FieldValue::text(textarea.lines().join("\n")),
            FormField::Select {
                options, selected, ..
            } => options
                .get(*selected)
                .map(|o| o.value.clone())
                .unwrap_or_default(),
            FormField::Toggle { value, .. } => FieldValue::Bool(*value),
        }
    }

    /// Set the value, keeping the cursor at the end of text
    pub fn set_value(&mut self, new_value: &FieldValue) {
        match self {
            FormField::TextInput {
                value, cursor_pos, ..
            }
            | FormField::DateInput { value, cursor_pos } => {
                *value = new_value.display();
                *cursor_pos = value.chars().count();
            }
            FormField::TextArea { textarea, .. } => {
                textarea.select_all();
                textarea.cut();
                textarea.insert_str(new_value.display());
            }
            FormField::Select {
                options,
                selected,
                list_state,
                ..
            } => {
                if let Some(idx) = options.iter().position(|o| same_choice(&o.value, new_value)) {
                    *selected = idx;
                    list_state.select(Some(idx));
                }
            }
            FormField::Toggle { value, .. } => {
                if let Some(b) = new_value.as_bool() {
                    *value = b;
                }
            }
        }
    }

    /// Replace a reference field's options once its catalog resolves
    pub fn update_catalog(&mut self, state: Option<&CatalogState>) {
        if !self.is_pending() || matches!(state, Some(CatalogState::Pending)) {
            return;
        }

        let current = self.value();
        let entries = match state {
            Some(CatalogState::Loaded(entries)) => entries
                .iter()
                .map(|e| SelectOption {
                    value: FieldValue::Integer(e.id),
                    label: e.label.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        *self = Self::select(select_options(entries, &current), &current, false);
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FormField::Select { pending: true, .. })
    }

    /// Handle a key event, returns true if the value may have changed
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        match self {
            FormField::TextInput {
                value,
                cursor_pos,
                max_length,
                ..
            } => match key {
                KeyCode::Char(c) => {
                    if max_length.map(|m| value.chars().count() < m).unwrap_or(true) {
                        value.insert(byte_index(value, *cursor_pos), c);
                        *cursor_pos += 1;
                    }
                    true
                }
                KeyCode::Backspace => {
                    if *cursor_pos > 0 {
                        *cursor_pos -= 1;
                        value.remove(byte_index(value, *cursor_pos));
                    }
                    true
                }
                KeyCode::Delete => {
                    if *cursor_pos < value.chars().count() {
                        value.remove(byte_index(value, *cursor_pos));
                    }
                    true
                }
                KeyCode::Left => {
                    *cursor_pos = cursor_pos.saturating_sub(1);
                    false
                }
                KeyCode::Right => {
                    if *cursor_pos < value.chars().count() {
                        *cursor_pos += 1;
                    }
                    false
                }
                KeyCode::Home => {
                    *cursor_pos = 0;
                    false
                }
                KeyCode::End => {
                    *cursor_pos = value.chars().count();
                    false
                }
                _ => false,
            },
            FormField::TextArea { textarea, .. } => {
                // TextArea handles its own key events
                textarea.input(crossterm::event::KeyEvent::new(
                    key,
                    crossterm::event::KeyModifiers::NONE,
                ))
            }
            FormField::Select {
                options,
                selected,
                list_state,
                pending,
            } => {
                if *pending {
                    return false;
                }
                match key {
                    KeyCode::Up | KeyCode::Char('k') => {
                        if *selected > 0 {
                            *selected -= 1;
                            list_state.select(Some(*selected));
                        }
                        true
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        if *selected < options.len().saturating_sub(1) {
                            *selected += 1;
                            list_state.select(Some(*selected));
                        }
                        true
                    }
                    _ => false,
                }
            }
            FormField::Toggle { value, .. } => match key {
                KeyCode::Char(' ') | KeyCode::Enter => {
                    *value = !*value;
                    true
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    *value = true;
                    true
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    *value = false;
                    true
                }
                _ => false,
            },
            FormField::DateInput {
                value, cursor_pos, ..
            } => match key {
                KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => {
                    if value.len() < 10 {
                        value.insert(*cursor_pos, c);
                        *cursor_pos += 1;
                    }
                    true
                }
                KeyCode::Backspace => {
                    if *cursor_pos > 0 {
                        *cursor_pos -= 1;
                        value.remove(*cursor_pos);
                    }
                    true
                }
                KeyCode::Left => {
                    *cursor_pos = cursor_pos.saturating_sub(1);
                    false
                }
                KeyCode::Right => {
                    if *cursor_pos < value.len() {
                        *cursor_pos += 1;
                    }
                    false
                }
                _ => false,
            },
        }
    }

    /// Get the height needed to render this field
    pub fn render_height(&self) -> u16 {
        match self {
            FormField::TextInput { .. } => 1,
            FormField::TextArea { .. } => 5, // Multi-line gets more space
            FormField::Select {
                options, pending, ..
            } => {
                if *pending {
                    1
                } else {
                    (options.len() as u16).clamp(1, 4)
                }
            }
            FormField::Toggle { .. } => 1,
            FormField::DateInput { .. } => 1,
        }
    }

    /// Render the field
    pub fn render(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        let border_color = if focused { Color::Cyan } else { Color::Gray };
        let text_style = Style::default().fg(if focused { Color::White } else { Color::Gray });

        match self {
            FormField::TextInput {
                value,
                cursor_pos,
                placeholder,
                max_length,
            } => {
                let content = if value.is_empty() && !focused {
                    Line::from(Span::styled(
                        placeholder.as_str(),
                        Style::default().fg(Color::DarkGray),
                    ))
                } else {
                    let mut text = value.clone();
                    if focused {
                        text.insert(byte_index(&text, *cursor_pos), '|');
                    }
                    let suffix = max_length
                        .map(|m| format!(" ({}/{})", value.chars().count(), m))
                        .unwrap_or_default();
                    Line::from(vec![
                        Span::raw(text),
                        Span::styled(suffix, Style::default().fg(Color::DarkGray)),
                    ])
                };

                frame.render_widget(Paragraph::new(content).style(text_style), area);
            }
            FormField::TextArea {
                textarea,
                placeholder,
            } => {
                textarea.set_cursor_line_style(Style::default());
                textarea.set_cursor_style(if focused {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                });
                textarea.set_block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(border_color)),
                );

                if textarea.lines().iter().all(|l| l.is_empty()) && !focused {
                    textarea.set_placeholder_text(placeholder.clone());
                    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
                }

                frame.render_widget(&**textarea, area);
            }
            FormField::Select {
                options,
                selected,
                list_state,
                pending,
            } => {
                if *pending {
                    let loading = Paragraph::new(Span::styled(
                        "Cargando…",
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    ));
                    frame.render_widget(loading, area);
                    return;
                }

                let items: Vec<ListItem> = options
                    .iter()
                    .enumerate()
                    .map(|(i, opt)| {
                        let style = if i == *selected {
                            Style::default().add_modifier(Modifier::BOLD)
                        } else {
                            Style::default().fg(Color::Gray)
                        };
                        ListItem::new(Span::styled(opt.label.clone(), style))
                    })
                    .collect();

                let highlight = if focused {
                    Style::default()
                        .add_modifier(Modifier::REVERSED)
                        .fg(Color::Cyan)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                let list = List::new(items)
                    .highlight_style(highlight)
                    .highlight_symbol("> ");

                frame.render_stateful_widget(list, area, list_state);
            }
            FormField::Toggle {
                value,
                true_label,
                false_label,
            } => {
                let yes_style = if *value {
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                let no_style = if !*value {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };

                let line = Line::from(vec![
                    Span::styled(format!("[{}]", true_label), yes_style),
                    Span::raw(" / "),
                    Span::styled(format!("[{}]", false_label), no_style),
                ]);

                frame.render_widget(Paragraph::new(line), area);
            }
            FormField::DateInput { value, cursor_pos } => {
                let display = if value.is_empty() && !focused {
                    Line::from(Span::styled(
                        "AAAA-MM-DD",
                        Style::default().fg(Color::DarkGray),
                    ))
                } else {
                    let mut text = value.clone();
                    if focused {
                        text.insert((*cursor_pos).min(text.len()), '|');
                    }
                    Line::from(text)
                };

                frame.render_widget(Paragraph::new(display).style(text_style), area);
            }
        }
    }
}
