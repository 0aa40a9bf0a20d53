use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::widget::WidgetKind;

use super::core::App;
use super::types::{InputMode, PromptKind};

impl App {
    /// Returns `Ok(false)` when the user asked to quit.
    pub fn handle_key_input(&mut self, key: KeyEvent) -> Result<bool> {
        self.status_message = None;
        self.error_message = None;
        self.needs_redraw = true;

        match std::mem::take(&mut self.mode) {
            InputMode::Normal => return Ok(self.handle_normal_key(key)),
            InputMode::Catalogue { selected } => self.handle_catalogue_key(key.code, selected),
            InputMode::Prompt { kind, buffer } => self.handle_prompt_key(key.code, kind, buffer),
        }
        Ok(true)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Char(']') => self.switch_tab(true),
            KeyCode::Char('[') => self.switch_tab(false),
            KeyCode::Char('n') => self.new_tab(),
            KeyCode::Char('x') => self.close_active_tab(),
            KeyCode::Char('r') => self.open_prompt(PromptKind::RenameTab),
            KeyCode::Char('a') => self.mode = InputMode::Catalogue { selected: 0 },
            KeyCode::Tab => self.cycle_focus(true),
            KeyCode::BackTab => self.cycle_focus(false),
            KeyCode::Char('d') => self.remove_focused_widget(),
            KeyCode::Char('s') => {
                if self.focused_widget().is_some() {
                    self.open_prompt(PromptKind::WidgetSymbol);
                }
            }
            KeyCode::Char('f') => self.cycle_focused_timeframe(),
            KeyCode::Char('g') => self.open_prompt(PromptKind::GlobalSymbols),
            KeyCode::Char('t') => self.cycle_theme_mode(),
            KeyCode::Char('m') => {
                if self.focused_widget().is_some_and(|w| w.kind == WidgetKind::Assistant) {
                    self.open_prompt(PromptKind::ChatMessage);
                } else {
                    self.status_message = Some("Focus an assistant widget to chat".into());
                }
            }
            KeyCode::Char('R') => self.refresh_focused(),
            // layout editing: arrows move, shift+arrows resize
            KeyCode::Left if shift => self.nudge_focused(0, 0, -1, 0),
            KeyCode::Right if shift => self.nudge_focused(0, 0, 1, 0),
            KeyCode::Up if shift => self.nudge_focused(0, 0, 0, -1),
            KeyCode::Down if shift => self.nudge_focused(0, 0, 0, 1),
            KeyCode::Left => self.nudge_focused(-1, 0, 0, 0),
            KeyCode::Right => self.nudge_focused(1, 0, 0, 0),
            KeyCode::Up => self.nudge_focused(0, -1, 0, 0),
            KeyCode::Down => self.nudge_focused(0, 1, 0, 0),
            _ => {}
        }
        true
    }

    fn handle_catalogue_key(&mut self, code: KeyCode, selected: usize) {
        let kinds = WidgetKind::all();
        match code {
            KeyCode::Up => {
                let selected = selected.checked_sub(1).unwrap_or(kinds.len() - 1);
                self.mode = InputMode::Catalogue { selected };
            }
            KeyCode::Down => {
                self.mode = InputMode::Catalogue { selected: (selected + 1) % kinds.len() };
            }
            KeyCode::Enter => {
                if let Some(kind) = kinds.get(selected) {
                    self.add_widget(*kind);
                }
            }
            KeyCode::Esc | KeyCode::Char('a') | KeyCode::Char('q') => {}
            _ => self.mode = InputMode::Catalogue { selected },
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode, kind: PromptKind, mut buffer: String) {
        match code {
            KeyCode::Enter => self.submit_prompt(kind, &buffer),
            KeyCode::Esc => {}
            KeyCode::Backspace => {
                buffer.pop();
                self.mode = InputMode::Prompt { kind, buffer };
            }
            KeyCode::Char(ch) => {
                buffer.push(ch);
                self.mode = InputMode::Prompt { kind, buffer };
            }
            _ => self.mode = InputMode::Prompt { kind, buffer },
        }
    }
}
