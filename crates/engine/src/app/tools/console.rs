use std::collections::VecDeque;

use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::text::{draw_filled_rect, draw_text_clipped_with_fallback, LINE_ADVANCE, TEXT_SCALE};

const CONSOLE_PADDING: i32 = 4 * TEXT_SCALE;
const CONSOLE_BG_COLOR: [u8; 4] = [14, 16, 20, 225];
const CONSOLE_TEXT_COLOR: [u8; 4] = [214, 232, 224, 255];
const CONSOLE_PROMPT_COLOR: [u8; 4] = [24, 191, 227, 255];
const CONSOLE_PROMPT_PREFIX: &str = "> ";
const CONSOLE_HEIGHT_FRACTION: f32 = 0.45;
const CONSOLE_TOGGLE_CHAR: char = '`';

pub(crate) const MAX_HISTORY_LINES: usize = 64;
pub(crate) const MAX_OUTPUT_LINES: usize = 200;
pub(crate) const MAX_PENDING_LINES: usize = 32;
pub(crate) const MAX_CURRENT_LINE_CHARS: usize = 160;

/// Line editor, history and scrollback of the debug console. Submitted
/// lines are queued raw; interpretation belongs to the command processor.
#[derive(Debug, Default)]
pub(crate) struct ConsoleState {
    is_open: bool,
    current_line: String,
    history: VecDeque<String>,
    history_cursor: Option<usize>,
    history_draft: Option<String>,
    output_lines: VecDeque<String>,
    pending_lines: VecDeque<String>,
    completion_names: Vec<String>,
}

impl ConsoleState {
    pub(crate) fn is_open(&self) -> bool {
        self.is_open
    }

    pub(crate) fn toggle_open(&mut self) {
        self.is_open = !self.is_open;
        self.reset_line();
    }

    /// Names offered by Tab completion on the first word.
    pub(crate) fn set_completion_names(&mut self, names: Vec<String>) {
        self.completion_names = names;
    }

    pub(crate) fn handle_key_event(&mut self, key_event: &KeyEvent) {
        if !self.is_open || key_event.state != ElementState::Pressed {
            return;
        }
        if let PhysicalKey::Code(code) = key_event.physical_key {
            self.handle_key_code(code);
        }
    }

    pub(crate) fn handle_text_input_from_key_event(&mut self, key_event: &KeyEvent) {
        if !self.is_open || key_event.state != ElementState::Pressed {
            return;
        }
        if let Some(text) = key_event.text.as_ref() {
            self.insert_text(text);
        }
    }

    pub(crate) fn current_line(&self) -> &str {
        &self.current_line
    }

    pub(crate) fn output_lines(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.output_lines.iter().map(String::as_str)
    }

    pub(crate) fn append_output_line(&mut self, line: impl Into<String>) {
        push_bounded(&mut self.output_lines, line.into(), MAX_OUTPUT_LINES);
    }

    pub(crate) fn clear_output_lines(&mut self) {
        self.output_lines.clear();
    }

    pub(crate) fn drain_pending_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.pending_lines.drain(..));
    }

    #[cfg(test)]
    pub(crate) fn push_pending_line_for_test(&mut self, line: &str) {
        push_bounded(&mut self.pending_lines, line.to_string(), MAX_PENDING_LINES);
    }

    fn handle_key_code(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Backspace => {
                self.current_line.pop();
            }
            KeyCode::Enter | KeyCode::NumpadEnter => self.submit(),
            KeyCode::Escape => {
                self.is_open = false;
                self.reset_line();
            }
            KeyCode::ArrowUp => self.history_up(),
            KeyCode::ArrowDown => self.history_down(),
            KeyCode::Tab => self.complete_first_word(),
            _ => {}
        }
    }

    fn insert_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_control() || ch == CONSOLE_TOGGLE_CHAR {
                continue;
            }
            if self.current_line.chars().count() >= MAX_CURRENT_LINE_CHARS {
                break;
            }
            self.current_line.push(ch);
        }
    }

    fn reset_line(&mut self) {
        self.current_line.clear();
        self.history_cursor = None;
        self.history_draft = None;
    }

    fn submit(&mut self) {
        let line = std::mem::take(&mut self.current_line);
        self.append_output_line(format!("{CONSOLE_PROMPT_PREFIX}{line}"));
        if !line.trim().is_empty() && self.history.back() != Some(&line) {
            push_bounded(&mut self.history, line.clone(), MAX_HISTORY_LINES);
        }
        push_bounded(&mut self.pending_lines, line, MAX_PENDING_LINES);
        self.reset_line();
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        if self.history_cursor.is_none() {
            self.history_draft = Some(self.current_line.clone());
        }
        let index = self
            .history_cursor
            .map_or(self.history.len() - 1, |index| index.saturating_sub(1));
        self.history_cursor = Some(index);
        self.current_line = self.history[index].clone();
    }

    fn history_down(&mut self) {
        let Some(index) = self.history_cursor else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_cursor = Some(index + 1);
            self.current_line = self.history[index + 1].clone();
        } else {
            self.history_cursor = None;
            self.current_line = self.history_draft.take().unwrap_or_default();
        }
    }

    /// Completes a unique prefix; an ambiguous prefix lists the candidates.
    fn complete_first_word(&mut self) {
        if self.current_line.contains(char::is_whitespace) {
            return;
        }
        let prefix = self.current_line.as_str();
        let matches: Vec<&String> = self
            .completion_names
            .iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [] => {}
            [only] => self.current_line = format!("{only} "),
            many => {
                let listing = many
                    .iter()
                    .map(|name| name.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.append_output_line(listing);
            }
        }
    }
}

fn push_bounded(queue: &mut VecDeque<String>, value: String, max_len: usize) {
    while queue.len() >= max_len {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Drop-down console over the top part of the window.
pub(crate) fn draw_console(frame: &mut [u8], width: u32, height: u32, state: &ConsoleState) {
    if !state.is_open() || width == 0 || height == 0 {
        return;
    }

    let panel_height = ((height as f32 * CONSOLE_HEIGHT_FRACTION) as i32)
        .max(LINE_ADVANCE + 2 * CONSOLE_PADDING)
        .min(height as i32);
    draw_filled_rect(frame, width, height, 0, 0, width as i32, panel_height, CONSOLE_BG_COLOR);

    let prompt_y = panel_height - CONSOLE_PADDING - LINE_ADVANCE;
    let prompt = format!("{CONSOLE_PROMPT_PREFIX}{}_", state.current_line());
    draw_text_clipped_with_fallback(
        frame,
        width,
        height,
        CONSOLE_PADDING,
        prompt_y,
        &prompt,
        CONSOLE_PROMPT_COLOR,
        '?',
    );

    let mut line_y = prompt_y - LINE_ADVANCE;
    for line in state.output_lines().rev() {
        if line_y < CONSOLE_PADDING {
            break;
        }
        draw_text_clipped_with_fallback(
            frame,
            width,
            height,
            CONSOLE_PADDING,
            line_y,
            line,
            CONSOLE_TEXT_COLOR,
            '?',
        );
        line_y -= LINE_ADVANCE;
    }
}
