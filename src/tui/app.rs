use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::board::controller::Controller;
use crate::io::config_io::read_config;
use crate::io::paths::AppDirs;
use crate::io::records::RecordStore;
use crate::logging;
use crate::model::command::{Notice, PanelId};
use crate::model::config::BoardConfig;

use super::input;
use super::render;
use super::theme::Theme;

/// How long a notice stays in the status row.
const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Current interaction mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    /// Typing a title for a new row in the focused panel.
    Edit,
}

/// Single-line edit buffer with a grapheme-aware cursor.
#[derive(Debug, Clone, Default)]
pub struct EditLine {
    pub buffer: String,
    /// Byte offset of the cursor, always on a grapheme boundary.
    pub cursor: usize,
}

impl EditLine {
    pub fn insert(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = crate::util::unicode::prev_grapheme_boundary(&self.buffer, self.cursor) {
            self.buffer.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
    }

    pub fn left(&mut self) {
        if let Some(prev) = crate::util::unicode::prev_grapheme_boundary(&self.buffer, self.cursor) {
            self.cursor = prev;
        }
    }

    pub fn right(&mut self) {
        if let Some(next) = crate::util::unicode::next_grapheme_boundary(&self.buffer, self.cursor) {
            self.cursor = next;
        }
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }
}

/// Main application state
pub struct App {
    pub controller: Controller,
    pub config: BoardConfig,
    pub theme: Theme,
    /// Panel ids in display order; `focus` indexes into it.
    pub panel_ids: Vec<PanelId>,
    pub focus: usize,
    pub mode: Mode,
    pub edit: EditLine,
    /// Latest notice and when it was shown.
    pub notice: Option<(Notice, Instant)>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: BoardConfig, controller: Controller) -> Self {
        let theme = Theme::from_config(&config.ui);
        let panel_ids = controller.panel_ids();
        App {
            controller,
            config,
            theme,
            panel_ids,
            focus: 0,
            mode: Mode::Navigate,
            edit: EditLine::default(),
            notice: None,
            should_quit: false,
        }
    }

    pub fn focused_panel(&self) -> Option<&PanelId> {
        self.panel_ids.get(self.focus)
    }

    pub fn focus_next(&mut self) {
        if !self.panel_ids.is_empty() {
            self.focus = (self.focus + 1) % self.panel_ids.len();
        }
    }

    pub fn focus_previous(&mut self) {
        if !self.panel_ids.is_empty() {
            self.focus = (self.focus + self.panel_ids.len() - 1) % self.panel_ids.len();
        }
    }

    /// Pull controller notices into the status row and expire old ones.
    pub fn absorb_notices(&mut self, now: Instant) {
        for notice in self.controller.drain_notices() {
            self.notice = Some((notice, now));
        }
        if let Some((_, shown_at)) = &self.notice
            && now.duration_since(*shown_at) > NOTICE_TTL
        {
            self.notice = None;
        }
    }

    /// Short display label for a state/group name.
    pub fn state_label<'a>(&'a self, state: &'a str) -> &'a str {
        self.config
            .ui
            .state_labels
            .get(state)
            .map(String::as_str)
            .unwrap_or(state)
    }
}

/// Run the TUI application
pub fn run(config_root: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let dirs = AppDirs::resolve(config_root);
    let config = read_config(&dirs)?;
    let _log_guard = logging::init(&dirs.state_dir);

    let mut controller = Controller::new(&config.board);
    for panel in &config.panels {
        let store = Arc::new(RecordStore::new(dirs.store_file(&panel.file)));
        controller.add_panel(panel.clone(), store);
    }
    let mut app = App::new(config, controller);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let now = Instant::now();
        let today = Local::now().date_naive();

        app.controller.pump_completions();
        app.controller.tick(now, today);
        app.absorb_notices(now);

        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            input::handle_key(app, key, Instant::now(), today);
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── EditLine ───────────────────────────────────────────────────

    #[test]
    fn edit_line_insert_and_backspace() {
        let mut line = EditLine::default();
        for c in "héllo".chars() {
            line.insert(c);
        }
        assert_eq!(line.buffer, "héllo");
        line.backspace();
        line.backspace();
        assert_eq!(line.buffer, "hél");
        assert_eq!(line.cursor, line.buffer.len());
    }

    #[test]
    fn edit_line_cursor_movement() {
        let mut line = EditLine::default();
        for c in "ab".chars() {
            line.insert(c);
        }
        line.left();
        assert_eq!(line.cursor, 1);
        line.insert('x');
        assert_eq!(line.buffer, "axb");
        line.right();
        assert_eq!(line.cursor, 3);
        line.right();
        assert_eq!(line.cursor, 3);
    }

    #[test]
    fn edit_line_take_resets() {
        let mut line = EditLine::default();
        line.insert('a');
        assert_eq!(line.take(), "a");
        assert_eq!(line.buffer, "");
        assert_eq!(line.cursor, 0);
    }
}
