use std::time::Instant;

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::model::command::{MoveDir, UserCommand};
use crate::sync::mode::ViewMode;

use super::app::{App, Mode};

/// Route one key press. `now` and `today` flow through to the controller so
/// debounce timers and period math share the event loop's clock.
pub fn handle_key(app: &mut App, key: KeyEvent, now: Instant, today: NaiveDate) {
    match app.mode {
        Mode::Navigate => navigate_key(app, key, now, today),
        Mode::Edit => edit_key(app, key, now, today),
    }
}

fn navigate_key(app: &mut App, key: KeyEvent, now: Instant, today: NaiveDate) {
    let Some(panel) = app.focused_panel().cloned() else {
        if key.code == KeyCode::Char('q') {
            app.should_quit = true;
        }
        return;
    };
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('r') => app.controller.dispatch(UserCommand::Refresh, now, today),
        KeyCode::Char('z') => app.controller.dispatch(UserCommand::Undo, now, today),

        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_previous(),

        KeyCode::Char('j') | KeyCode::Down => app.controller.move_selection(&panel, 1),
        KeyCode::Char('k') | KeyCode::Up => app.controller.move_selection(&panel, -1),
        KeyCode::Char('g') => app.controller.move_selection(&panel, isize::MIN / 2),
        KeyCode::Char('G') => app.controller.move_selection(&panel, isize::MAX / 2),

        KeyCode::Char('a') => {
            app.mode = Mode::Edit;
            app.edit.take();
        }
        KeyCode::Char('c') => app
            .controller
            .dispatch(UserCommand::Complete { panel }, now, today),
        KeyCode::Char('n') => app
            .controller
            .dispatch(UserCommand::Defer { panel }, now, today),
        KeyCode::Char('d') => app
            .controller
            .dispatch(UserCommand::Delete { panel }, now, today),
        KeyCode::Char('x') => app
            .controller
            .dispatch(UserCommand::Abandon { panel }, now, today),

        KeyCode::Char('J') => app.controller.dispatch(
            UserCommand::Move {
                panel,
                dir: MoveDir::Down,
            },
            now,
            today,
        ),
        KeyCode::Char('K') => app.controller.dispatch(
            UserCommand::Move {
                panel,
                dir: MoveDir::Up,
            },
            now,
            today,
        ),

        // Issue states, matching the scaffolded config's group names.
        KeyCode::Char('b') => set_state(app, panel, "Backlog", now, today),
        KeyCode::Char('t') => set_state(app, panel, "Todo", now, today),
        KeyCode::Char('p') => set_state(app, panel, "In Progress", now, today),
        KeyCode::Char('v') => set_state(app, panel, "In Review", now, today),

        KeyCode::Char('m') => {
            let me = std::env::var("USER").ok();
            app.controller
                .dispatch(UserCommand::Assign { panel, assignee: me }, now, today);
        }
        KeyCode::Char('u') => app.controller.dispatch(
            UserCommand::Assign {
                panel,
                assignee: None,
            },
            now,
            today,
        ),

        KeyCode::Esc => {
            // In review mode Esc dismisses the review for this period.
            if app
                .controller
                .panel(&panel)
                .and_then(|p| p.review.as_ref())
                .is_some_and(|r| r.mode == ViewMode::ReviewPrevious)
            {
                app.controller.dispatch(UserCommand::DismissReview, now, today);
            }
        }
        _ => {}
    }
}

fn set_state(app: &mut App, panel: crate::model::command::PanelId, state: &str, now: Instant, today: NaiveDate) {
    app.controller.dispatch(
        UserCommand::SetState {
            panel,
            state: state.to_string(),
        },
        now,
        today,
    );
}

fn edit_key(app: &mut App, key: KeyEvent, now: Instant, today: NaiveDate) {
    match key.code {
        KeyCode::Esc => {
            app.edit.take();
            app.mode = Mode::Navigate;
        }
        KeyCode::Enter => {
            let title = app.edit.take();
            app.mode = Mode::Navigate;
            if let Some(panel) = app.focused_panel().cloned() {
                app.controller.dispatch(
                    UserCommand::Create {
                        panel,
                        title,
                        due: None,
                    },
                    now,
                    today,
                );
            }
        }
        KeyCode::Backspace => app.edit.backspace(),
        KeyCode::Left => app.edit.left(),
        KeyCode::Right => app.edit.right(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.edit.insert(c);
        }
        _ => {}
    }
}
