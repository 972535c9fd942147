use crate::application::{App, AppMode, Command};
use crate::domain::{View, ROUTES};
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    /// Applies a key press to the session. Returns the command to dispatch, if any.
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
        match app.mode {
            AppMode::Normal => Self::handle_normal_mode(app, key, modifiers),
            AppMode::UploadPath => Self::handle_upload_path_mode(app, key),
            AppMode::Help => {
                Self::handle_help_mode(app, key);
                None
            }
        }
    }

    fn handle_normal_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
        // Shortcuts are plain keys; Ctrl/Alt chords are left to the terminal loop.
        if modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return None;
        }
        app.status_message = None;

        match key {
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                app.navigate(ROUTES[index].path);
            }
            KeyCode::Tab => app.next_route(),
            KeyCode::BackTab => app.previous_route(),
            KeyCode::Char('b') => app.state.toggle_sidebar(),
            KeyCode::F(1) | KeyCode::Char('?') => app.show_help(),
            KeyCode::Char('h') => return Some(Command::CheckHealth),
            KeyCode::Char('r') => return Some(Command::RefreshJobs),
            KeyCode::Char('u') => app.start_upload_prompt(),
            KeyCode::Char('g') => return app.start_segmentation(),
            KeyCode::Char('m') => app.cycle_model_type(),
            KeyCode::Char('x') => app.cancel_tracking(),
            KeyCode::Char('c') => app.clear_study(),
            KeyCode::Down | KeyCode::Char('j') if app.route.view == View::Viewer => app.select_next_stl(),
            KeyCode::Up | KeyCode::Char('k') if app.route.view == View::Viewer => app.select_previous_stl(),
            KeyCode::Char('y') => return app.copy_selected_url(),
            KeyCode::Char('d') => return app.download_selected(),
            _ => {}
        }
        None
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.mode = AppMode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_upload_path_mode(app: &mut App, key: KeyCode) -> Option<Command> {
        match key {
            KeyCode::Enter => return app.submit_upload(),
            KeyCode::Esc => app.cancel_input(),
            KeyCode::Backspace => {
                if app.cursor_position > 0 {
                    app.cursor_position -= 1;
                    app.input.remove(app.cursor_position);
                }
            }
            KeyCode::Delete => {
                if app.cursor_position < app.input.len() {
                    app.input.remove(app.cursor_position);
                }
            }
            KeyCode::Left => {
                app.cursor_position = app.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if app.cursor_position < app.input.len() {
                    app.cursor_position += 1;
                }
            }
            KeyCode::Char(c) if c.is_ascii() => {
                app.input.insert(app.cursor_position, c);
                app.cursor_position += 1;
            }
            _ => {}
        }
        None
    }
}
