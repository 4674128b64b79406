use crate::{App, AppView, ApiTaskMessage, config, log_util::log_debug};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub(crate) struct SessionsManager<'a> {
    app: &'a mut App,
}

impl<'a> SessionsManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Open the sessions view and request the session list for the configured
    /// student.
    pub(crate) fn fetch_sessions(app: &'a mut App) {
        let username = config::current().username;
        if username.is_empty() {
            App::push_error(
                &mut app.error,
                "Ustaw nazwę użytkownika w ustawieniach, aby pobrać sesje.".to_string(),
            );
            return;
        }

        app.view = AppView::Sessions;
        app.spawn_api_task("Pobieranie sesji", move |client| async move {
            let sessions = client.list_sessions(&username).await?;
            Ok(ApiTaskMessage::SessionList(sessions))
        });
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.select_previous(),
            (KeyModifiers::NONE, KeyCode::Enter) => self.load_selected(),
            (KeyModifiers::NONE, KeyCode::Char('r') | KeyCode::Char('R')) => {
                SessionsManager::fetch_sessions(self.app)
            }
            (KeyModifiers::NONE, KeyCode::Char('m')) => self.app.return_to_menu(),
            _ => {}
        }
    }

    /// Move selection to the next session, wrapping to the start.
    fn select_next(&mut self) {
        if self.app.sessions.is_empty() {
            self.app.selected_session = None;
            return;
        }
        let next = match self.app.selected_session {
            Some(index) if index + 1 < self.app.sessions.len() => index + 1,
            _ => 0,
        };
        self.app.selected_session = Some(next);
    }

    /// Move selection to the previous session, wrapping to the end.
    fn select_previous(&mut self) {
        if self.app.sessions.is_empty() {
            self.app.selected_session = None;
            return;
        }
        let previous = match self.app.selected_session {
            Some(index) if index > 0 => index - 1,
            _ => self.app.sessions.len() - 1,
        };
        self.app.selected_session = Some(previous);
    }

    fn load_selected(&mut self) {
        let Some(summary) = self
            .app
            .selected_session
            .and_then(|index| self.app.sessions.get(index))
        else {
            return;
        };
        let session_id = summary.id.clone();
        if session_id.is_empty() {
            App::push_error(
                &mut self.app.error,
                "Wybrana sesja nie ma identyfikatora.".to_string(),
            );
            return;
        }

        log_debug(&format!("App: loading session {}", session_id));
        self.app
            .spawn_api_task("Wczytywanie sesji", move |client| async move {
                let session = client.get_session_by_id(&session_id).await?;
                Ok(ApiTaskMessage::SessionLoaded(session))
            });
    }
}
