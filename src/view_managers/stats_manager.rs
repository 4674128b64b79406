use crate::{App, AppView, log_util::log_debug};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub(crate) struct StatsManager<'a> {
    app: &'a mut App,
}

impl<'a> StatsManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn show_stats(app: &'a mut App) {
        app.refresh_local_history();
        app.view = AppView::Stats;
        log_debug("App: opened stats view");
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('r') | KeyCode::Char('R')) => {
                self.app.refresh_local_history();
            }
            (KeyModifiers::NONE, KeyCode::Char('m')) => self.app.return_to_menu(),
            _ => {}
        }
    }
}
