use super::{
    config_manager::ConfigManager, quiz_manager::QuizManager, sessions_manager::SessionsManager,
    stats_manager::StatsManager,
};
use crate::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub(crate) const MENU_OPTIONS: [&str; 4] = [
    "1. Nowa kartkówka",
    "2. Zapisane sesje",
    "3. Statystyki",
    "4. Ustawienia",
];

pub(crate) struct MenuManager<'a> {
    app: &'a mut App,
}

impl<'a> MenuManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.menu_next(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.menu_previous(),
            (KeyModifiers::NONE, KeyCode::Enter) => self.activate_menu_option(),
            (KeyModifiers::NONE, KeyCode::Char('1')) => {
                self.app.menu_index = 0;
                self.activate_menu_option();
            }
            (KeyModifiers::NONE, KeyCode::Char('2')) => {
                self.app.menu_index = 1;
                self.activate_menu_option();
            }
            (KeyModifiers::NONE, KeyCode::Char('3')) => {
                self.app.menu_index = 2;
                self.activate_menu_option();
            }
            (KeyModifiers::NONE, KeyCode::Char('4')) => {
                self.app.menu_index = 3;
                self.activate_menu_option();
            }
            (KeyModifiers::NONE, KeyCode::Char('c') | KeyCode::Char('C')) => {
                ConfigManager::show_config(self.app)
            }
            (KeyModifiers::NONE, KeyCode::Char('s')) => StatsManager::show_stats(self.app),
            _ => {}
        }
    }

    fn menu_next(&mut self) {
        self.app.menu_index = (self.app.menu_index + 1) % MENU_OPTIONS.len();
    }

    fn menu_previous(&mut self) {
        if self.app.menu_index == 0 {
            self.app.menu_index = MENU_OPTIONS.len() - 1;
        } else {
            self.app.menu_index -= 1;
        }
    }

    fn activate_menu_option(&mut self) {
        match self.app.menu_index {
            0 => QuizManager::show_quiz(self.app),
            1 => SessionsManager::fetch_sessions(self.app),
            2 => StatsManager::show_stats(self.app),
            3 => ConfigManager::show_config(self.app),
            _ => {}
        }
    }
}
