use crate::{App, AppView, config, config::ConfigForm, log_util::log_debug};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub(crate) struct ConfigManager<'a> {
    app: &'a mut App,
}

impl<'a> ConfigManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn show_config(app: &'a mut App) {
        app.config_form = ConfigForm::from_config(config::current());
        app.config_form
            .set_status("↑/↓ wybiera pole, Enter edytuje tekst, s zapisuje.");
        app.view = AppView::Config;
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if self.app.config_form.is_editing() {
            match key.code {
                KeyCode::Enter => self.app.config_form.commit_edit(),
                KeyCode::Esc => self.app.config_form.cancel_edit(),
                KeyCode::Backspace => self.app.config_form.backspace(),
                KeyCode::Char(c) => self.app.config_form.push_char(c),
                _ => {}
            }
            return;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => {
                self.app.config_form.select_next();
            }
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => {
                self.app.config_form.select_previous();
            }
            (KeyModifiers::NONE, KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-')) => {
                self.app.config_form.adjust_current(-1);
            }
            (
                KeyModifiers::NONE,
                KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') | KeyCode::Char('='),
            ) => {
                self.app.config_form.adjust_current(1);
            }
            (KeyModifiers::NONE, KeyCode::Enter) => {
                // Text fields open the edit buffer; toggles flip in place.
                self.app.config_form.begin_edit();
                if !self.app.config_form.is_editing() {
                    self.app.config_form.adjust_current(1);
                }
            }
            (KeyModifiers::NONE, KeyCode::Char('s')) => self.save_config_changes(),
            (KeyModifiers::NONE, KeyCode::Char('r')) => self.reset_config_form(),
            (KeyModifiers::NONE, KeyCode::Char('m')) => self.app.return_to_menu(),
            _ => {}
        }
    }

    fn save_config_changes(&mut self) {
        if !self.app.config_form.dirty {
            self.app
                .config_form
                .set_status("Brak zmian do zapisania.");
            return;
        }

        let form = self.app.config_form.clone();
        match config::update(|config| {
            config.username = form.username.clone();
            config.school_name = form.school_name.clone();
            config.class_name = form.class_name.clone();
            config.default_subject = form.default_subject.clone();
            config.api_base = form.api_base.clone();
            config.function_key = form.function_key.clone();
            config.write_output_artifacts = form.write_output_artifacts;
        }) {
            Ok(updated) => {
                self.app.subject = updated.default_subject.clone();
                self.app.config_form.apply_saved(updated);
                self.app.config_form.set_status(format!(
                    "Zapisano konfigurację do {}",
                    config::config_file_path().display()
                ));
                self.app.rebuild_client();
                log_debug("App: configuration saved");
            }
            Err(err) => {
                App::push_error(
                    &mut self.app.error,
                    format!("Failed to save configuration: {}", err),
                );
                self.app
                    .config_form
                    .set_status("Zapis konfiguracji nie powiódł się.");
                log_debug(&format!("App: failed to save configuration: {}", err));
            }
        }
    }

    fn reset_config_form(&mut self) {
        self.app.config_form = ConfigForm::from_config(config::current());
        self.app
            .config_form
            .set_status("Przywrócono zapisane wartości.");
    }
}
