use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::PathBuf,
    sync::{OnceLock, RwLock},
};

/// Subjects the backend knows how to generate kartkówki for.
pub const SUBJECTS: [&str; 5] = ["Biologia", "Chemia", "Fizyka", "Historia", "Matematyka"];

const CONFIG_FILE_PATH: &str = "config/app_config.toml";

/// Globally accessible application configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Student identifier sent with every backend request.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub school_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default = "default_subject_value")]
    pub default_subject: String,
    /// Backend base URL; empty means the production deployment.
    #[serde(default)]
    pub api_base: String,
    /// Shared function key; the KARTKOWKA_FUNCTION_KEY env var wins when set.
    #[serde(default)]
    pub function_key: String,
    #[serde(default)]
    pub write_output_artifacts: bool,
}

impl AppConfig {
    fn normalize(&mut self) {
        if !SUBJECTS.contains(&self.default_subject.as_str()) {
            self.default_subject = default_subject_value();
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            school_name: String::new(),
            class_name: String::new(),
            default_subject: default_subject_value(),
            api_base: String::new(),
            function_key: String::new(),
            write_output_artifacts: false,
        }
    }
}

fn default_subject_value() -> String {
    SUBJECTS[0].to_string()
}

static APP_CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn config_lock() -> &'static RwLock<AppConfig> {
    APP_CONFIG.get_or_init(|| RwLock::new(AppConfig::default()))
}

/// Attempt to load configuration from disk. If loading fails, the in-memory config will be reset to defaults
/// and the error will be returned for the caller to surface if desired.
pub fn initialize() -> Result<()> {
    match load_config_from_disk() {
        Ok(config) => {
            let lock = config_lock();
            *lock.write().expect("config lock poisoned") = config;
            Ok(())
        }
        Err(err) => {
            let lock = config_lock();
            *lock.write().expect("config lock poisoned") = AppConfig::default();
            Err(err)
        }
    }
}

/// Retrieve a clone of the current configuration.
pub fn current() -> AppConfig {
    config_lock().read().expect("config lock poisoned").clone()
}

/// Apply the provided mutation to the in-memory configuration and persist the result to disk.
pub fn update<F>(mutator: F) -> Result<AppConfig>
where
    F: FnOnce(&mut AppConfig),
{
    let lock = config_lock();
    let mut config = lock.write().expect("config lock poisoned");
    mutator(&mut config);
    config.normalize();
    save_config_to_disk(&config)?;
    Ok(config.clone())
}

/// Absolute path to the configuration file used for persistence.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

fn load_config_from_disk() -> Result<AppConfig> {
    let path = config_file_path();
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let mut config: AppConfig = toml::from_str(&contents)
                .wrap_err_with(|| format!("failed to parse configuration at {}", path.display()))?;
            config.normalize();
            Ok(config)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(eyre!(format!(
            "failed to read configuration at {}: {}",
            path.display(),
            err
        ))),
    }
}

fn save_config_to_disk(config: &AppConfig) -> Result<()> {
    let path = config_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).wrap_err_with(|| {
            format!(
                "failed to create configuration directory {}",
                parent.display()
            )
        })?;
    }
    let serialized =
        toml::to_string_pretty(config).wrap_err("failed to serialize configuration to TOML")?;
    fs::write(&path, serialized)
        .wrap_err_with(|| format!("failed to write configuration to {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigField {
    Username,
    School,
    Class,
    Subject,
    ApiBase,
    FunctionKey,
    OutputArtifacts,
}

const FIELD_ORDER: [ConfigField; 7] = [
    ConfigField::Username,
    ConfigField::School,
    ConfigField::Class,
    ConfigField::Subject,
    ConfigField::ApiBase,
    ConfigField::FunctionKey,
    ConfigField::OutputArtifacts,
];

impl ConfigField {
    fn index(self) -> usize {
        FIELD_ORDER.iter().position(|field| *field == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        FIELD_ORDER[(self.index() + 1) % FIELD_ORDER.len()]
    }

    fn previous(self) -> Self {
        let index = self.index();
        if index == 0 {
            FIELD_ORDER[FIELD_ORDER.len() - 1]
        } else {
            FIELD_ORDER[index - 1]
        }
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            Self::Username | Self::School | Self::Class | Self::ApiBase | Self::FunctionKey
        )
    }
}

/// Editable configuration state rendered by the config view.
#[derive(Debug, Clone)]
pub struct ConfigForm {
    pub(crate) username: String,
    pub(crate) school_name: String,
    pub(crate) class_name: String,
    pub(crate) default_subject: String,
    pub(crate) api_base: String,
    pub(crate) function_key: String,
    pub(crate) write_output_artifacts: bool,
    editing: bool,
    edit_buffer: String,
    field: ConfigField,
    pub(crate) dirty: bool,
    pub(crate) status: Option<String>,
}

impl ConfigForm {
    pub(crate) fn from_config(config: AppConfig) -> Self {
        Self {
            username: config.username,
            school_name: config.school_name,
            class_name: config.class_name,
            default_subject: config.default_subject,
            api_base: config.api_base,
            function_key: config.function_key,
            write_output_artifacts: config.write_output_artifacts,
            editing: false,
            edit_buffer: String::new(),
            field: ConfigField::Username,
            dirty: false,
            status: None,
        }
    }

    pub(crate) fn selected_index(&self) -> usize {
        self.field.index()
    }

    pub(crate) fn select_next(&mut self) {
        if !self.editing {
            self.field = self.field.next();
        }
    }

    pub(crate) fn select_previous(&mut self) {
        if !self.editing {
            self.field = self.field.previous();
        }
    }

    /// Cycle or toggle the non-text fields.
    pub(crate) fn adjust_current(&mut self, delta: isize) {
        if delta == 0 || self.editing {
            return;
        }

        match self.field {
            ConfigField::Subject => {
                let position = SUBJECTS
                    .iter()
                    .position(|subject| *subject == self.default_subject)
                    .unwrap_or(0);
                let updated = if delta > 0 {
                    (position + 1) % SUBJECTS.len()
                } else if position == 0 {
                    SUBJECTS.len() - 1
                } else {
                    position - 1
                };
                self.default_subject = SUBJECTS[updated].to_string();
                self.dirty = true;
                self.status = None;
            }
            ConfigField::OutputArtifacts => {
                self.write_output_artifacts = !self.write_output_artifacts;
                self.dirty = true;
                self.status = None;
            }
            _ => {}
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    /// Begin editing the selected field if it holds free text.
    pub(crate) fn begin_edit(&mut self) {
        if !self.field.is_text() {
            return;
        }
        self.edit_buffer = self.current_text_value().to_string();
        self.editing = true;
        self.status = None;
    }

    pub(crate) fn push_char(&mut self, c: char) {
        if self.editing && !c.is_control() {
            self.edit_buffer.push(c);
        }
    }

    pub(crate) fn backspace(&mut self) {
        if self.editing {
            self.edit_buffer.pop();
        }
    }

    pub(crate) fn commit_edit(&mut self) {
        if !self.editing {
            return;
        }
        let value = self.edit_buffer.trim().to_string();
        let target = match self.field {
            ConfigField::Username => &mut self.username,
            ConfigField::School => &mut self.school_name,
            ConfigField::Class => &mut self.class_name,
            ConfigField::ApiBase => &mut self.api_base,
            ConfigField::FunctionKey => &mut self.function_key,
            _ => {
                self.editing = false;
                return;
            }
        };
        if *target != value {
            *target = value;
            self.dirty = true;
        }
        self.editing = false;
        self.edit_buffer.clear();
    }

    pub(crate) fn cancel_edit(&mut self) {
        self.editing = false;
        self.edit_buffer.clear();
    }

    pub(crate) fn edit_buffer_display(&self) -> String {
        if matches!(self.field, ConfigField::FunctionKey) {
            mask_secret(&self.edit_buffer)
        } else {
            self.edit_buffer.clone()
        }
    }

    pub(crate) fn masked_function_key(&self) -> String {
        mask_secret(&self.function_key)
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub(crate) fn apply_saved(&mut self, config: AppConfig) {
        let field = self.field;
        *self = Self::from_config(config);
        self.field = field;
    }

    fn current_text_value(&self) -> &str {
        match self.field {
            ConfigField::Username => &self.username,
            ConfigField::School => &self.school_name,
            ConfigField::Class => &self.class_name,
            ConfigField::ApiBase => &self.api_base,
            ConfigField::FunctionKey => &self.function_key,
            _ => "",
        }
    }
}

fn mask_secret(value: &str) -> String {
    let char_count = value.chars().count();
    if char_count == 0 {
        "<not set>".to_string()
    } else if char_count <= 4 {
        "•".repeat(char_count)
    } else {
        let visible: String = value.chars().skip(char_count - 4).collect();
        format!("{}{}", "•".repeat(char_count - 4), visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_cycles_subjects_in_both_directions() {
        let mut form = ConfigForm::from_config(AppConfig::default());
        form.field = ConfigField::Subject;

        form.adjust_current(1);
        assert_eq!(form.default_subject, "Chemia");
        assert!(form.dirty);

        form.adjust_current(-1);
        form.adjust_current(-1);
        assert_eq!(form.default_subject, "Matematyka");
    }

    #[test]
    fn form_toggles_artifact_writing() {
        let mut form = ConfigForm::from_config(AppConfig::default());
        form.field = ConfigField::OutputArtifacts;

        form.adjust_current(1);
        assert!(form.write_output_artifacts);
        form.adjust_current(-1);
        assert!(!form.write_output_artifacts);
    }

    #[test]
    fn text_edit_commits_trimmed_value() {
        let mut form = ConfigForm::from_config(AppConfig::default());
        form.begin_edit();
        assert!(form.is_editing());

        for c in " uczen@szkola.pl ".chars() {
            form.push_char(c);
        }
        form.commit_edit();

        assert!(!form.is_editing());
        assert_eq!(form.username, "uczen@szkola.pl");
        assert!(form.dirty);
    }

    #[test]
    fn cancel_edit_keeps_previous_value() {
        let mut config = AppConfig::default();
        config.username = "stary@uczen.pl".to_string();
        let mut form = ConfigForm::from_config(config);

        form.begin_edit();
        form.push_char('x');
        form.cancel_edit();

        assert_eq!(form.username, "stary@uczen.pl");
        assert!(!form.dirty);
    }

    #[test]
    fn function_key_is_masked_for_display() {
        let mut config = AppConfig::default();
        config.function_key = "abcdef123456".to_string();
        let form = ConfigForm::from_config(config);

        let masked = form.masked_function_key();
        assert!(masked.ends_with("3456"));
        assert!(!masked.contains("abcdef"));
    }

    #[test]
    fn function_key_mask_counts_characters_not_bytes() {
        assert_eq!(mask_secret("żółć1234"), "••••1234");
        assert_eq!(mask_secret("żół"), "•••");
        assert_eq!(mask_secret(""), "<not set>");
    }

    #[test]
    fn normalize_falls_back_to_known_subject() {
        let mut config = AppConfig {
            default_subject: "Astrologia".to_string(),
            ..AppConfig::default()
        };
        config.normalize();
        assert_eq!(config.default_subject, "Biologia");
    }
}
