pub mod config_manager;
pub mod menu_manager;
pub mod quiz_manager;
pub mod sessions_manager;
pub mod stats_manager;

pub(crate) use config_manager::ConfigManager;
pub(crate) use menu_manager::MenuManager;
pub(crate) use quiz_manager::QuizManager;
pub(crate) use sessions_manager::SessionsManager;
pub(crate) use stats_manager::StatsManager;
