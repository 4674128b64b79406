mod api_client;
mod config;
mod cum_perf;
mod log_util;
mod output_manager;
mod session_store;
mod ui_renderer;
mod view_managers;

use api_client::{
    BackendClient, CheckAnswersResponse, ExamQuestion, FUNCTION_KEY_ENV, GeneratedMaterials,
    GeneratedTests, LoadedSession, SaveSessionResponse, SavedTests, SessionSummary,
};
use chrono::Local;
use color_eyre::Result;
use config::ConfigForm;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use cum_perf::CumulativePerformance;
use dotenvy::dotenv;
use log_util::log_debug;
use output_manager::OutputManager;
use ratatui::{DefaultTerminal, Frame};
use session_store::LocalHistory;
use std::{
    collections::BTreeMap,
    future::Future,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};
use tokio::runtime::Runtime;
use ui_renderer::UiRenderer;
use view_managers::{ConfigManager, MenuManager, QuizManager, SessionsManager, StatsManager};

pub(crate) const API_LOADING_FRAMES: [&str; 4] = ["-", "\\", "|", "/"];
const HISTORY_DAYS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AppView {
    Menu,
    Quiz,
    Sessions,
    Stats,
    Config,
}

/// Updates produced by the background API worker thread.
#[derive(Debug)]
pub(crate) enum ApiTaskMessage {
    Generated(GeneratedMaterials, GeneratedTests),
    Graded(CheckAnswersResponse),
    SessionSaved(SaveSessionResponse),
    SessionList(Vec<SessionSummary>),
    SessionLoaded(LoadedSession),
    Error(String),
}

fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    let terminal = ratatui::init();
    let result = App::new().run(terminal);
    ratatui::restore();
    result
}

/// The main application which holds the state and logic of the application.
#[derive(Debug)]
pub struct App {
    /// Is the application running?
    pub(crate) running: bool,
    /// Current view being displayed.
    pub(crate) view: AppView,
    /// Currently selected index in the main menu.
    pub(crate) menu_index: usize,
    /// Human-readable label for today's date.
    pub(crate) session_date: String,
    /// Any error encountered while loading state or talking to the backend.
    pub(crate) error: Option<String>,
    /// Latest status message related to backend requests.
    pub(crate) api_status: Option<String>,
    /// Indicates whether a backend request is currently running.
    pub(crate) api_loading: bool,
    /// Spinner frame index for the active loading indicator.
    pub(crate) api_loading_frame: usize,
    /// Label shown next to the loading spinner.
    pub(crate) api_loading_label: String,
    /// Receives background API task updates.
    api_result_receiver: Option<Receiver<ApiTaskMessage>>,
    /// Backend client shared with the worker thread.
    pub(crate) client: BackendClient,
    /// Subject selected for the next kartkówka.
    pub(crate) subject: String,
    /// Topic the questions should cover.
    pub(crate) topic: String,
    /// Whether the topic field is currently being typed into.
    pub(crate) topic_editing: bool,
    /// Learning materials generated alongside the most recent quiz.
    pub(crate) materials: Option<GeneratedMaterials>,
    /// Questions of the active quiz.
    pub(crate) quiz_questions: Vec<ExamQuestion>,
    /// Backend identifier of the active quiz.
    pub(crate) quiz_kartkowka_id: String,
    /// Index of the question currently shown.
    pub(crate) quiz_index: usize,
    /// Index of the highlighted answer option.
    pub(crate) quiz_option_index: usize,
    /// Selected option letter per question index.
    pub(crate) quiz_answers: BTreeMap<usize, String>,
    /// Whether the active quiz has been graded.
    pub(crate) quiz_graded: bool,
    /// Running performance aggregate across graded quizzes.
    pub(crate) cumulative: Option<CumulativePerformance>,
    /// Identifier of the backend session the current state was loaded from.
    pub(crate) loaded_session_id: Option<String>,
    /// Saved sessions fetched from the backend.
    pub(crate) sessions: Vec<SessionSummary>,
    /// Currently selected session index.
    pub(crate) selected_session: Option<usize>,
    /// Aggregated local grading history for the stats view.
    pub(crate) local_history: Option<LocalHistory>,
    /// Holds the editable configuration state when rendering the config view.
    pub(crate) config_form: ConfigForm,
}

impl App {
    /// Construct a new instance of [`App`].
    pub fn new() -> Self {
        let mut aggregated_error: Option<String> = None;

        if let Err(err) = config::initialize() {
            Self::push_error(
                &mut aggregated_error,
                format!("Configuration load failed: {}", err),
            );
        }
        let config = config::current();

        let client = BackendClient::from_env(config.api_base.clone(), &config.function_key);
        if !client.has_function_key() {
            Self::push_error(
                &mut aggregated_error,
                format!(
                    "Brak klucza API. Ustaw {} albo wpisz klucz w ustawieniach.",
                    FUNCTION_KEY_ENV
                ),
            );
        }

        let mut subject = config.default_subject.clone();
        let mut topic = String::new();
        let mut quiz_questions = Vec::new();
        let mut quiz_graded = false;
        let mut cumulative = None;
        let mut loaded_session_id = None;

        match session_store::load_staged_session() {
            Ok(Some(staged)) => {
                if !staged.subject.is_empty() {
                    subject = staged.subject.clone();
                }
                topic = staged.topic.clone();
                if let Some(tests) = &staged.tests {
                    quiz_questions = tests.questions.clone();
                    quiz_graded = quiz_questions.iter().any(|q| q.is_correct.is_some());
                }
                cumulative = staged.cumulative_performance.clone();
                if !staged.id.is_empty() {
                    loaded_session_id = Some(staged.id.clone());
                }
                log_debug(&format!("App: restored staged session {}", staged.id));
            }
            Ok(None) => {}
            Err(err) => {
                Self::push_error(
                    &mut aggregated_error,
                    format!("Failed to restore staged session: {}", err),
                );
            }
        }

        Self {
            running: false,
            view: AppView::Menu,
            menu_index: 0,
            session_date: Local::now().format("%Y-%m-%d").to_string(),
            error: aggregated_error,
            api_status: None,
            api_loading: false,
            api_loading_frame: 0,
            api_loading_label: String::new(),
            api_result_receiver: None,
            client,
            subject,
            topic,
            topic_editing: false,
            materials: None,
            quiz_questions,
            quiz_kartkowka_id: String::new(),
            quiz_index: 0,
            quiz_option_index: 0,
            quiz_answers: BTreeMap::new(),
            quiz_graded,
            cumulative,
            loaded_session_id,
            sessions: Vec::new(),
            selected_session: None,
            local_history: None,
            config_form: ConfigForm::from_config(config::current()),
        }
    }

    /// Run the application's main loop.
    pub fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.running = true;
        let tick_rate = Duration::from_millis(120);
        while self.running {
            self.poll_api_messages();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events(tick_rate)?;
        }
        Ok(())
    }

    /// Dispatch rendering based on the active view.
    fn render(&mut self, frame: &mut Frame) {
        UiRenderer::new(self).render(frame);
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self, tick_rate: Duration) -> Result<()> {
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key),
                Event::Mouse(_) => {}
                Event::Resize(_, _) => {}
                _ => {}
            }
            self.poll_api_messages();
        } else {
            self.on_tick();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.api_loading {
            self.api_loading_frame = (self.api_loading_frame + 1) % API_LOADING_FRAMES.len();
            self.update_loading_status();
        }
        self.poll_api_messages();
    }

    fn poll_api_messages(&mut self) {
        let mut clear_receiver = false;
        if let Some(receiver) = self.api_result_receiver.as_ref() {
            match receiver.try_recv() {
                Ok(message) => {
                    self.api_loading = false;
                    clear_receiver = true;
                    self.handle_api_message(message);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.api_loading = false;
                    clear_receiver = true;
                    self.handle_api_error("Background API worker disconnected".to_string());
                }
            }
        }

        if clear_receiver {
            self.api_result_receiver = None;
        }
    }

    fn update_loading_status(&mut self) {
        if self.api_loading {
            let frame = API_LOADING_FRAMES[self.api_loading_frame % API_LOADING_FRAMES.len()];
            self.api_status = Some(format!("{} {}…", frame, self.api_loading_label));
        }
    }

    fn handle_api_message(&mut self, message: ApiTaskMessage) {
        match message {
            ApiTaskMessage::Generated(materials, tests) => self.handle_generated(materials, tests),
            ApiTaskMessage::Graded(response) => self.handle_graded(response),
            ApiTaskMessage::SessionSaved(response) => self.handle_session_saved(response),
            ApiTaskMessage::SessionList(sessions) => self.handle_session_list(sessions),
            ApiTaskMessage::SessionLoaded(session) => self.handle_session_loaded(session),
            ApiTaskMessage::Error(message) => self.handle_api_error(message),
        }
    }

    fn handle_generated(&mut self, materials: GeneratedMaterials, tests: GeneratedTests) {
        let question_count = tests.questions.len();
        self.quiz_kartkowka_id = tests.kartkowka_id.clone();
        self.quiz_questions = tests.questions;
        self.quiz_index = 0;
        self.quiz_option_index = 0;
        self.quiz_answers.clear();
        self.quiz_graded = false;
        self.materials = Some(materials);
        self.api_status = Some(format!("Wygenerowano {} pytań.", question_count));
        self.view = AppView::Quiz;
        log_debug(&format!(
            "App: generated quiz {} with {} question(s)",
            self.quiz_kartkowka_id, question_count
        ));
    }

    fn handle_graded(&mut self, response: CheckAnswersResponse) {
        let graded =
            QuizManager::apply_verdicts(&self.quiz_questions, &self.quiz_answers, &response);
        let tracker_input = QuizManager::tracker_questions(&graded);
        let updated = cum_perf::update_cumulative_performance(self.cumulative.as_ref(), &tracker_input);

        let total = graded.len() as u32;
        let correct = graded
            .iter()
            .filter(|q| q.is_correct == Some(true))
            .count() as u32;
        let accuracy = if total == 0 {
            0.0
        } else {
            f64::from(correct) / f64::from(total) * 100.0
        };

        if let Err(err) = session_store::record_graded_quiz(
            &self.session_date,
            &self.subject,
            &self.topic,
            total,
            correct,
            accuracy,
        ) {
            Self::push_error(
                &mut self.error,
                format!("Failed to record graded quiz locally: {}", err),
            );
        }

        let mut status_parts = vec![format!("Wynik: {}/{} ({:.0}%)", correct, total, accuracy)];

        let persist = config::current().write_output_artifacts;
        let artifact = OutputManager::new().write_session_report(
            &self.subject,
            &self.topic,
            &self.session_date,
            &graded,
            Some(&updated),
            persist,
        );
        if let Some(err) = artifact.error {
            Self::push_error(&mut self.error, format!("Report not written: {}", err));
        }
        if let Some(path) = artifact.path {
            status_parts.push(format!("Raport: {}", path.display()));
        }

        self.quiz_questions = graded;
        self.quiz_graded = true;
        self.cumulative = Some(updated);
        self.api_status = Some(status_parts.join(" • "));
        self.stage_current_session();
        self.view = AppView::Quiz;
        log_debug(&format!(
            "App: graded quiz {} ({}/{})",
            self.quiz_kartkowka_id, correct, total
        ));
    }

    fn handle_session_saved(&mut self, response: SaveSessionResponse) {
        if !response.session_id.is_empty() {
            self.loaded_session_id = Some(response.session_id.clone());
        }
        self.api_status = Some(format!("Sesja zapisana ({})", response.session_id));
        self.stage_current_session();
        log_debug(&format!("App: session saved as {}", response.session_id));
    }

    fn handle_session_list(&mut self, sessions: Vec<SessionSummary>) {
        self.selected_session = if sessions.is_empty() { None } else { Some(0) };
        self.api_status = Some(format!("Znaleziono {} sesji.", sessions.len()));
        self.sessions = sessions;
        self.view = AppView::Sessions;
    }

    fn handle_session_loaded(&mut self, session: LoadedSession) {
        if !session.subject.is_empty() {
            self.subject = session.subject.clone();
        }
        self.topic = session.topic.clone();
        self.quiz_questions = session
            .tests
            .as_ref()
            .map(|tests| tests.questions.clone())
            .unwrap_or_default();
        self.quiz_graded = self.quiz_questions.iter().any(|q| q.is_correct.is_some());
        self.quiz_kartkowka_id.clear();
        self.quiz_index = 0;
        self.quiz_option_index = 0;
        self.quiz_answers.clear();
        self.cumulative = session.cumulative_performance.clone();
        self.loaded_session_id = Some(session.id.clone());
        self.materials = None;
        self.api_status = Some(format!("Wczytano sesję {} / {}", session.subject, session.topic));

        if let Err(err) = session_store::stage_session(&session) {
            Self::push_error(
                &mut self.error,
                format!("Failed to stage loaded session: {}", err),
            );
        }

        self.view = AppView::Quiz;
        log_debug(&format!("App: loaded session {}", session.id));
    }

    fn handle_api_error(&mut self, message: String) {
        let trimmed = message.trim().to_string();
        if trimmed.starts_with("Failed to build Tokio runtime") {
            Self::push_error(&mut self.error, trimmed.clone());
            log_debug(&format!("App: {}", trimmed));
            self.api_status = Some("Unable to start API runtime".to_string());
        } else {
            Self::push_error(&mut self.error, format!("Backend request failed: {}", trimmed));
            log_debug(&format!("App: backend error: {}", trimmed));
            self.api_status = Some("Żądanie nie powiodło się".to_string());
        }
    }

    /// Snapshot the active quiz state into the staged-session slot.
    pub(crate) fn stage_current_session(&mut self) {
        let staged = LoadedSession {
            id: self
                .loaded_session_id
                .clone()
                .unwrap_or_else(|| self.quiz_kartkowka_id.clone()),
            subject: self.subject.clone(),
            topic: self.topic.clone(),
            custom_session_name: None,
            materials: None,
            tests: Some(SavedTests {
                questions: self.quiz_questions.clone(),
            }),
            cumulative_performance: self.cumulative.clone(),
        };
        if let Err(err) = session_store::stage_session(&staged) {
            Self::push_error(
                &mut self.error,
                format!("Failed to stage session locally: {}", err),
            );
        }
    }

    /// Run one backend call on a worker thread and deliver the result through
    /// the message channel. Ignored while another call is in flight.
    pub(crate) fn spawn_api_task<F, Fut>(&mut self, label: &str, task: F)
    where
        F: FnOnce(BackendClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ApiTaskMessage>>,
    {
        if self.api_loading {
            log_debug("App: API request already in progress; ignoring duplicate request");
            return;
        }

        let (sender, receiver) = mpsc::channel();
        self.api_result_receiver = Some(receiver);
        self.api_loading = true;
        self.api_loading_frame = 0;
        self.api_loading_label = label.to_string();
        self.update_loading_status();
        log_debug(&format!("App: starting background API task: {}", label));

        let client = self.client.clone();
        thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = sender.send(ApiTaskMessage::Error(format!(
                        "Failed to build Tokio runtime: {}",
                        err
                    )));
                    return;
                }
            };

            let result = runtime.block_on(task(client));
            drop(runtime);

            match result {
                Ok(message) => {
                    let _ = sender.send(message);
                }
                Err(err) => {
                    let _ = sender.send(ApiTaskMessage::Error(err.to_string()));
                }
            }
        });
    }

    /// Rebuild the backend client after configuration changes. The env var
    /// still wins over the stored key.
    pub(crate) fn rebuild_client(&mut self) {
        let config = config::current();
        self.client = BackendClient::from_env(config.api_base, &config.function_key);
    }

    pub(crate) fn refresh_local_history(&mut self) {
        match session_store::load_local_history(HISTORY_DAYS) {
            Ok(history) => {
                self.local_history = Some(history);
            }
            Err(err) => {
                self.local_history = None;
                Self::push_error(
                    &mut self.error,
                    format!("Failed to load local history: {}", err),
                );
            }
        }
    }

    /// Handles the key events and updates the state of [`App`].
    fn on_key_event(&mut self, key: KeyEvent) {
        let text_editing = match self.view {
            AppView::Config => self.config_form.is_editing(),
            AppView::Quiz => self.topic_editing,
            _ => false,
        };

        if !text_editing {
            match (key.modifiers, key.code) {
                (_, KeyCode::Esc | KeyCode::Char('q'))
                | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => {
                    self.quit();
                    return;
                }
                _ => {}
            }
        }

        match self.view {
            AppView::Menu => MenuManager::new(self).handle_key(key),
            AppView::Quiz => QuizManager::new(self).handle_key(key),
            AppView::Sessions => SessionsManager::new(self).handle_key(key),
            AppView::Stats => StatsManager::new(self).handle_key(key),
            AppView::Config => ConfigManager::new(self).handle_key(key),
        }
    }

    pub(crate) fn return_to_menu(&mut self) {
        if matches!(self.view, AppView::Config) {
            self.config_form = ConfigForm::from_config(config::current());
        }
        self.topic_editing = false;
        self.view = AppView::Menu;
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }

    /// Append a message to an optional error slot.
    pub(crate) fn push_error(slot: &mut Option<String>, message: String) {
        if let Some(existing) = slot {
            existing.push_str(" | ");
            existing.push_str(&message);
        } else {
            *slot = Some(message);
        }
    }
}
