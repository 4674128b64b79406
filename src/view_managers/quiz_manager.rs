use std::collections::BTreeMap;

use crate::{
    App, AppView, ApiTaskMessage,
    api_client::{
        CheckAnswersRequest, CheckAnswersResponse, ExamOptions, ExamQuestion, GenerateRequest,
        GeneratedMaterials, SaveSessionRequest, SavedMaterials, SavedTests,
    },
    config,
    cum_perf::TestQuestion,
    log_util::log_debug,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Drives the quiz view: topic entry, answering, grading, and saving.
pub(crate) struct QuizManager<'a> {
    app: &'a mut App,
}

impl<'a> QuizManager<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn show_quiz(app: &'a mut App) {
        app.view = AppView::Quiz;
        if app.quiz_questions.is_empty() && app.topic.is_empty() {
            app.topic_editing = true;
        }
        log_debug("App: opened quiz view");
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if self.app.topic_editing {
            self.handle_topic_edit_key(key);
            return;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('t')) => {
                self.app.topic_editing = true;
            }
            (KeyModifiers::NONE, KeyCode::Char('m')) => self.app.return_to_menu(),
            (KeyModifiers::NONE, KeyCode::Char('n')) => self.reset_quiz(),
            _ if self.app.quiz_questions.is_empty() => self.handle_setup_key(key),
            _ if self.app.quiz_graded => self.handle_review_key(key),
            _ => self.handle_answer_key(key),
        }
    }

    fn handle_topic_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.app.topic = self.app.topic.trim().to_string();
                self.app.topic_editing = false;
                if self.app.quiz_questions.is_empty() && !self.app.topic.is_empty() {
                    self.generate_quiz();
                }
            }
            KeyCode::Esc => {
                self.app.topic_editing = false;
            }
            KeyCode::Backspace => {
                self.app.topic.pop();
            }
            KeyCode::Char(c) if !c.is_control() => {
                self.app.topic.push(c);
            }
            _ => {}
        }
    }

    fn handle_setup_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Left | KeyCode::Char('h')) => self.cycle_subject(-1),
            (KeyModifiers::NONE, KeyCode::Right | KeyCode::Char('l')) => self.cycle_subject(1),
            (KeyModifiers::NONE, KeyCode::Enter | KeyCode::Char('g')) => self.generate_quiz(),
            _ => {}
        }
    }

    fn handle_answer_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Down | KeyCode::Char('j')) => self.next_option(),
            (KeyModifiers::NONE, KeyCode::Up | KeyCode::Char('k')) => self.previous_option(),
            (KeyModifiers::NONE, KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp) => {
                self.previous_question()
            }
            (KeyModifiers::NONE, KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown) => {
                self.next_question()
            }
            (KeyModifiers::NONE, KeyCode::Enter | KeyCode::Char(' ')) => self.select_answer(),
            (KeyModifiers::NONE, KeyCode::Char('g')) => self.grade_quiz(),
            _ => {}
        }
    }

    fn handle_review_key(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp) => {
                self.previous_question()
            }
            (KeyModifiers::NONE, KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown) => {
                self.next_question()
            }
            (KeyModifiers::NONE, KeyCode::Char('s')) => self.save_session(),
            _ => {}
        }
    }

    fn cycle_subject(&mut self, delta: isize) {
        let position = config::SUBJECTS
            .iter()
            .position(|subject| *subject == self.app.subject)
            .unwrap_or(0);
        let updated = if delta > 0 {
            (position + 1) % config::SUBJECTS.len()
        } else if position == 0 {
            config::SUBJECTS.len() - 1
        } else {
            position - 1
        };
        self.app.subject = config::SUBJECTS[updated].to_string();
    }

    fn next_question(&mut self) {
        let total = self.app.quiz_questions.len();
        if total == 0 {
            return;
        }
        self.app.quiz_index = (self.app.quiz_index + 1) % total;
        self.app.quiz_option_index = 0;
    }

    fn previous_question(&mut self) {
        let total = self.app.quiz_questions.len();
        if total == 0 {
            return;
        }
        if self.app.quiz_index == 0 {
            self.app.quiz_index = total - 1;
        } else {
            self.app.quiz_index -= 1;
        }
        self.app.quiz_option_index = 0;
    }

    fn next_option(&mut self) {
        self.app.quiz_option_index = (self.app.quiz_option_index + 1) % ExamOptions::LETTERS.len();
    }

    fn previous_option(&mut self) {
        if self.app.quiz_option_index == 0 {
            self.app.quiz_option_index = ExamOptions::LETTERS.len() - 1;
        } else {
            self.app.quiz_option_index -= 1;
        }
    }

    /// Record the highlighted letter for the current question and advance to
    /// the next unanswered one.
    fn select_answer(&mut self) {
        if self.app.quiz_questions.is_empty() || self.app.quiz_graded {
            return;
        }
        let letter = ExamOptions::LETTERS[self.app.quiz_option_index % ExamOptions::LETTERS.len()];
        self.app
            .quiz_answers
            .insert(self.app.quiz_index, letter.to_string());
        log_debug(&format!(
            "App: answered question {} with {}",
            self.app.quiz_index + 1,
            letter
        ));

        let total = self.app.quiz_questions.len();
        for offset in 1..=total {
            let candidate = (self.app.quiz_index + offset) % total;
            if !self.app.quiz_answers.contains_key(&candidate) {
                self.app.quiz_index = candidate;
                self.app.quiz_option_index = 0;
                return;
            }
        }
        self.app.api_status =
            Some("Wszystkie pytania mają odpowiedź. Naciśnij g, aby sprawdzić.".to_string());
    }

    fn reset_quiz(&mut self) {
        self.app.quiz_questions.clear();
        self.app.quiz_answers.clear();
        self.app.quiz_kartkowka_id.clear();
        self.app.quiz_index = 0;
        self.app.quiz_option_index = 0;
        self.app.quiz_graded = false;
        self.app.materials = None;
        self.app.topic.clear();
        self.app.topic_editing = true;

        // Keep the staged slot in step: drop it entirely when there is no
        // aggregate or session lineage worth restoring.
        if self.app.cumulative.is_none() && self.app.loaded_session_id.is_none() {
            if let Err(err) = crate::session_store::clear_staged_session() {
                App::push_error(
                    &mut self.app.error,
                    format!("Failed to clear staged session: {}", err),
                );
            }
        } else {
            self.app.stage_current_session();
        }
        log_debug("App: quiz state reset for a new kartkówka");
    }

    fn generate_quiz(&mut self) {
        let config = config::current();
        if config.username.is_empty() {
            App::push_error(
                &mut self.app.error,
                "Ustaw nazwę użytkownika w ustawieniach przed generowaniem.".to_string(),
            );
            return;
        }
        if self.app.topic.is_empty() {
            self.app.topic_editing = true;
            self.app.api_status = Some("Najpierw wpisz temat kartkówki.".to_string());
            return;
        }

        let request = GenerateRequest {
            subject: self.app.subject.clone(),
            topic: self.app.topic.clone(),
            username: config.username,
            curriculum_topic_ids: Vec::new(),
            concept_ids: Vec::new(),
            kartkowka_id: None,
        };

        self.app
            .spawn_api_task("Generowanie kartkówki", move |client| async move {
                let materials = client.generate_learning_materials(&request).await?;
                let mut tests_request = request;
                if !materials.quiz_session_id.is_empty() {
                    tests_request.kartkowka_id = Some(materials.quiz_session_id.clone());
                }
                let tests = client.generate_tests(&tests_request).await?;
                Ok(ApiTaskMessage::Generated(materials, tests))
            });
    }

    fn grade_quiz(&mut self) {
        if self.app.quiz_questions.is_empty() || self.app.quiz_graded {
            return;
        }
        let unanswered = (0..self.app.quiz_questions.len())
            .filter(|index| !self.app.quiz_answers.contains_key(index))
            .count();
        if unanswered > 0 {
            self.app.api_status = Some(format!(
                "Odpowiedz na wszystkie pytania ({} bez odpowiedzi).",
                unanswered
            ));
            return;
        }

        let request = CheckAnswersRequest {
            username: config::current().username,
            kartkowka_id: self.app.quiz_kartkowka_id.clone(),
            questions: self.app.quiz_questions.clone(),
            answers: self.app.quiz_answers.clone(),
        };

        self.app
            .spawn_api_task("Sprawdzanie odpowiedzi", move |client| async move {
                let response = client.check_test_answers(&request).await?;
                Ok(ApiTaskMessage::Graded(response))
            });
    }

    fn save_session(&mut self) {
        if self.app.quiz_questions.is_empty() {
            return;
        }
        let config = config::current();
        if config.username.is_empty() {
            App::push_error(
                &mut self.app.error,
                "Ustaw nazwę użytkownika w ustawieniach przed zapisem.".to_string(),
            );
            return;
        }

        let request = SaveSessionRequest {
            username: config.username,
            subject: self.app.subject.clone(),
            topic: self.app.topic.clone(),
            custom_session_name: None,
            loaded_session_id: self.app.loaded_session_id.clone(),
            curriculum_topic_ids: Vec::new(),
            topic_names: vec![self.app.topic.clone()],
            concept_ids: Vec::new(),
            materials: self.app.materials.as_ref().map(saved_materials),
            tests: Some(SavedTests {
                questions: self.app.quiz_questions.clone(),
            }),
            cumulative_performance: self.app.cumulative.clone(),
        };

        self.app
            .spawn_api_task("Zapisywanie sesji", move |client| async move {
                let response = client.save_learning_session(&request).await?;
                Ok(ApiTaskMessage::SessionSaved(response))
            });
    }

    /// Merge the selected letters and backend verdicts back into the question
    /// list. A missing verdict falls back to comparing against the answer key.
    pub(crate) fn apply_verdicts(
        questions: &[ExamQuestion],
        answers: &BTreeMap<usize, String>,
        response: &CheckAnswersResponse,
    ) -> Vec<ExamQuestion> {
        questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let mut graded = question.clone();
                graded.user_answer = answers.get(&index).cloned();
                graded.is_correct = match response.results.get(index).and_then(|v| v.is_correct) {
                    Some(verdict) => Some(verdict),
                    None => graded
                        .user_answer
                        .as_ref()
                        .map(|answer| *answer == graded.correct_answer),
                };
                graded
            })
            .collect()
    }

    /// Project graded questions into the shape the performance tracker folds.
    pub(crate) fn tracker_questions(questions: &[ExamQuestion]) -> Vec<TestQuestion> {
        questions
            .iter()
            .map(|question| TestQuestion {
                question_id: question.question_id.clone(),
                question: question.question.clone(),
                concept_id: question.concept_id.clone(),
                concept_name: question.concept_name.clone(),
                correct_answer: question.correct_answer.clone(),
                user_answer: question.user_answer.clone(),
                is_correct: question.is_correct,
                difficulty: question.difficulty.clone(),
            })
            .collect()
    }
}

fn saved_materials(materials: &GeneratedMaterials) -> SavedMaterials {
    SavedMaterials {
        notes: materials.notes.clone(),
        flashcards: materials.flashcards.clone(),
        mind_map_description: materials.mind_map_description.clone(),
        materials_used_in_session: materials.materials_used_in_session.clone(),
        consistency_warning: materials.consistency_warning.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::QuestionVerdict;
    use crate::cum_perf::update_cumulative_performance;

    fn question(id: &str, concept: &str, correct_answer: &str) -> ExamQuestion {
        ExamQuestion {
            question: format!("Pytanie {id}"),
            correct_answer: correct_answer.to_string(),
            question_id: id.to_string(),
            concept_id: concept.to_string(),
            concept_name: format!("Pojęcie {concept}"),
            ..ExamQuestion::default()
        }
    }

    #[test]
    fn verdicts_are_applied_per_question_index() {
        let questions = vec![question("q1", "c1", "A"), question("q2", "c1", "B")];
        let mut answers = BTreeMap::new();
        answers.insert(0, "A".to_string());
        answers.insert(1, "C".to_string());
        let response = CheckAnswersResponse {
            results: vec![
                QuestionVerdict {
                    is_correct: Some(true),
                },
                QuestionVerdict {
                    is_correct: Some(false),
                },
            ],
        };

        let graded = QuizManager::apply_verdicts(&questions, &answers, &response);

        assert_eq!(graded[0].user_answer.as_deref(), Some("A"));
        assert_eq!(graded[0].is_correct, Some(true));
        assert_eq!(graded[1].user_answer.as_deref(), Some("C"));
        assert_eq!(graded[1].is_correct, Some(false));
    }

    #[test]
    fn missing_verdict_falls_back_to_the_answer_key() {
        let questions = vec![question("q1", "c1", "B"), question("q2", "c1", "D")];
        let mut answers = BTreeMap::new();
        answers.insert(0, "B".to_string());
        answers.insert(1, "A".to_string());
        let response = CheckAnswersResponse { results: vec![] };

        let graded = QuizManager::apply_verdicts(&questions, &answers, &response);

        assert_eq!(graded[0].is_correct, Some(true));
        assert_eq!(graded[1].is_correct, Some(false));
    }

    #[test]
    fn unanswered_question_stays_ungraded_without_a_verdict() {
        let questions = vec![question("q1", "c1", "A")];
        let answers = BTreeMap::new();
        let response = CheckAnswersResponse { results: vec![] };

        let graded = QuizManager::apply_verdicts(&questions, &answers, &response);

        assert!(graded[0].user_answer.is_none());
        assert!(graded[0].is_correct.is_none());
    }

    #[test]
    fn graded_quiz_feeds_the_performance_tracker() {
        let questions = vec![question("q1", "c1", "A"), question("q2", "c2", "B")];
        let mut answers = BTreeMap::new();
        answers.insert(0, "A".to_string());
        answers.insert(1, "C".to_string());
        let response = CheckAnswersResponse {
            results: vec![
                QuestionVerdict {
                    is_correct: Some(true),
                },
                QuestionVerdict {
                    is_correct: Some(false),
                },
            ],
        };

        let graded = QuizManager::apply_verdicts(&questions, &answers, &response);
        let tracker_input = QuizManager::tracker_questions(&graded);
        let cumulative = update_cumulative_performance(None, &tracker_input);

        assert_eq!(cumulative.total_tests, 1);
        assert_eq!(cumulative.total_questions, 2);
        assert_eq!(cumulative.total_correct_answers, 1);
        assert_eq!(cumulative.concept_performance.len(), 2);
        assert_eq!(cumulative.concept_performance["c1"].correct_answers, 1);
        assert_eq!(cumulative.concept_performance["c2"].correct_answers, 0);
    }
}
