use crate::view_managers::menu_manager::MENU_OPTIONS;
use crate::{API_LOADING_FRAMES, App, AppView, config, cum_perf::CumulativePerformance};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style, Stylize},
    text::Line,
    widgets::{Block, List, ListItem, ListState, Paragraph, Wrap},
};

pub(crate) struct UiRenderer<'a> {
    app: &'a mut App,
}

impl<'a> UiRenderer<'a> {
    pub(crate) fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    pub(crate) fn render(&mut self, frame: &mut Frame) {
        match self.app.view {
            AppView::Menu => self.render_menu(frame),
            AppView::Quiz => self.render_quiz(frame),
            AppView::Sessions => self.render_sessions(frame),
            AppView::Stats => self.render_stats(frame),
            AppView::Config => self.render_config(frame),
        }
    }

    fn base_layout(frame: &Frame) -> std::rc::Rc<[ratatui::layout::Rect]> {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(6),
                Constraint::Length(4),
            ])
            .split(frame.area())
    }

    fn header_title(app: &App) -> Line<'static> {
        Line::from(format!("Kartkówka • {}", app.session_date))
            .bold()
            .blue()
            .centered()
    }

    fn header_text(app: &App) -> String {
        let config = config::current();
        let student_line = if config.username.is_empty() {
            "Uczeń: <nie ustawiono>".to_string()
        } else if config.school_name.is_empty() && config.class_name.is_empty() {
            format!("Uczeń: {}", config.username)
        } else {
            format!(
                "Uczeń: {} ({} {})",
                config.username, config.school_name, config.class_name
            )
        };
        let topic_line = if app.topic.is_empty() {
            format!("Przedmiot: {}", app.subject)
        } else {
            format!("Przedmiot: {} • Temat: {}", app.subject, app.topic)
        };
        let session_line = match &app.loaded_session_id {
            Some(id) => format!("Sesja: {}", id),
            None => "Sesja: <nowa>".to_string(),
        };
        format!("{}\n{}\n{}", student_line, topic_line, session_line)
    }

    fn status_block(&self, frame: &mut Frame, area: ratatui::layout::Rect, hints: &[String]) {
        let app = &self.app;
        let mut status_lines = Vec::new();
        if let Some(error) = &app.error {
            status_lines.push(format!("Błąd: {}", error));
        }
        if let Some(status) = &app.api_status {
            status_lines.push(status.clone());
        }
        status_lines.extend(hints.iter().cloned());

        frame.render_widget(
            Paragraph::new(status_lines.join("\n"))
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Status"))),
            area,
        );
    }

    fn render_menu(&mut self, frame: &mut Frame) {
        let layout = Self::base_layout(frame);
        let header_title = Self::header_title(self.app);

        frame.render_widget(
            Paragraph::new(Self::header_text(self.app))
                .block(Block::bordered().title(header_title))
                .centered(),
            layout[0],
        );

        let menu_items: Vec<ListItem> = MENU_OPTIONS
            .iter()
            .map(|label| ListItem::new(*label))
            .collect();
        let mut menu_state = ListState::default();
        menu_state.select(Some(self.app.menu_index));

        frame.render_stateful_widget(
            List::new(menu_items)
                .block(Block::bordered().title(Line::from("Menu")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            layout[1],
            &mut menu_state,
        );

        let mut hints = vec![
            "↑/↓ lub j/k wybiera opcję, Enter zatwierdza.".to_string(),
            "1-4 wybiera bezpośrednio. Esc, Ctrl-C lub q kończy.".to_string(),
        ];
        if !self.app.quiz_questions.is_empty() {
            hints.push("Przywrócono ostatnią kartkówkę; wybierz 1, aby wrócić do niej.".to_string());
        }
        self.status_block(frame, layout[2], &hints);
    }

    fn render_quiz(&mut self, frame: &mut Frame) {
        let layout = Self::base_layout(frame);
        let header_title = Self::header_title(self.app);

        frame.render_widget(
            Paragraph::new(Self::header_text(self.app))
                .block(Block::bordered().title(header_title))
                .centered(),
            layout[0],
        );

        let app = &mut *self.app;
        let total = app.quiz_questions.len();

        let body_text = if app.api_loading {
            let frame_symbol = API_LOADING_FRAMES[app.api_loading_frame % API_LOADING_FRAMES.len()];
            format!(
                "{} {}…\n\nPytania pojawią się po zakończeniu generowania.",
                frame_symbol, app.api_loading_label
            )
        } else if total == 0 {
            let topic_display = if app.topic_editing {
                format!("{}_", app.topic)
            } else if app.topic.is_empty() {
                "<wpisz temat: t>".to_string()
            } else {
                app.topic.clone()
            };
            format!(
                "Nowa kartkówka\n\nPrzedmiot: {}  (←/→ zmienia)\nTemat: {}\n\nEnter lub g generuje pytania.",
                app.subject, topic_display
            )
        } else {
            if app.quiz_index >= total {
                app.quiz_index = 0;
            }
            let question = &app.quiz_questions[app.quiz_index];
            let mut option_lines = Vec::new();
            let chosen = app.quiz_answers.get(&app.quiz_index).cloned();
            for (index, letter) in crate::api_client::ExamOptions::LETTERS
                .iter()
                .copied()
                .enumerate()
            {
                let marker = if app.quiz_graded {
                    if letter == question.correct_answer {
                        "[✓]"
                    } else if question.user_answer.as_deref() == Some(letter)
                        && question.is_correct == Some(false)
                    {
                        "[✗]"
                    } else {
                        "[ ]"
                    }
                } else if chosen.as_deref() == Some(letter) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let prefix = if !app.quiz_graded && index == app.quiz_option_index {
                    "▶"
                } else {
                    " "
                };
                option_lines.push(format!(
                    "{} {} {}. {}",
                    prefix,
                    marker,
                    letter,
                    question.options.text_for(letter)
                ));
            }

            let verdict_line = if app.quiz_graded {
                match question.is_correct {
                    Some(true) => "\n\nOdpowiedź poprawna.".to_string(),
                    Some(false) => format!(
                        "\n\nOdpowiedź błędna. Poprawna: {}.",
                        question.correct_answer
                    ),
                    None => "\n\nBrak odpowiedzi na to pytanie.".to_string(),
                }
            } else {
                format!("\n\nUdzielone odpowiedzi: {}/{}", app.quiz_answers.len(), total)
            };

            let concept_line = if question.concept_name.is_empty() {
                String::new()
            } else {
                format!("\nPojęcie: {}", question.concept_name)
            };

            format!(
                "Pytanie {}/{}{}\n\n{}\n\n{}{}",
                app.quiz_index + 1,
                total,
                concept_line,
                question.question,
                option_lines.join("\n"),
                verdict_line
            )
        };

        frame.render_widget(
            Paragraph::new(body_text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Kartkówka"))),
            layout[1],
        );

        let hints = if self.app.topic_editing {
            vec!["Wpisz temat. Enter zatwierdza, Esc anuluje.".to_string()]
        } else if total == 0 {
            vec![
                "←/→ zmienia przedmiot, t edytuje temat, Enter generuje.".to_string(),
                "m wraca do menu.".to_string(),
            ]
        } else if self.app.quiz_graded {
            vec![
                "←/→ przegląda pytania, s zapisuje sesję, n nowa kartkówka.".to_string(),
                "m wraca do menu.".to_string(),
            ]
        } else {
            vec![
                "↑/↓ wybiera odpowiedź, Enter zaznacza, ←/→ zmienia pytanie.".to_string(),
                "g sprawdza odpowiedzi, m wraca do menu.".to_string(),
            ]
        };
        self.status_block(frame, layout[2], &hints);
    }

    fn render_sessions(&mut self, frame: &mut Frame) {
        let layout = Self::base_layout(frame);
        let header_title = Self::header_title(self.app);

        frame.render_widget(
            Paragraph::new(Self::header_text(self.app))
                .block(Block::bordered().title(header_title))
                .centered(),
            layout[0],
        );

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[1]);

        let app = &mut *self.app;
        let list_items: Vec<ListItem> = if app.sessions.is_empty() {
            let placeholder = if app.api_loading {
                let frame_symbol =
                    API_LOADING_FRAMES[app.api_loading_frame % API_LOADING_FRAMES.len()];
                format!("{} {}…", frame_symbol, app.api_loading_label)
            } else {
                "Brak zapisanych sesji.".to_string()
            };
            vec![ListItem::new(placeholder)]
        } else {
            app.sessions
                .iter()
                .map(|session| {
                    let score = session
                        .performance
                        .as_ref()
                        .and_then(|perf| perf.overall_score)
                        .map(|score| format!("{:.0}%", score))
                        .unwrap_or_else(|| "-".to_string());
                    ListItem::new(format!(
                        "{:<10} | {:<20} | {}",
                        session.subject, session.topic, score
                    ))
                })
                .collect()
        };

        let mut list_state = ListState::default();
        list_state.select(app.selected_session);

        frame.render_stateful_widget(
            List::new(list_items)
                .block(Block::bordered().title(Line::from("Sesje")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            body[0],
            &mut list_state,
        );

        let detail_text = match app
            .selected_session
            .and_then(|index| app.sessions.get(index))
        {
            Some(session) => {
                let name = session.id.as_str();
                let score_line = match session
                    .performance
                    .as_ref()
                    .and_then(|perf| perf.overall_score)
                {
                    Some(score) => format!("Skuteczność: {:.0}%", score),
                    None => "Skuteczność: brak danych".to_string(),
                };
                format!(
                    "Identyfikator: {}\nPrzedmiot: {}\nTemat: {}\nUtworzono: {}\nZmieniono: {}\n{}",
                    name,
                    session.subject,
                    session.topic,
                    session.created_at,
                    session.last_modified_at,
                    score_line
                )
            }
            None => "Wybierz sesję, aby zobaczyć szczegóły.".to_string(),
        };

        frame.render_widget(
            Paragraph::new(detail_text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Szczegóły"))),
            body[1],
        );

        let hints = vec![
            "↑/↓ lub j/k wybiera sesję, Enter wczytuje, r odświeża.".to_string(),
            "m wraca do menu.".to_string(),
        ];
        self.status_block(frame, layout[2], &hints);
    }

    fn render_stats(&mut self, frame: &mut Frame) {
        let layout = Self::base_layout(frame);
        let header_title = Self::header_title(self.app);

        frame.render_widget(
            Paragraph::new(Self::header_text(self.app))
                .block(Block::bordered().title(header_title))
                .centered(),
            layout[0],
        );

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(6)])
            .split(layout[1]);

        let overview_text = match &self.app.cumulative {
            Some(cumulative) => Self::cumulative_text(cumulative),
            None => "Brak wyników. Rozwiąż kartkówkę, aby zebrać statystyki.".to_string(),
        };

        frame.render_widget(
            Paragraph::new(overview_text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Wyniki"))),
            sections[0],
        );

        let history_text = match &self.app.local_history {
            Some(history) if history.total_quizzes > 0 => {
                let active_days = history.daily.iter().filter(|day| day.quizzes > 0).count();
                let recent: Vec<String> = history
                    .daily
                    .iter()
                    .filter(|day| day.quizzes > 0)
                    .map(|day| {
                        format!(
                            "{}: {} kartkówek, {}/{} poprawnych",
                            day.date.format("%Y-%m-%d"),
                            day.quizzes,
                            day.correct,
                            day.questions
                        )
                    })
                    .collect();
                format!(
                    "Ostatnie {} dni: {} kartkówek w {} dniach, {}/{} poprawnych\n{}",
                    history.daily.len(),
                    history.total_quizzes,
                    active_days,
                    history.total_correct,
                    history.total_questions,
                    recent.join("\n")
                )
            }
            Some(_) => "Brak lokalnej historii w ostatnich dniach.".to_string(),
            None => "Historia lokalna niedostępna.".to_string(),
        };

        frame.render_widget(
            Paragraph::new(history_text)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(Line::from("Historia"))),
            sections[1],
        );

        let hints = vec![
            "r odświeża lokalną historię.".to_string(),
            "m wraca do menu.".to_string(),
        ];
        self.status_block(frame, layout[2], &hints);
    }

    /// Overall totals plus the concept breakdown, weakest concepts first.
    fn cumulative_text(cumulative: &CumulativePerformance) -> String {
        let trend_display = |trend: f64| {
            if trend > 0.0 {
                format!("↑ {:.1}", trend)
            } else if trend < 0.0 {
                format!("↓ {:.1}", trend.abs())
            } else {
                "→ 0.0".to_string()
            }
        };

        let mut text = format!(
            "Testy: {} • Pytania: {} • Poprawne: {} • Skuteczność: {:.0}% • Trend: {}\n",
            cumulative.total_tests,
            cumulative.total_questions,
            cumulative.total_correct_answers,
            cumulative.overall_accuracy,
            trend_display(cumulative.overall_trend)
        );

        if !cumulative.recent_test_scores.is_empty() {
            let scores: Vec<String> = cumulative
                .recent_test_scores
                .iter()
                .map(|score| format!("{:.0}%", score))
                .collect();
            text.push_str(&format!("Ostatnie wyniki: {}\n", scores.join(", ")));
        }

        if cumulative.concept_performance.is_empty() {
            text.push_str("\nBrak danych o pojęciach.");
        } else {
            text.push_str("\nPojęcia (od najsłabszych):\n");
            let mut concepts: Vec<_> = cumulative.concept_performance.values().collect();
            concepts.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
            for concept in concepts {
                text.push_str(&format!(
                    "- {}: {:.0}% ({}/{}), poziom: {}, trend: {}\n",
                    concept.concept_name,
                    concept.accuracy,
                    concept.correct_answers,
                    concept.total_questions,
                    concept.suggested_difficulty.label(),
                    trend_display(concept.trend)
                ));
            }
        }

        text
    }

    fn render_config(&mut self, frame: &mut Frame) {
        let layout = Self::base_layout(frame);
        let header_title = Self::header_title(self.app);

        let config_path = config::config_file_path();
        let header_text = format!(
            "Plik konfiguracji: {}\nDane ucznia i połączenie z backendem.",
            config_path.display()
        );

        frame.render_widget(
            Paragraph::new(header_text)
                .block(Block::bordered().title(header_title))
                .centered(),
            layout[0],
        );

        let app = &mut *self.app;
        let form = &app.config_form;
        let editing_suffix = |selected: bool| {
            if selected && form.is_editing() {
                format!(" (edycja: {}_)", form.edit_buffer_display())
            } else {
                String::new()
            }
        };
        let selected = form.selected_index();

        let items = vec![
            ListItem::new(format!(
                "Nazwa użytkownika: {}{}",
                form.username,
                editing_suffix(selected == 0)
            )),
            ListItem::new(format!(
                "Szkoła: {}{}",
                form.school_name,
                editing_suffix(selected == 1)
            )),
            ListItem::new(format!(
                "Klasa: {}{}",
                form.class_name,
                editing_suffix(selected == 2)
            )),
            ListItem::new(format!("Domyślny przedmiot: {}", form.default_subject)),
            ListItem::new(format!(
                "Adres API: {}{}",
                if form.api_base.is_empty() {
                    "<domyślny>"
                } else {
                    form.api_base.as_str()
                },
                editing_suffix(selected == 4)
            )),
            ListItem::new(if selected == 5 && form.is_editing() {
                format!("Klucz funkcji (edycja): {}_", form.edit_buffer_display())
            } else {
                format!("Klucz funkcji: {}", form.masked_function_key())
            }),
            ListItem::new(format!(
                "Zapisywanie raportów: {}",
                if form.write_output_artifacts {
                    "włączone"
                } else {
                    "wyłączone"
                }
            )),
        ];

        let mut list_state = ListState::default();
        list_state.select(Some(selected));

        frame.render_stateful_widget(
            List::new(items)
                .block(Block::bordered().title(Line::from("Ustawienia")))
                .highlight_symbol("▶ ")
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            layout[1],
            &mut list_state,
        );

        let mut hints = vec![
            "↑/↓ wybiera pole, ←/→ przełącza przedmiot i raporty.".to_string(),
            "Enter edytuje pole tekstowe, s zapisuje, r przywraca, m wraca do menu.".to_string(),
        ];
        if app.config_form.dirty {
            hints.push("Niezapisane zmiany".to_string());
        }
        if let Some(config_status) = &app.config_form.status {
            hints.push(config_status.clone());
        }
        self.status_block(frame, layout[2], &hints);
    }
}
