use crate::{api_client::ExamQuestion, cum_perf::CumulativePerformance};
use std::{env, fs, path::PathBuf};

#[derive(Debug)]
pub struct OutputManager {
    root: PathBuf,
}

/// Result of rendering a graded-quiz report: the markdown itself plus the
/// path it was persisted to, if persistence was requested and succeeded.
#[derive(Debug)]
pub struct ReportArtifact {
    pub path: Option<PathBuf>,
    pub content: String,
    pub error: Option<String>,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::with_root("output")
    }
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Render a markdown report for one graded quiz and, when `persist` is
    /// set, write it under the output directory.
    pub fn write_session_report(
        &self,
        subject: &str,
        topic: &str,
        session_date: &str,
        questions: &[ExamQuestion],
        cumulative: Option<&CumulativePerformance>,
        persist: bool,
    ) -> ReportArtifact {
        let mut error: Option<String> = None;
        let mut target_path: Option<PathBuf> = None;

        if persist {
            match self.output_directory() {
                Ok(dir) => {
                    if let Err(err) = fs::create_dir_all(&dir) {
                        error = Some(format!("{}: {}", dir.display(), err));
                    } else {
                        let mut candidate = dir;
                        candidate.push(format!(
                            "kartkowka-{}-{}.md",
                            session_date,
                            sanitize_for_filename(topic)
                        ));
                        target_path = Some(candidate);
                    }
                }
                Err(err) => {
                    error = Some(err);
                }
            }
        }

        let content = render_report(subject, topic, session_date, questions, cumulative);

        let mut written_path = None;
        if let Some(path) = target_path {
            match fs::write(&path, &content) {
                Ok(_) => {
                    written_path = Some(path);
                }
                Err(err) => {
                    error = Some(format!("{}: {}", path.display(), err));
                }
            }
        }

        ReportArtifact {
            path: written_path,
            content,
            error,
        }
    }

    pub fn output_directory(&self) -> Result<PathBuf, String> {
        if self.root.is_absolute() {
            return Ok(self.root.clone());
        }

        match env::current_dir() {
            Ok(mut dir) => {
                dir.push(&self.root);
                Ok(dir)
            }
            Err(err) => Err(format!("failed to resolve current directory: {}", err)),
        }
    }
}

fn render_report(
    subject: &str,
    topic: &str,
    session_date: &str,
    questions: &[ExamQuestion],
    cumulative: Option<&CumulativePerformance>,
) -> String {
    let mut document = format!("# Kartkówka - {} / {} - {}\n\n", subject, topic, session_date);

    if questions.is_empty() {
        document.push_str("_No graded questions in this quiz._\n");
    } else {
        document.push_str("## Pytania\n\n");
        for (index, question) in questions.iter().enumerate() {
            let verdict = match question.is_correct {
                Some(true) => "poprawnie",
                Some(false) => "błędnie",
                None => "bez odpowiedzi",
            };
            let answer = question.user_answer.as_deref().unwrap_or("-");
            document.push_str(&format!(
                "{}. {} • odpowiedź: {} ({}), klucz: {}\n",
                index + 1,
                question.question,
                answer,
                verdict,
                question.correct_answer
            ));
        }
        document.push('\n');
    }

    if let Some(cumulative) = cumulative {
        document.push_str("## Statystyki\n\n");
        document.push_str(&format!(
            "Testy: {} • Pytania: {} • Poprawne: {} • Skuteczność: {:.0}%\n\n",
            cumulative.total_tests,
            cumulative.total_questions,
            cumulative.total_correct_answers,
            cumulative.overall_accuracy
        ));

        let mut concepts: Vec<_> = cumulative.concept_performance.values().collect();
        concepts.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
        for concept in concepts {
            document.push_str(&format!(
                "- {}: {:.0}% ({})\n",
                concept.concept_name,
                concept.accuracy,
                concept.suggested_difficulty.label()
            ));
        }
    }

    document
}

fn sanitize_for_filename(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "sesja".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cum_perf::{TestQuestion, update_cumulative_performance};

    fn graded_question(correct: bool) -> ExamQuestion {
        ExamQuestion {
            question: "Co wytwarza fotosynteza?".to_string(),
            correct_answer: "A".to_string(),
            question_id: "q-1".to_string(),
            concept_id: "c1".to_string(),
            concept_name: "Fotosynteza".to_string(),
            user_answer: Some(if correct { "A" } else { "C" }.to_string()),
            is_correct: Some(correct),
            ..ExamQuestion::default()
        }
    }

    #[test]
    fn report_lists_questions_and_statistics() {
        let questions = vec![graded_question(true), graded_question(false)];
        let tracker_input: Vec<TestQuestion> = vec![
            TestQuestion {
                question_id: "q-1".to_string(),
                question: "Co wytwarza fotosynteza?".to_string(),
                concept_id: "c1".to_string(),
                concept_name: "Fotosynteza".to_string(),
                is_correct: Some(true),
                ..TestQuestion::default()
            },
            TestQuestion {
                question_id: "q-2".to_string(),
                question: "Co wytwarza fotosynteza?".to_string(),
                concept_id: "c1".to_string(),
                concept_name: "Fotosynteza".to_string(),
                is_correct: Some(false),
                ..TestQuestion::default()
            },
        ];
        let cumulative = update_cumulative_performance(None, &tracker_input);

        let artifact = OutputManager::new().write_session_report(
            "Biologia",
            "Fotosynteza",
            "2025-03-01",
            &questions,
            Some(&cumulative),
            false,
        );

        assert!(artifact.path.is_none());
        assert!(artifact.error.is_none());
        assert!(artifact.content.contains("Biologia"));
        assert!(artifact.content.contains("• odpowiedź: A (poprawnie)"));
        assert!(artifact.content.contains("• odpowiedź: C (błędnie)"));
        assert!(artifact.content.contains("Skuteczność: 50%"));
        assert!(artifact.content.contains("Fotosynteza: 50% (Średni)"));
    }

    #[test]
    fn report_handles_empty_quiz() {
        let artifact = OutputManager::new().write_session_report(
            "Chemia",
            "Kwasy",
            "2025-03-01",
            &[],
            None,
            false,
        );
        assert!(artifact.content.contains("_No graded questions"));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_for_filename("Rozbiory Polski!"), "rozbiory-polski");
        assert_eq!(sanitize_for_filename("???"), "sesja");
    }
}
