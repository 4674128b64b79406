use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Duration, NaiveDate, Utc};
use color_eyre::eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;

use crate::{api_client::LoadedSession, output_manager::OutputManager};

const DATABASE_FILENAME: &str = "kartkowka_history.sqlite";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyQuizStats {
    pub date: NaiveDate,
    pub quizzes: u32,
    pub questions: u32,
    pub correct: u32,
}

/// Locally recorded grading history, independent of the backend aggregate.
#[derive(Debug, Clone, Default)]
pub struct LocalHistory {
    pub daily: Vec<DailyQuizStats>,
    pub total_quizzes: u32,
    pub total_questions: u32,
    pub total_correct: u32,
}

/// Persist the most recently loaded or graded session so the next launch can
/// restore it. Single-slot blob, the SPA's localStorage analog.
pub fn stage_session(session: &LoadedSession) -> Result<()> {
    let db_path = database_path()?;
    stage_session_at_path(&db_path, session)
}

pub(crate) fn stage_session_at_path(db_path: &Path, session: &LoadedSession) -> Result<()> {
    let payload = serde_json::to_string(session)
        .wrap_err("failed to serialise session payload for staging")?;

    let mut connection = connection_for_path(db_path)?;
    initialize_schema(&mut connection)?;
    connection
        .execute(
            "INSERT INTO staged_session (slot, updated_at, payload) VALUES (0, ?1, ?2)
            ON CONFLICT(slot) DO UPDATE SET updated_at = ?1, payload = ?2",
            params![Utc::now().to_rfc3339(), &payload],
        )
        .wrap_err("failed to stage session")?;
    Ok(())
}

/// Load the staged session blob, if any. A missing database is not an error.
pub fn load_staged_session() -> Result<Option<LoadedSession>> {
    let db_path = database_path()?;
    load_staged_session_at_path(&db_path)
}

pub(crate) fn load_staged_session_at_path(db_path: &Path) -> Result<Option<LoadedSession>> {
    if !db_path.exists() {
        return Ok(None);
    }

    let mut connection = connection_for_path(db_path)?;
    initialize_schema(&mut connection)?;

    let payload: Option<String> = connection
        .query_row(
            "SELECT payload FROM staged_session WHERE slot = 0",
            [],
            |row| row.get(0),
        )
        .optional()
        .wrap_err("failed to read staged session")?;

    match payload {
        Some(payload) => {
            let session = serde_json::from_str(&payload)
                .wrap_err("failed to parse staged session payload")?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

/// Drop the staged session, used when the student clears the workspace.
pub fn clear_staged_session() -> Result<()> {
    let db_path = database_path()?;
    clear_staged_session_at_path(&db_path)
}

pub(crate) fn clear_staged_session_at_path(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        return Ok(());
    }
    let mut connection = connection_for_path(db_path)?;
    initialize_schema(&mut connection)?;
    connection
        .execute("DELETE FROM staged_session WHERE slot = 0", [])
        .wrap_err("failed to clear staged session")?;
    Ok(())
}

/// Record one graded quiz for local history.
pub fn record_graded_quiz(
    session_date: &str,
    subject: &str,
    topic: &str,
    question_count: u32,
    correct_count: u32,
    accuracy: f64,
) -> Result<()> {
    let db_path = database_path()?;
    record_graded_quiz_at_path(
        &db_path,
        session_date,
        subject,
        topic,
        question_count,
        correct_count,
        accuracy,
    )
}

pub(crate) fn record_graded_quiz_at_path(
    db_path: &Path,
    session_date: &str,
    subject: &str,
    topic: &str,
    question_count: u32,
    correct_count: u32,
    accuracy: f64,
) -> Result<()> {
    let mut connection = connection_for_path(db_path)?;
    initialize_schema(&mut connection)?;
    connection
        .execute(
            "INSERT INTO graded_quizzes (
                session_date,
                recorded_at,
                subject,
                topic,
                question_count,
                correct_count,
                accuracy
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_date,
                Utc::now().to_rfc3339(),
                subject,
                topic,
                question_count,
                correct_count,
                accuracy,
            ],
        )
        .wrap_err("failed to insert graded quiz into local history")?;
    Ok(())
}

/// Aggregate the local grading history over the trailing `days` days.
pub fn load_local_history(days: usize) -> Result<LocalHistory> {
    let db_path = database_path()?;
    load_local_history_from_path(&db_path, days)
}

pub(crate) fn load_local_history_from_path(db_path: &Path, days: usize) -> Result<LocalHistory> {
    if !db_path.exists() {
        return Ok(LocalHistory::default());
    }

    let mut connection = connection_for_path(db_path)?;
    initialize_schema(&mut connection)?;

    let today = Utc::now().date_naive();
    let start = today - Duration::days(days.saturating_sub(1) as i64);

    let mut daily_map: HashMap<NaiveDate, DailyQuizStats> = HashMap::new();
    let mut total_quizzes: u32 = 0;
    let mut total_questions: u32 = 0;
    let mut total_correct: u32 = 0;

    {
        let mut stmt = connection.prepare(
            "SELECT session_date, COUNT(*), SUM(question_count), SUM(correct_count)
            FROM graded_quizzes WHERE session_date >= ?1 GROUP BY session_date",
        )?;
        let rows = stmt.query_map([start.format("%Y-%m-%d").to_string()], |row| {
            let date_str: String = row.get(0)?;
            let quizzes: i64 = row.get(1)?;
            let questions: i64 = row.get(2)?;
            let correct: i64 = row.get(3)?;
            Ok((date_str, quizzes, questions, correct))
        })?;

        for result in rows {
            let (date_str, quizzes, questions, correct) = result?;
            if let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                let entry = daily_map.entry(date).or_default();
                entry.date = date;
                entry.quizzes = entry.quizzes.saturating_add(quizzes as u32);
                entry.questions = entry.questions.saturating_add(questions as u32);
                entry.correct = entry.correct.saturating_add(correct as u32);
                total_quizzes = total_quizzes.saturating_add(quizzes as u32);
                total_questions = total_questions.saturating_add(questions as u32);
                total_correct = total_correct.saturating_add(correct as u32);
            }
        }
    }

    let mut daily: Vec<DailyQuizStats> = Vec::with_capacity(days);
    for offset in 0..days {
        let date = start + Duration::days(offset as i64);
        let mut summary = daily_map.remove(&date).unwrap_or_default();
        summary.date = date;
        daily.push(summary);
    }

    Ok(LocalHistory {
        daily,
        total_quizzes,
        total_questions,
        total_correct,
    })
}

fn initialize_schema(connection: &mut Connection) -> Result<()> {
    connection
        .execute(
            "CREATE TABLE IF NOT EXISTS staged_session (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                updated_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )
        .wrap_err("failed to create staged_session table")?;

    connection
        .execute(
            "CREATE TABLE IF NOT EXISTS graded_quizzes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_date TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                subject TEXT NOT NULL,
                topic TEXT NOT NULL,
                question_count INTEGER NOT NULL,
                correct_count INTEGER NOT NULL,
                accuracy REAL NOT NULL
            )",
            [],
        )
        .wrap_err("failed to create graded_quizzes table")?;

    connection
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_graded_quizzes_session_date
            ON graded_quizzes(session_date)",
            [],
        )
        .wrap_err("failed to create graded_quizzes indexes")?;

    Ok(())
}

fn database_path() -> Result<PathBuf> {
    let manager = OutputManager::new();
    let mut output_dir = manager.output_directory().map_err(|err| eyre!(err))?;
    fs::create_dir_all(&output_dir).wrap_err_with(|| {
        format!(
            "failed to create output directory at {}",
            output_dir.display()
        )
    })?;
    output_dir.push(DATABASE_FILENAME);
    Ok(output_dir)
}

fn connection_for_path(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).wrap_err_with(|| {
            format!(
                "failed to create directory for session store at {}",
                parent.display()
            )
        })?;
    }

    Connection::open(db_path)
        .wrap_err_with(|| format!("failed to open session store at {}", db_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{ExamQuestion, SavedTests};
    use std::time::SystemTime;

    fn temp_db(label: &str) -> (PathBuf, PathBuf) {
        let mut temp_dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        temp_dir.push(format!("kartkowka-session-store-{label}-{unique}"));
        fs::create_dir_all(&temp_dir).unwrap();
        let db_path = temp_dir.join("test.sqlite");
        (temp_dir, db_path)
    }

    fn sample_session() -> LoadedSession {
        LoadedSession {
            id: "s-42".to_string(),
            subject: "Biologia".to_string(),
            topic: "Fotosynteza".to_string(),
            tests: Some(SavedTests {
                questions: vec![ExamQuestion {
                    question: "Co wytwarza fotosynteza?".to_string(),
                    correct_answer: "A".to_string(),
                    ..ExamQuestion::default()
                }],
            }),
            ..LoadedSession::default()
        }
    }

    #[test]
    fn staged_session_round_trips() {
        let (temp_dir, db_path) = temp_db("roundtrip");

        stage_session_at_path(&db_path, &sample_session()).unwrap();
        let restored = load_staged_session_at_path(&db_path).unwrap().unwrap();

        assert_eq!(restored.id, "s-42");
        assert_eq!(restored.subject, "Biologia");
        assert_eq!(restored.tests.unwrap().questions.len(), 1);

        fs::remove_dir_all(&temp_dir).unwrap();
    }

    #[test]
    fn staging_twice_keeps_only_the_latest_blob() {
        let (temp_dir, db_path) = temp_db("overwrite");

        stage_session_at_path(&db_path, &sample_session()).unwrap();
        let mut second = sample_session();
        second.id = "s-43".to_string();
        stage_session_at_path(&db_path, &second).unwrap();

        let restored = load_staged_session_at_path(&db_path).unwrap().unwrap();
        assert_eq!(restored.id, "s-43");

        let connection = Connection::open(&db_path).unwrap();
        let rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM staged_session", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        fs::remove_dir_all(&temp_dir).unwrap();
    }

    #[test]
    fn missing_database_yields_no_staged_session() {
        let (temp_dir, db_path) = temp_db("missing");
        assert!(load_staged_session_at_path(&db_path).unwrap().is_none());
        // The read path must not create the database as a side effect.
        assert!(!db_path.exists());
        fs::remove_dir_all(&temp_dir).unwrap();
    }

    #[test]
    fn clear_removes_the_staged_blob() {
        let (temp_dir, db_path) = temp_db("clear");

        stage_session_at_path(&db_path, &sample_session()).unwrap();
        clear_staged_session_at_path(&db_path).unwrap();
        assert!(load_staged_session_at_path(&db_path).unwrap().is_none());

        fs::remove_dir_all(&temp_dir).unwrap();
    }

    #[test]
    fn history_aggregates_graded_quizzes_per_day() {
        let (temp_dir, db_path) = temp_db("history");

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        record_graded_quiz_at_path(&db_path, &today, "Biologia", "Fotosynteza", 4, 3, 75.0)
            .unwrap();
        record_graded_quiz_at_path(&db_path, &today, "Chemia", "Kwasy", 2, 1, 50.0).unwrap();

        let history = load_local_history_from_path(&db_path, 7).unwrap();
        assert_eq!(history.daily.len(), 7);
        assert_eq!(history.total_quizzes, 2);
        assert_eq!(history.total_questions, 6);
        assert_eq!(history.total_correct, 4);

        let latest = history.daily.last().unwrap();
        assert_eq!(latest.quizzes, 2);
        assert_eq!(latest.questions, 6);

        fs::remove_dir_all(&temp_dir).unwrap();
    }
}
