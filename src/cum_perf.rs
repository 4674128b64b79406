use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capacity of every recency window kept on the aggregate.
pub const RECENT_WINDOW: usize = 10;

const TREND_WINDOW: usize = 3;

/// Coarse difficulty recommendation derived from accuracy alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedDifficulty {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

impl SuggestedDifficulty {
    /// Polish display label used by the statistics panel.
    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "Podstawowy",
            Self::Intermediate => "Średni",
            Self::Advanced => "Zaawansowany",
        }
    }
}

/// One graded quiz question as consumed by the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub concept_id: String,
    #[serde(default)]
    pub concept_name: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl TestQuestion {
    fn counts_as_correct(&self) -> bool {
        self.is_correct == Some(true)
    }
}

/// Running lifetime statistics for a single curriculum concept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptPerformance {
    pub concept_id: String,
    pub concept_name: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub suggested_difficulty: SuggestedDifficulty,
    pub last_tested: String,
    /// Latest per-question outcomes for this concept, 1 = correct, oldest first.
    #[serde(default)]
    pub recent_scores: Vec<u8>,
    #[serde(default)]
    pub trend: f64,
}

/// Display-history entry kept on the aggregate; no answer-key state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentQuestion {
    pub text: String,
    pub concept_id: String,
    pub question_id: String,
}

/// The cross-quiz aggregate root. Updated once per graded quiz, read for
/// display, and carried inside the session save/load payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePerformance {
    pub total_tests: u32,
    pub total_questions: u32,
    pub total_correct_answers: u32,
    pub overall_accuracy: f64,
    #[serde(default)]
    pub concept_performance: BTreeMap<String, ConceptPerformance>,
    #[serde(default)]
    pub recent_questions: Vec<RecentQuestion>,
    #[serde(default)]
    pub recent_test_scores: Vec<f64>,
    #[serde(default)]
    pub overall_trend: f64,
}

impl CumulativePerformance {
    /// The zero aggregate used to seed a fresh session.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-quiz statistics for one concept, before merging into the aggregate.
#[derive(Debug, Clone, Default)]
pub struct QuizConceptStats {
    pub concept_name: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    /// 0/1 outcome per question in encounter order, not yet windowed.
    pub question_results: Vec<u8>,
}

/// Maps an accuracy percentage to a difficulty tier. Total over all inputs;
/// out-of-range values fall through to the top tier.
pub fn determine_difficulty(accuracy: f64) -> SuggestedDifficulty {
    if accuracy < 50.0 {
        SuggestedDifficulty::Basic
    } else if accuracy < 70.0 {
        SuggestedDifficulty::Intermediate
    } else {
        SuggestedDifficulty::Advanced
    }
}

/// Compares the mean of the last 3 scores against the mean of the 3 before
/// those. Positive means improvement. Fewer than 2 scores yields 0, and an
/// empty comparison window contributes 0 instead of dividing by zero.
fn calculate_trend(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return 0.0;
    }

    let recent_start = scores.len().saturating_sub(TREND_WINDOW);
    let previous_start = scores.len().saturating_sub(TREND_WINDOW * 2);
    let recent = &scores[recent_start..];
    let previous = &scores[previous_start..recent_start];

    window_mean(recent) - window_mean(previous)
}

fn window_mean(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

fn ratio_as_percent(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(correct) / f64::from(total) * 100.0
}

fn normalized_concept_id(question: &TestQuestion) -> String {
    if question.concept_id.is_empty() {
        "unknown".to_string()
    } else {
        question.concept_id.clone()
    }
}

fn normalized_concept_name(question: &TestQuestion) -> String {
    if question.concept_name.is_empty() {
        "Unknown".to_string()
    } else {
        question.concept_name.clone()
    }
}

fn keep_last<T>(mut values: Vec<T>, cap: usize) -> Vec<T> {
    if values.len() > cap {
        values.drain(..values.len() - cap);
    }
    values
}

fn recent_questions_from(questions: &[TestQuestion]) -> Vec<RecentQuestion> {
    questions
        .iter()
        .filter(|q| !q.question.is_empty() && !q.question_id.is_empty())
        .map(|q| RecentQuestion {
            text: q.question.clone(),
            concept_id: normalized_concept_id(q),
            question_id: q.question_id.clone(),
        })
        .collect()
}

/// Groups one quiz's graded questions by concept in a single pass.
pub fn extract_concept_performance(
    questions: &[TestQuestion],
) -> BTreeMap<String, QuizConceptStats> {
    let mut concept_map: BTreeMap<String, QuizConceptStats> = BTreeMap::new();

    for question in questions {
        let entry = concept_map
            .entry(normalized_concept_id(question))
            .or_default();
        // Last observation wins; disagreeing names are not canonicalized.
        entry.concept_name = normalized_concept_name(question);
        entry.total_questions += 1;
        if question.counts_as_correct() {
            entry.correct_answers += 1;
            entry.question_results.push(1);
        } else {
            entry.question_results.push(0);
        }
    }

    for stats in concept_map.values_mut() {
        stats.accuracy = ratio_as_percent(stats.correct_answers, stats.total_questions);
    }

    concept_map
}

fn fresh_concept_entry(
    concept_id: &str,
    stats: &QuizConceptStats,
    now: DateTime<Utc>,
) -> ConceptPerformance {
    ConceptPerformance {
        concept_id: concept_id.to_string(),
        concept_name: stats.concept_name.clone(),
        total_questions: stats.total_questions,
        correct_answers: stats.correct_answers,
        accuracy: stats.accuracy,
        suggested_difficulty: determine_difficulty(stats.accuracy),
        last_tested: now.to_rfc3339(),
        recent_scores: keep_last(stats.question_results.clone(), RECENT_WINDOW),
        trend: 0.0,
    }
}

/// Folds one freshly graded quiz into the running aggregate and returns a new
/// snapshot. The previous snapshot is never mutated.
pub fn update_cumulative_performance(
    previous: Option<&CumulativePerformance>,
    current_test_questions: &[TestQuestion],
) -> CumulativePerformance {
    update_cumulative_performance_at(previous, current_test_questions, Utc::now())
}

pub(crate) fn update_cumulative_performance_at(
    previous: Option<&CumulativePerformance>,
    current_test_questions: &[TestQuestion],
    now: DateTime<Utc>,
) -> CumulativePerformance {
    let current_concept_perf = extract_concept_performance(current_test_questions);

    let current_total = current_test_questions.len() as u32;
    let current_correct = current_test_questions
        .iter()
        .filter(|q| q.counts_as_correct())
        .count() as u32;
    let current_test_accuracy = ratio_as_percent(current_correct, current_total);

    let Some(previous) = previous else {
        // First quiz: everything is seeded from this grading alone.
        let concept_performance = current_concept_perf
            .iter()
            .map(|(cid, stats)| (cid.clone(), fresh_concept_entry(cid, stats, now)))
            .collect();

        return CumulativePerformance {
            total_tests: 1,
            total_questions: current_total,
            total_correct_answers: current_correct,
            overall_accuracy: current_test_accuracy,
            concept_performance,
            recent_questions: keep_last(
                recent_questions_from(current_test_questions),
                RECENT_WINDOW,
            ),
            recent_test_scores: vec![current_test_accuracy],
            overall_trend: 0.0,
        };
    };

    let mut concept_performance = previous.concept_performance.clone();

    for (cid, stats) in &current_concept_perf {
        match concept_performance.get(cid) {
            Some(existing) => {
                let total_questions = existing.total_questions + stats.total_questions;
                let correct_answers = existing.correct_answers + stats.correct_answers;
                let accuracy = ratio_as_percent(correct_answers, total_questions);

                let mut recent_scores = existing.recent_scores.clone();
                recent_scores.extend_from_slice(&stats.question_results);
                let recent_scores = keep_last(recent_scores, RECENT_WINDOW);

                // Per-concept trend tracks short-term swings in per-question
                // correctness, so the 0/1 outcomes are rescaled to 0/100.
                let scores_as_percentages: Vec<f64> = recent_scores
                    .iter()
                    .map(|score| f64::from(*score) * 100.0)
                    .collect();
                let trend = calculate_trend(&scores_as_percentages);

                concept_performance.insert(
                    cid.clone(),
                    ConceptPerformance {
                        concept_id: cid.clone(),
                        concept_name: stats.concept_name.clone(),
                        total_questions,
                        correct_answers,
                        accuracy,
                        suggested_difficulty: determine_difficulty(accuracy),
                        last_tested: now.to_rfc3339(),
                        recent_scores,
                        trend,
                    },
                );
            }
            None => {
                concept_performance.insert(cid.clone(), fresh_concept_entry(cid, stats, now));
            }
        }
    }

    let mut recent_questions = previous.recent_questions.clone();
    recent_questions.extend(recent_questions_from(current_test_questions));
    let recent_questions = keep_last(recent_questions, RECENT_WINDOW);

    let mut recent_test_scores = previous.recent_test_scores.clone();
    recent_test_scores.push(current_test_accuracy);
    let recent_test_scores = keep_last(recent_test_scores, RECENT_WINDOW);

    let overall_trend = calculate_trend(&recent_test_scores);

    let total_questions = previous.total_questions + current_total;
    let total_correct_answers = previous.total_correct_answers + current_correct;

    CumulativePerformance {
        total_tests: previous.total_tests + 1,
        total_questions,
        total_correct_answers,
        overall_accuracy: ratio_as_percent(total_correct_answers, total_questions),
        concept_performance,
        recent_questions,
        recent_test_scores,
        overall_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(concept_id: &str, concept_name: &str, correct: bool, n: usize) -> TestQuestion {
        TestQuestion {
            question_id: format!("q-{concept_id}-{n}"),
            question: format!("Pytanie {n} o {concept_name}"),
            concept_id: concept_id.to_string(),
            concept_name: concept_name.to_string(),
            correct_answer: "A".to_string(),
            user_answer: Some(if correct { "A" } else { "B" }.to_string()),
            is_correct: Some(correct),
            difficulty: None,
        }
    }

    fn quiz(concept_id: &str, concept_name: &str, outcomes: &[bool]) -> Vec<TestQuestion> {
        outcomes
            .iter()
            .enumerate()
            .map(|(n, correct)| question(concept_id, concept_name, *correct, n))
            .collect()
    }

    #[test]
    fn difficulty_tiers_are_pure() {
        assert_eq!(determine_difficulty(0.0), SuggestedDifficulty::Basic);
        assert_eq!(determine_difficulty(49.9), SuggestedDifficulty::Basic);
        assert_eq!(determine_difficulty(50.0), SuggestedDifficulty::Intermediate);
        assert_eq!(determine_difficulty(69.9), SuggestedDifficulty::Intermediate);
        assert_eq!(determine_difficulty(70.0), SuggestedDifficulty::Advanced);
        assert_eq!(determine_difficulty(100.0), SuggestedDifficulty::Advanced);
        // Out-of-range input falls through to the top tier.
        assert_eq!(determine_difficulty(250.0), SuggestedDifficulty::Advanced);
    }

    #[test]
    fn difficulty_labels_are_polish() {
        assert_eq!(SuggestedDifficulty::Basic.label(), "Podstawowy");
        assert_eq!(SuggestedDifficulty::Intermediate.label(), "Średni");
        assert_eq!(SuggestedDifficulty::Advanced.label(), "Zaawansowany");
    }

    #[test]
    fn trend_compares_last_three_with_previous_three() {
        let scores = [0.0, 0.0, 0.0, 100.0, 100.0, 100.0];
        assert_eq!(calculate_trend(&scores), 100.0);

        let regression = [100.0, 100.0, 100.0, 0.0, 0.0, 0.0];
        assert_eq!(calculate_trend(&regression), -100.0);
    }

    #[test]
    fn trend_ignores_scores_older_than_six() {
        // Only indices [-6, -3) and [-3, ..] participate.
        let scores = [5.0, 5.0, 60.0, 60.0, 60.0, 90.0, 90.0, 90.0];
        assert_eq!(calculate_trend(&scores), 30.0);
    }

    #[test]
    fn trend_with_fewer_than_two_scores_is_zero() {
        assert_eq!(calculate_trend(&[]), 0.0);
        assert_eq!(calculate_trend(&[80.0]), 0.0);
    }

    #[test]
    fn trend_with_sparse_history_is_finite() {
        // 2-5 scores leave the previous window short or empty; the empty
        // window contributes 0 instead of producing NaN.
        let two = calculate_trend(&[40.0, 80.0]);
        assert!(two.is_finite());
        assert_eq!(two, 60.0);

        let three = calculate_trend(&[30.0, 60.0, 90.0]);
        assert!(three.is_finite());
        assert_eq!(three, 60.0);

        let four = calculate_trend(&[20.0, 50.0, 50.0, 50.0]);
        assert!(four.is_finite());
        assert_eq!(four, 30.0);

        let five = calculate_trend(&[20.0, 40.0, 60.0, 60.0, 60.0]);
        assert!(five.is_finite());
        assert_eq!(five, 30.0);
    }

    #[test]
    fn extract_groups_by_concept_and_counts_strict_correctness() {
        let mut questions = quiz("c1", "Fotosynteza", &[true, false]);
        questions.push(question("c2", "Oddychanie", true, 0));
        // Missing is_correct counts as incorrect.
        let mut ungraded = question("c2", "Oddychanie", false, 1);
        ungraded.is_correct = None;
        questions.push(ungraded);

        let extracted = extract_concept_performance(&questions);
        assert_eq!(extracted.len(), 2);

        let c1 = &extracted["c1"];
        assert_eq!(c1.concept_name, "Fotosynteza");
        assert_eq!(c1.total_questions, 2);
        assert_eq!(c1.correct_answers, 1);
        assert_eq!(c1.accuracy, 50.0);
        assert_eq!(c1.question_results, vec![1, 0]);

        let c2 = &extracted["c2"];
        assert_eq!(c2.total_questions, 2);
        assert_eq!(c2.correct_answers, 1);
        assert_eq!(c2.question_results, vec![1, 0]);
    }

    #[test]
    fn extract_defaults_missing_concept_identity() {
        let mut anonymous = question("", "", true, 0);
        anonymous.concept_id = String::new();
        anonymous.concept_name = String::new();

        let extracted = extract_concept_performance(&[anonymous]);
        let unknown = &extracted["unknown"];
        assert_eq!(unknown.concept_name, "Unknown");
        assert_eq!(unknown.total_questions, 1);
    }

    #[test]
    fn extract_lets_latest_concept_name_win() {
        let questions = vec![
            question("c1", "Stara nazwa", true, 0),
            question("c1", "Nowa nazwa", true, 1),
        ];
        let extracted = extract_concept_performance(&questions);
        assert_eq!(extracted["c1"].concept_name, "Nowa nazwa");
    }

    #[test]
    fn first_quiz_builds_aggregate_from_scratch() {
        let questions = quiz("c1", "Fotosynteza", &[true, false]);
        let result = update_cumulative_performance(None, &questions);

        assert_eq!(result.total_tests, 1);
        assert_eq!(result.total_questions, 2);
        assert_eq!(result.total_correct_answers, 1);
        assert_eq!(result.overall_accuracy, 50.0);
        assert_eq!(result.recent_test_scores, vec![50.0]);
        assert_eq!(result.overall_trend, 0.0);
        assert_eq!(result.recent_questions.len(), 2);

        let c1 = &result.concept_performance["c1"];
        assert_eq!(c1.accuracy, 50.0);
        assert_eq!(c1.suggested_difficulty, SuggestedDifficulty::Intermediate);
        assert_eq!(c1.trend, 0.0);
        assert_eq!(c1.recent_scores, vec![1, 0]);
        assert!(!c1.last_tested.is_empty());
    }

    #[test]
    fn second_quiz_merges_into_existing_concept() {
        let first = update_cumulative_performance(None, &quiz("c1", "Fotosynteza", &[true, false]));
        let merged =
            update_cumulative_performance(Some(&first), &quiz("c1", "Fotosynteza", &[true, true]));

        assert_eq!(merged.total_tests, 2);
        assert_eq!(merged.total_questions, 4);
        assert_eq!(merged.total_correct_answers, 3);
        assert_eq!(merged.overall_accuracy, 75.0);

        let c1 = &merged.concept_performance["c1"];
        assert_eq!(c1.total_questions, 4);
        assert_eq!(c1.correct_answers, 3);
        assert_eq!(c1.accuracy, 75.0);
        assert_eq!(c1.suggested_difficulty, SuggestedDifficulty::Advanced);
        assert_eq!(c1.recent_scores, vec![1, 0, 1, 1]);
        // Rescaled window [100, 0, 100, 100]: last three average 200/3,
        // the single preceding score averages 100.
        assert!((c1.trend - (200.0 / 3.0 - 100.0)).abs() < 1e-9);
    }

    #[test]
    fn update_never_mutates_previous_snapshot() {
        let first = update_cumulative_performance(None, &quiz("c1", "Fotosynteza", &[true, false]));
        let serialized_before = serde_json::to_string(&first).unwrap();

        let _ = update_cumulative_performance(Some(&first), &quiz("c1", "Fotosynteza", &[true]));

        assert_eq!(serde_json::to_string(&first).unwrap(), serialized_before);
    }

    #[test]
    fn new_concept_appears_without_altering_existing_entries() {
        let first = update_cumulative_performance(None, &quiz("c1", "Fotosynteza", &[true, false]));
        let merged = update_cumulative_performance(Some(&first), &quiz("c2", "Mitoza", &[true]));

        assert_eq!(merged.concept_performance.len(), 2);
        let c1 = &merged.concept_performance["c1"];
        assert_eq!(c1.total_questions, 2);
        assert_eq!(c1.correct_answers, 1);
        assert_eq!(c1.last_tested, first.concept_performance["c1"].last_tested);

        let c2 = &merged.concept_performance["c2"];
        assert_eq!(c2.total_questions, 1);
        assert_eq!(c2.trend, 0.0);
        assert_eq!(c2.suggested_difficulty, SuggestedDifficulty::Advanced);
    }

    #[test]
    fn empty_quiz_increments_tests_but_leaves_counts_alone() {
        let first = update_cumulative_performance(None, &quiz("c1", "Fotosynteza", &[true, true]));
        let merged = update_cumulative_performance(Some(&first), &[]);

        assert_eq!(merged.total_tests, 2);
        assert_eq!(merged.total_questions, first.total_questions);
        assert_eq!(merged.total_correct_answers, first.total_correct_answers);
        assert_eq!(merged.concept_performance.len(), 1);
        assert_eq!(
            merged.concept_performance["c1"].recent_scores,
            first.concept_performance["c1"].recent_scores
        );
        assert_eq!(merged.recent_test_scores, vec![100.0, 0.0]);
    }

    #[test]
    fn windows_stay_bounded_across_many_updates() {
        let mut aggregate: Option<CumulativePerformance> = None;
        for round in 0..25 {
            let outcomes: Vec<bool> = (0..4).map(|n| (round + n) % 3 != 0).collect();
            let questions = quiz("c1", "Fotosynteza", &outcomes);
            aggregate = Some(update_cumulative_performance(aggregate.as_ref(), &questions));
        }

        let aggregate = aggregate.unwrap();
        assert_eq!(aggregate.total_tests, 25);
        assert_eq!(aggregate.total_questions, 100);
        assert!(aggregate.recent_questions.len() <= RECENT_WINDOW);
        assert!(aggregate.recent_test_scores.len() <= RECENT_WINDOW);
        for concept in aggregate.concept_performance.values() {
            assert!(concept.recent_scores.len() <= RECENT_WINDOW);
        }
    }

    #[test]
    fn windows_evict_oldest_first() {
        let first = update_cumulative_performance(
            None,
            &quiz(
                "c1",
                "Fotosynteza",
                &[false, false, false, false, false, false],
            ),
        );
        let merged = update_cumulative_performance(
            Some(&first),
            &quiz("c1", "Fotosynteza", &[true, true, true, true, true, true]),
        );

        // 12 outcomes total; the two oldest zeros fall out of the window.
        assert_eq!(
            merged.concept_performance["c1"].recent_scores,
            vec![0, 0, 0, 0, 1, 1, 1, 1, 1, 1]
        );
    }

    #[test]
    fn oversized_first_quiz_keeps_only_last_ten_recent_questions() {
        let questions = quiz("c1", "Fotosynteza", &[true; 14]);
        let result = update_cumulative_performance(None, &questions);

        assert_eq!(result.recent_questions.len(), RECENT_WINDOW);
        assert_eq!(result.recent_questions[0].question_id, "q-c1-4");
        assert_eq!(result.recent_questions[9].question_id, "q-c1-13");
    }

    #[test]
    fn recent_questions_skip_blank_text_or_id() {
        let mut questions = quiz("c1", "Fotosynteza", &[true, true]);
        questions[0].question = String::new();
        questions[1].question_id = String::new();

        let result = update_cumulative_performance(None, &questions);
        assert!(result.recent_questions.is_empty());
        // The blank questions still count toward the totals.
        assert_eq!(result.total_questions, 2);
    }

    #[test]
    fn sum_invariant_holds_across_update_sequences() {
        let quizzes = vec![
            quiz("c1", "Fotosynteza", &[true, false, true]),
            quiz("c2", "Mitoza", &[false, false]),
            quiz("c1", "Fotosynteza", &[true]),
            Vec::new(),
            quiz("c3", "Fale", &[true, true, false, true]),
        ];

        let mut aggregate = CumulativePerformance::empty();
        for questions in &quizzes {
            aggregate = update_cumulative_performance(Some(&aggregate), questions);

            let concept_questions: u32 = aggregate
                .concept_performance
                .values()
                .map(|c| c.total_questions)
                .sum();
            let concept_correct: u32 = aggregate
                .concept_performance
                .values()
                .map(|c| c.correct_answers)
                .sum();
            assert_eq!(aggregate.total_questions, concept_questions);
            assert_eq!(aggregate.total_correct_answers, concept_correct);
            assert!(aggregate.overall_accuracy >= 0.0 && aggregate.overall_accuracy <= 100.0);
        }
        assert_eq!(aggregate.total_tests, quizzes.len() as u32);
    }

    #[test]
    fn overall_trend_follows_recent_test_scores() {
        let mut aggregate: Option<CumulativePerformance> = None;
        // Three failed quizzes followed by three perfect ones.
        for _ in 0..3 {
            let questions = quiz("c1", "Fotosynteza", &[false, false]);
            aggregate = Some(update_cumulative_performance(aggregate.as_ref(), &questions));
        }
        for _ in 0..3 {
            let questions = quiz("c1", "Fotosynteza", &[true, true]);
            aggregate = Some(update_cumulative_performance(aggregate.as_ref(), &questions));
        }

        let aggregate = aggregate.unwrap();
        assert_eq!(
            aggregate.recent_test_scores,
            vec![0.0, 0.0, 0.0, 100.0, 100.0, 100.0]
        );
        assert_eq!(aggregate.overall_trend, 100.0);
    }

    #[test]
    fn snapshot_round_trips_through_camel_case_json() {
        let aggregate =
            update_cumulative_performance(None, &quiz("c1", "Fotosynteza", &[true, false]));
        let json = serde_json::to_value(&aggregate).unwrap();

        assert!(json.get("totalTests").is_some());
        assert!(json.get("conceptPerformance").is_some());
        assert_eq!(
            json["conceptPerformance"]["c1"]["suggestedDifficulty"],
            serde_json::json!("intermediate")
        );

        let restored: CumulativePerformance = serde_json::from_value(json).unwrap();
        assert_eq!(restored.total_questions, aggregate.total_questions);
        assert_eq!(restored.concept_performance.len(), 1);
    }

    #[test]
    fn snapshot_missing_window_fields_deserializes_with_defaults() {
        // Persisted snapshots from the superseded aggregate format carry no
        // recentScores/trend fields; they must still load.
        let legacy = serde_json::json!({
            "totalTests": 2,
            "totalQuestions": 6,
            "totalCorrectAnswers": 3,
            "overallAccuracy": 50.0,
            "conceptPerformance": {
                "c1": {
                    "conceptId": "c1",
                    "conceptName": "Fotosynteza",
                    "totalQuestions": 6,
                    "correctAnswers": 3,
                    "accuracy": 50.0,
                    "suggestedDifficulty": "intermediate",
                    "lastTested": "2025-01-01T00:00:00+00:00"
                }
            },
            "recentQuestions": []
        });

        let restored: CumulativePerformance = serde_json::from_value(legacy).unwrap();
        assert!(restored.recent_test_scores.is_empty());
        assert_eq!(restored.overall_trend, 0.0);
        assert!(restored.concept_performance["c1"].recent_scores.is_empty());

        let merged =
            update_cumulative_performance(Some(&restored), &quiz("c1", "Fotosynteza", &[true]));
        assert_eq!(merged.total_tests, 3);
        assert_eq!(merged.concept_performance["c1"].recent_scores, vec![1]);
    }
}
