use std::collections::BTreeMap;
use std::env;

use crate::{cum_perf::CumulativePerformance, log_util};
use color_eyre::eyre::{Context, Result, eyre};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

const DEFAULT_API_BASE: &str =
    "https://kartkowkafunc-etaeawfubqcefcah.westeurope-01.azurewebsites.net/api";
const FUNCTION_KEY_HEADER: &str = "x-functions-key";
pub(crate) const FUNCTION_KEY_ENV: &str = "KARTKOWKA_FUNCTION_KEY";

/// Learning materials returned by the generation endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMaterials {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub flashcards: String,
    #[serde(default)]
    pub mind_map_description: String,
    #[serde(default)]
    pub quiz_session_id: String,
    #[serde(default)]
    pub materials_used_in_session: Vec<MaterialUsedInSession>,
    #[serde(default)]
    pub consistency_warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialUsedInSession {
    #[serde(default)]
    pub material_id: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub concept_id: Option<String>,
    #[serde(default)]
    pub concept_name: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// Fixed four-option answer set keyed by the letters the grader expects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamOptions {
    #[serde(default, rename = "A")]
    pub a: String,
    #[serde(default, rename = "B")]
    pub b: String,
    #[serde(default, rename = "C")]
    pub c: String,
    #[serde(default, rename = "D")]
    pub d: String,
}

impl ExamOptions {
    pub const LETTERS: [&'static str; 4] = ["A", "B", "C", "D"];

    pub fn text_for(&self, letter: &str) -> &str {
        match letter {
            "A" => &self.a,
            "B" => &self.b,
            "C" => &self.c,
            "D" => &self.d,
            _ => "",
        }
    }
}

/// One generated multiple-choice question, optionally tagged with curriculum
/// concept metadata and, after grading, with the user's verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: ExamOptions,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub concept_id: String,
    #[serde(default)]
    pub concept_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTests {
    #[serde(default)]
    pub kartkowka_id: String,
    #[serde(default)]
    pub quiz_session_id: String,
    #[serde(default)]
    pub questions: Vec<ExamQuestion>,
    #[serde(default)]
    pub student_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub subject: String,
    pub topic: String,
    pub username: String,
    pub curriculum_topic_ids: Vec<String>,
    pub concept_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kartkowka_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswersRequest {
    pub username: String,
    pub kartkowka_id: String,
    pub questions: Vec<ExamQuestion>,
    /// Selected option letter per question index; JSON object keys are the
    /// stringified indexes, matching what the grader expects.
    pub answers: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionVerdict {
    #[serde(default)]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswersResponse {
    #[serde(default)]
    pub results: Vec<QuestionVerdict>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMaterials {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub flashcards: String,
    #[serde(default)]
    pub mind_map_description: String,
    #[serde(default)]
    pub materials_used_in_session: Vec<MaterialUsedInSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTests {
    #[serde(default)]
    pub questions: Vec<ExamQuestion>,
}

/// Body of the session-save request. The cumulative aggregate travels as one
/// field of this larger payload.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSessionRequest {
    pub username: String,
    pub subject: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_session_id: Option<String>,
    pub curriculum_topic_ids: Vec<String>,
    pub topic_names: Vec<String>,
    pub concept_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<SavedMaterials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<SavedTests>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_performance: Option<CumulativePerformance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSessionResponse {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_modified_at: String,
    #[serde(default)]
    pub performance: Option<SessionPerformanceSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPerformanceSummary {
    #[serde(default)]
    pub overall_score: Option<f64>,
}

/// Full saved session as returned by `getSessionById`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedSession {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub custom_session_name: Option<String>,
    #[serde(default)]
    pub materials: Option<SavedMaterials>,
    #[serde(default)]
    pub tests: Option<SavedTests>,
    #[serde(default)]
    pub cumulative_performance: Option<CumulativePerformance>,
}

/// Thin client for the Kartkówka backend functions. Every request carries the
/// shared function key; calls are awaited on a background runtime.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    api_base: String,
    function_key: String,
}

impl BackendClient {
    pub fn new(api_base: impl Into<String>, function_key: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        if api_base.is_empty() {
            api_base = DEFAULT_API_BASE.to_string();
        }
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self {
            client: Client::new(),
            api_base,
            function_key: function_key.into(),
        }
    }

    /// Construct a client whose key comes from the `KARTKOWKA_FUNCTION_KEY`
    /// environment variable, falling back to the configured key.
    pub fn from_env(api_base: impl Into<String>, fallback_key: &str) -> Self {
        let function_key =
            env::var(FUNCTION_KEY_ENV).unwrap_or_else(|_| fallback_key.to_string());
        Self::new(api_base, function_key)
    }

    pub fn has_function_key(&self) -> bool {
        !self.function_key.is_empty()
    }

    pub async fn generate_learning_materials(
        &self,
        request: &GenerateRequest,
    ) -> Result<GeneratedMaterials> {
        self.post_json("generateLearningMaterials", request).await
    }

    pub async fn generate_tests(&self, request: &GenerateRequest) -> Result<GeneratedTests> {
        self.post_json("generateTests", request).await
    }

    pub async fn check_test_answers(
        &self,
        request: &CheckAnswersRequest,
    ) -> Result<CheckAnswersResponse> {
        self.post_json("checkTestAnswers", request).await
    }

    pub async fn save_learning_session(
        &self,
        payload: &SaveSessionRequest,
    ) -> Result<SaveSessionResponse> {
        self.post_json("saveLearningSession", payload).await
    }

    pub async fn list_sessions(&self, username: &str) -> Result<Vec<SessionSummary>> {
        self.get_json("getUserSessions", &[("username", username)])
            .await
    }

    pub async fn get_session_by_id(&self, session_id: &str) -> Result<LoadedSession> {
        self.get_json("getSessionById", &[("sessionId", session_id)])
            .await
    }

    async fn post_json<B, T>(&self, operation: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let endpoint = format!("{}/{}", self.api_base, operation);
        log_util::log_debug(&format!("BackendClient: POST {}", endpoint));

        let response = self
            .client
            .post(&endpoint)
            .header(FUNCTION_KEY_HEADER, &self.function_key)
            .json(body)
            .send()
            .await
            .wrap_err_with(|| format!("failed to invoke {}", operation))?;

        Self::decode(operation, response).await
    }

    async fn get_json<T>(&self, operation: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let endpoint = format!("{}/{}", self.api_base, operation);
        log_util::log_debug(&format!("BackendClient: GET {}", endpoint));

        let response = self
            .client
            .get(&endpoint)
            .header(FUNCTION_KEY_HEADER, &self.function_key)
            .query(query)
            .send()
            .await
            .wrap_err_with(|| format!("failed to invoke {}", operation))?;

        Self::decode(operation, response).await
    }

    async fn decode<T>(operation: &str, response: reqwest::Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        log_util::log_debug(&format!("BackendClient: {} status {}", operation, status));

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<failed to read body: {}>", err));
            log_util::log_debug(&format!(
                "BackendClient: {} error body: {}",
                operation, body
            ));
            return Err(eyre!(format!(
                "{} returned {} with body: {}",
                operation, status, body
            )));
        }

        response
            .json()
            .await
            .wrap_err_with(|| format!("failed to parse {} response body", operation))
    }
}
