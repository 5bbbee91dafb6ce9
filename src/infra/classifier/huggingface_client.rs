use crate::core::classifier::{ClassifierError, LabelScore, ToxicityClassifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_MODEL: &str = "unitary/toxic-bert";

const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// Toxicity classifier backed by a Hugging Face text-classification
/// endpoint (the hosted Inference API or a self-hosted server speaking the
/// same protocol).
pub struct HuggingFaceClassifier {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HuggingFaceClassifier {
    pub fn new(endpoint: String, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_token,
        }
    }

    /// Classifier for a model on the hosted Inference API.
    pub fn for_model(model: &str, api_token: Option<String>) -> Self {
        Self::new(format!("{}/{}", INFERENCE_BASE_URL, model), api_token)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ToxicityClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "inputs": text }));

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Request(format!(
                "Inference API error: {} - {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        parse_scores(body)
    }
}

/// The API nests results per input (`[[{..}]]`) but some servers return a
/// flat list for a single input. Accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoresBody {
    Batched(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

fn parse_scores(body: serde_json::Value) -> Result<Vec<LabelScore>, ClassifierError> {
    match serde_json::from_value::<ScoresBody>(body) {
        Ok(ScoresBody::Batched(batches)) => Ok(batches.into_iter().next().unwrap_or_default()),
        Ok(ScoresBody::Flat(scores)) => Ok(scores),
        Err(e) => Err(ClassifierError::InvalidResponse(e.to_string())),
    }
}
