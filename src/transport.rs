use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::engine::Snapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize, Deserialize)]
pub(crate) struct PredictRequest {
    pub(crate) state: Snapshot,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct PredictResponse {
    pub(crate) action: usize,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct TrainRequest {
    pub(crate) state: Snapshot,
    pub(crate) action: usize,
    pub(crate) reward: f64,
    pub(crate) next_state: Snapshot,
    pub(crate) episode_end: bool,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl StatusResponse {
    pub(crate) fn success() -> Self {
        StatusResponse {
            status: "success".to_string(),
            message: None,
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        StatusResponse {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

/// Blocking client for the inference service. Every call is bounded by
/// `REQUEST_TIMEOUT`; callers decide what failure degrades to.
pub(crate) struct InferenceApiClient {
    client: Client,
    base_url: String,
}

impl InferenceApiClient {
    pub(crate) fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(InferenceApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn predict(&self, state: &Snapshot) -> Result<usize> {
        let resp: PredictResponse = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest {
                state: state.clone(),
            })
            .send()?
            .error_for_status()?
            .json()?;
        Ok(resp.action)
    }

    pub(crate) fn train(&self, request: &TrainRequest) -> Result<()> {
        self.client
            .post(format!("{}/train", self.base_url))
            .json(request)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    pub(crate) fn save_model(&self) -> Result<()> {
        self.client
            .post(format!("{}/save_model", self.base_url))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    pub(crate) fn load_model(&self) -> Result<()> {
        self.client
            .post(format!("{}/load_model", self.base_url))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
