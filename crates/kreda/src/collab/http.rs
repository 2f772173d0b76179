// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Kreda Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use super::{ModelCollaborator, ComputeCollaborator, ProofCollaborator, RetrievalCollaborator};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use solver_contracts::{
    CollabError, CollabResult, CompletionRequest, ExecuteRequest, ExecuteResponse, ModelEndpoint,
    RetrievalRequest, RetrievalResponse, RetrievalSnippet, Role, ServiceEndpoint, VerifyRequest,
    VerifyResponse,
};
use std::time::Duration;
use tracing::debug;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| Client::builder().build().expect("HTTP client"));

async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
    endpoint: &str,
    timeout: Duration,
    body: &B,
    bearer: Option<&str>,
) -> CollabResult<R> {
    let mut request = HTTP_CLIENT.post(endpoint).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| CollabError::Timeout)?
        .map_err(|e| CollabError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CollabError::Http {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<R>()
        .await
        .map_err(|e| CollabError::Serialisation(e.to_string()))
}

/// OpenAI-compatible chat-completions client for the model server.
pub struct HttpModelClient {
    config: ModelEndpoint,
}

impl HttpModelClient {
    pub fn new(config: ModelEndpoint) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelCollaborator for HttpModelClient {
    async fn complete(&self, request: CompletionRequest) -> CollabResult<String> {
        let mut messages = vec![json!({"role": "system", "content": request.system_prompt})];
        for turn in &request.turns {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": turn.content}));
        }
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        debug!(endpoint = %self.config.endpoint, turns = request.turns.len(), "model request");
        let data: Value = post_json(
            &self.config.endpoint,
            self.config.timeout(),
            &payload,
            self.config.api_key.as_deref(),
        )
        .await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                CollabError::Serialisation("model response missing choices[0].message.content".to_string())
            })
    }
}

/// Client for the symbolic-computation subprocess proxy.
pub struct HttpComputeClient {
    config: ServiceEndpoint,
}

impl HttpComputeClient {
    pub fn new(config: ServiceEndpoint) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ComputeCollaborator for HttpComputeClient {
    async fn execute(&self, code: &str) -> CollabResult<ExecuteResponse> {
        let request = ExecuteRequest {
            code: code.to_string(),
        };
        post_json(&self.config.endpoint, self.config.timeout(), &request, None).await
    }
}

/// Client for the proof-verifier subprocess proxy.
pub struct HttpProofClient {
    config: ServiceEndpoint,
}

impl HttpProofClient {
    pub fn new(config: ServiceEndpoint) -> Self {
        Self { config }
    }

    /// Startup reachability probe; the pipeline itself never depends
    /// on the verifier being up.
    pub async fn is_reachable(&self) -> bool {
        let health_url = self
            .config
            .endpoint
            .trim_end_matches("/verify")
            .to_string()
            + "/health";
        match tokio::time::timeout(Duration::from_secs(2), HTTP_CLIENT.get(&health_url).send())
            .await
        {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}

#[async_trait]
impl ProofCollaborator for HttpProofClient {
    async fn verify(&self, request: VerifyRequest) -> CollabResult<VerifyResponse> {
        post_json(&self.config.endpoint, self.config.timeout(), &request, None).await
    }
}

/// Client for the knowledge-retrieval service (`POST /query`).
pub struct HttpRetrievalClient {
    config: ServiceEndpoint,
}

impl HttpRetrievalClient {
    pub fn new(config: ServiceEndpoint) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RetrievalCollaborator for HttpRetrievalClient {
    async fn query(&self, text: &str, top_k: usize) -> CollabResult<Vec<RetrievalSnippet>> {
        let request = RetrievalRequest {
            query: text.to_string(),
            top_k,
        };
        let response: RetrievalResponse =
            post_json(&self.config.endpoint, self.config.timeout(), &request, None).await?;
        Ok(response.results)
    }
}
