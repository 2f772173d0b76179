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

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_secs(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

/// Endpoint of the model collaborator. Model latency dominates the
/// pipeline, so its timeout is measured in minutes rather than seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ModelEndpoint {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self {
            endpoint: env_or(
                "KREDA_MODEL_ENDPOINT",
                "http://127.0.0.1:3001/v1/chat/completions",
            ),
            model: env_or("KREDA_MODEL_NAME", "bielik-11b-v2.3-instruct"),
            api_key: std::env::var("KREDA_MODEL_API_KEY").ok(),
            timeout_secs: env_secs("KREDA_MODEL_TIMEOUT_SECS", 300),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Endpoint of a subprocess-backed collaborator (compute engine, proof
/// verifier, retrieval index). These answer in seconds or not at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl ServiceEndpoint {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub model: ModelEndpoint,
    pub compute: ServiceEndpoint,
    pub proof: ServiceEndpoint,
    pub retrieval: ServiceEndpoint,
}

impl EndpointConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self {
            model: ModelEndpoint::from_env(),
            compute: ServiceEndpoint::new(
                env_or("KREDA_COMPUTE_ENDPOINT", "http://127.0.0.1:3002/execute"),
                env_secs("KREDA_COMPUTE_TIMEOUT_SECS", 20),
            ),
            proof: ServiceEndpoint::new(
                env_or("KREDA_PROOF_ENDPOINT", "http://127.0.0.1:3004/verify"),
                env_secs("KREDA_PROOF_TIMEOUT_SECS", 60),
            ),
            retrieval: ServiceEndpoint::new(
                env_or("KREDA_RETRIEVAL_ENDPOINT", "http://127.0.0.1:3003/query"),
                env_secs("KREDA_RETRIEVAL_TIMEOUT_SECS", 10),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_endpoint_timeout_is_seconds() {
        let ep = ServiceEndpoint::new("http://localhost:3002/execute", 20);
        assert_eq!(ep.timeout(), Duration::from_secs(20));
    }
}
