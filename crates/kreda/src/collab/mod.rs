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

//! Boundaries to the external collaborators: language model, compute
//! engine, proof verifier and knowledge retrieval. The pipeline only
//! ever talks to these traits; the HTTP clients in [`http`] are the
//! production implementations.

pub mod http;

use async_trait::async_trait;
use solver_contracts::{
    CollabResult, CompletionRequest, ExecuteResponse, RetrievalSnippet, VerifyRequest,
    VerifyResponse,
};

#[async_trait]
pub trait ModelCollaborator: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> CollabResult<String>;
}

#[async_trait]
pub trait ComputeCollaborator: Send + Sync {
    async fn execute(&self, code: &str) -> CollabResult<ExecuteResponse>;
}

#[async_trait]
pub trait ProofCollaborator: Send + Sync {
    async fn verify(&self, request: VerifyRequest) -> CollabResult<VerifyResponse>;
}

#[async_trait]
pub trait RetrievalCollaborator: Send + Sync {
    async fn query(&self, text: &str, top_k: usize) -> CollabResult<Vec<RetrievalSnippet>>;
}

pub use http::{HttpComputeClient, HttpModelClient, HttpProofClient, HttpRetrievalClient};
