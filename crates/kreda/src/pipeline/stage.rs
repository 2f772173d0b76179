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

//! One role-scoped model turn. No retries here: retry policy belongs
//! to the execution engine, and model errors propagate unmodified.

use super::config::StageConfig;
use super::error::PipelineError;
use crate::collab::ModelCollaborator;
use once_cell::sync::Lazy;
use regex::Regex;
use solver_contracts::{ChatTurn, CompletionRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Removes paired and unpaired reasoning delimiters some models emit.
/// The inner monologue of a paired block must never reach the user.
static REASONING_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>|</?think>").expect("reasoning regex"));

pub fn strip_reasoning(text: &str) -> String {
    REASONING_TAGS.replace_all(text, "").trim().to_string()
}

pub(crate) async fn run_stage(
    model: &dyn ModelCollaborator,
    stage: &StageConfig,
    turns: Vec<ChatTurn>,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    debug!(label = %stage.label, turns = turns.len(), "running stage");
    let request = CompletionRequest {
        system_prompt: stage.system_prompt.clone(),
        turns,
        max_tokens: stage.max_tokens,
        temperature: stage.temperature,
    };
    let raw = tokio::select! {
        () = cancel.cancelled() => return Err(PipelineError::Cancelled),
        result = model.complete(request) => result.map_err(|source| PipelineError::Stage {
            stage: stage.label.clone(),
            source,
        })?,
    };
    Ok(strip_reasoning(&raw))
}
