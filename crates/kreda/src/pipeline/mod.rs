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

//! The solve pipeline controller: sequences the role-scoped stages,
//! owns the conversation, invokes code extraction, sanitisation and
//! the bounded retry engine, and emits pipeline events for
//! progressive rendering.

pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod router;
pub mod stage;

pub use config::{PipelineConfig, StageConfig};
pub use conversation::{Conversation, Message, ToolCall, ToolResult};
pub use error::PipelineError;
pub use events::{EventSink, PipelineEvent};
pub use router::{decide, Backend, PipelineDecision};

use crate::codefix::repair::default_rules;
use crate::codefix::retry::{run_with_retry, ExecutionError};
use crate::codefix::{extract_code, extract_code_with_preference, normalise_markup, sanitize, truncate_after_first_block};
use crate::collab::{
    ComputeCollaborator, ModelCollaborator, ProofCollaborator, RetrievalCollaborator,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use solver_contracts::{
    ChatTurn, CollabResult, ExecuteResponse, RetrievalSnippet, VerifyRequest,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const LEAN_TAGS: &[&str] = &["lean", "lean4"];
const NO_CODE_ERROR: &str = "no code produced";
const EXEC_OK_NOTE: &str =
    "Wykonanie kodu zakończyło się powodzeniem. Przedstaw uczniowi pełne rozwiązanie z odpowiedzią.";
const EXEC_FAILED_NOTE: &str = "Uwaga: wykonanie kodu zakończyło się błędem. Napisz wprost, że \
obliczenia się nie powiodły, i nie podawaj wymyślonego wyniku.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Plan,
    Generate,
    Execute,
    Summarize,
    VerifyOptional,
    Done,
    Failed,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Intake
    }
}

/// Explicit pipeline state, passed by reference into the controller.
/// Survives a failed run so the caller keeps the partial conversation.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub conversation: Conversation,
    pub phase: Phase,
    pub decision: Option<PipelineDecision>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct SolvePipeline {
    model: Arc<dyn ModelCollaborator>,
    compute: Arc<dyn ComputeCollaborator>,
    proof: Option<Arc<dyn ProofCollaborator>>,
    retrieval: Option<Arc<dyn RetrievalCollaborator>>,
    config: PipelineConfig,
    events: EventSink,
    cancel: CancellationToken,
}

impl SolvePipeline {
    pub fn new(model: Arc<dyn ModelCollaborator>, compute: Arc<dyn ComputeCollaborator>) -> Self {
        Self {
            model,
            compute,
            proof: None,
            retrieval: None,
            config: PipelineConfig::default(),
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_proof(mut self, proof: Arc<dyn ProofCollaborator>) -> Self {
        self.proof = Some(proof);
        self
    }

    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalCollaborator>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the whole pipeline for one problem and returns the
    /// finished conversation.
    pub async fn solve(&self, problem: &str) -> Result<Conversation, PipelineError> {
        let mut state = PipelineState::new();
        self.solve_into(problem, &mut state).await?;
        Ok(state.conversation)
    }

    /// State-passing variant: on failure the partial conversation
    /// stays in `state` with `phase == Failed`.
    #[instrument(skip(self, problem, state), fields(problem_len = problem.len()))]
    pub async fn solve_into(
        &self,
        problem: &str,
        state: &mut PipelineState,
    ) -> Result<(), PipelineError> {
        match self.run(problem, state).await {
            Ok(()) => {
                state.phase = Phase::Done;
                info!(messages = state.conversation.len(), "pipeline done");
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::Failed;
                error!("pipeline failed: {e}");
                Err(e)
            }
        }
    }

    async fn run(&self, problem: &str, state: &mut PipelineState) -> Result<(), PipelineError> {
        state.phase = Phase::Intake;
        self.append(state, Message::user(problem));

        // Plan
        self.enter(state, Phase::Plan)?;
        let snippets = self.fetch_snippets(problem).await;
        let plan_config = self.enrich_plan_config(&snippets);
        let plan_text = self
            .stage_text(Phase::Plan, &plan_config, state.conversation.turns())
            .await?;
        self.append(
            state,
            Message::assistant(&self.config.plan.label, normalise_markup(&plan_text)),
        );

        // Generate
        self.enter(state, Phase::Generate)?;
        let solve_text = self
            .stage_text(Phase::Generate, &self.config.solve, state.conversation.turns())
            .await?;
        // Extraction must see the whole reply: a tagged block anywhere
        // beats an earlier untagged one. Truncation only shortens what
        // lands in the conversation.
        let code = extract_code(&solve_text);
        let solve_text = truncate_after_first_block(&solve_text);

        // Execute
        self.enter(state, Phase::Execute)?;
        let (call, prepared) = match code {
            Some(raw) => {
                let cleaned = sanitize(&raw);
                (
                    ToolCall::new("execute", json!({ "code": cleaned })),
                    Some(cleaned),
                )
            }
            None => {
                warn!("generation produced no extractable code block");
                (ToolCall::new("execute", json!({ "code": Value::Null })), None)
            }
        };
        let call_id = call.id.clone();
        self.append(
            state,
            Message::assistant(&self.config.solve.label, solve_text).with_tool_calls(vec![call]),
        );

        let (exec_output, exec_failed) = match prepared {
            None => (NO_CODE_ERROR.to_string(), true),
            Some(cleaned) => {
                match run_with_retry(
                    self.compute.as_ref(),
                    &cleaned,
                    self.config.max_attempts,
                    default_rules(),
                    &self.cancel,
                )
                .await
                {
                    Ok(stdout) => (stdout.trim().to_string(), false),
                    Err(ExecutionError::Cancelled) => return Err(PipelineError::Cancelled),
                    Err(ExecutionError::Unreachable(e)) => {
                        self.events.emit(PipelineEvent::StageFailed {
                            stage: Phase::Execute,
                            error: e.to_string(),
                        });
                        return Err(PipelineError::Compute(e));
                    }
                    Err(e) => {
                        warn!("execution failed within retry budget: {e}");
                        (e.to_string(), true)
                    }
                }
            }
        };
        let execute_content = if exec_failed {
            format!("⚠️ Obliczenia nie powiodły się: {exec_output}")
        } else {
            exec_output.clone()
        };
        self.append(
            state,
            Message::assistant(&self.config.solve.label, execute_content).with_tool_results(vec![
                ToolResult {
                    tool_call_id: call_id,
                    tool_name: "execute".to_string(),
                    output: exec_output,
                    is_error: exec_failed,
                },
            ]),
        );

        // Summarize
        self.enter(state, Phase::Summarize)?;
        let mut summary_turns = state.conversation.turns();
        summary_turns.push(ChatTurn::user(if exec_failed {
            EXEC_FAILED_NOTE
        } else {
            EXEC_OK_NOTE
        }));
        let summary_text = self
            .stage_text(Phase::Summarize, &self.config.summary, summary_turns)
            .await?;
        self.append(
            state,
            Message::assistant(&self.config.summary.label, normalise_markup(&summary_text)),
        );

        // Optional verification
        let decision = router::decide(problem, self.proof.is_some());
        state.decision = Some(decision);
        debug!(?decision, "backend decision");
        if decision.needs_verification && !exec_failed {
            if let Some(proof) = self.proof.clone() {
                self.verify(problem, proof.as_ref(), state).await?;
            }
        }
        Ok(())
    }

    async fn verify(
        &self,
        problem: &str,
        proof: &dyn ProofCollaborator,
        state: &mut PipelineState,
    ) -> Result<(), PipelineError> {
        self.enter(state, Phase::VerifyOptional)?;
        let formal_text = self
            .stage_text(
                Phase::VerifyOptional,
                &self.config.formalize,
                state.conversation.turns(),
            )
            .await?;
        let candidate = extract_code_with_preference(&formal_text, LEAN_TAGS)
            .unwrap_or_else(|| formal_text.trim().to_string());
        let call = ToolCall::new(
            "verify",
            json!({ "problem": problem, "candidateProof": candidate }),
        );
        let call_id = call.id.clone();
        self.append(
            state,
            Message::assistant(&self.config.formalize.label, formal_text)
                .with_tool_calls(vec![call]),
        );

        let runner = ProofRunner { proof, problem };
        // Same engine as Execute, with an empty repair table: a proof
        // failure is terminal on the first attempt.
        let (output, is_error) = match run_with_retry(&runner, &candidate, 0, &[], &self.cancel)
            .await
        {
            Ok(diagnostics) => (
                format!("✅ Dowód zweryfikowany. {diagnostics}").trim().to_string(),
                false,
            ),
            Err(ExecutionError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(ExecutionError::Unreachable(e)) => {
                // Verification is never fatal for the run.
                warn!("proof collaborator unavailable: {e}");
                (format!("Weryfikator niedostępny: {e}"), true)
            }
            Err(e) => (format!("❌ Weryfikacja nie powiodła się: {e}"), true),
        };
        self.append(
            state,
            Message::assistant(&self.config.formalize.label, output.clone()).with_tool_results(
                vec![ToolResult {
                    tool_call_id: call_id,
                    tool_name: "verify".to_string(),
                    output,
                    is_error,
                }],
            ),
        );
        Ok(())
    }

    fn enter(&self, state: &mut PipelineState, phase: Phase) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        state.phase = phase;
        self.events.emit(PipelineEvent::StageStarted { stage: phase });
        Ok(())
    }

    fn append(&self, state: &mut PipelineState, message: Message) {
        let appended = state.conversation.push(message).clone();
        self.events
            .emit(PipelineEvent::MessageAppended { message: appended });
    }

    async fn stage_text(
        &self,
        phase: Phase,
        stage_config: &StageConfig,
        turns: Vec<ChatTurn>,
    ) -> Result<String, PipelineError> {
        match stage::run_stage(self.model.as_ref(), stage_config, turns, &self.cancel).await {
            Ok(text) => Ok(text),
            Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                error!(stage = %stage_config.label, "stage failed: {e}");
                self.events.emit(PipelineEvent::StageFailed {
                    stage: phase,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Retrieval degrades gracefully: any failure yields an empty
    /// snippet list and the plan stage runs without enrichment.
    async fn fetch_snippets(&self, problem: &str) -> Vec<RetrievalSnippet> {
        let Some(retrieval) = &self.retrieval else {
            return Vec::new();
        };
        let query = retrieval.query(problem, self.config.retrieval_top_k);
        tokio::select! {
            () = self.cancel.cancelled() => Vec::new(),
            result = query => match result {
                Ok(snippets) => {
                    debug!(count = snippets.len(), "retrieval snippets");
                    snippets
                }
                Err(e) => {
                    warn!("retrieval degraded to empty context: {e}");
                    Vec::new()
                }
            },
        }
    }

    fn enrich_plan_config(&self, snippets: &[RetrievalSnippet]) -> StageConfig {
        let mut stage_config = self.config.plan.clone();
        if snippets.is_empty() {
            return stage_config;
        }
        stage_config
            .system_prompt
            .push_str("\n\nMateriały z bazy wiedzy:");
        for snippet in snippets {
            stage_config
                .system_prompt
                .push_str(&format!("\n- {} [{}]: {}", snippet.title, snippet.category, snippet.content));
            if !snippet.sympy_hint.is_empty() {
                stage_config
                    .system_prompt
                    .push_str(&format!(" (SymPy: {})", snippet.sympy_hint));
            }
        }
        stage_config
    }
}

/// Adapts the proof collaborator to the retry engine's executor
/// shape: diagnostics land in stdout on success and in stderr when
/// the proof is rejected.
struct ProofRunner<'a> {
    proof: &'a dyn ProofCollaborator,
    problem: &'a str,
}

#[async_trait]
impl ComputeCollaborator for ProofRunner<'_> {
    async fn execute(&self, code: &str) -> CollabResult<ExecuteResponse> {
        let response = self
            .proof
            .verify(VerifyRequest {
                problem: self.problem.to_string(),
                candidate_proof: code.to_string(),
            })
            .await?;
        Ok(ExecuteResponse {
            stdout: response.diagnostics.clone(),
            stderr: if response.verified {
                String::new()
            } else if response.diagnostics.trim().is_empty() {
                "proof not verified".to_string()
            } else {
                response.diagnostics
            },
        })
    }
}
