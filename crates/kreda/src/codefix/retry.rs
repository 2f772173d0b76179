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

//! Bounded, monotonic, side-effect-free execution retry loop. Each
//! attempt submits the current code string; on failure the repair
//! table may produce a rewritten string for the next attempt. No
//! other state carries over between attempts.

use super::repair::{self, RepairRule};
use crate::collab::ComputeCollaborator;
use solver_contracts::CollabError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Code was submitted but never ran cleanly within the retry
    /// budget. Non-fatal for the pipeline: downstream stages report
    /// the failure.
    #[error("execution failed after {attempts} attempt(s): {message}")]
    Exhausted { message: String, attempts: u32 },

    /// The collaborator itself could not be reached. Fatal for the
    /// run.
    #[error("compute collaborator unreachable: {0}")]
    Unreachable(#[from] CollabError),

    #[error("execution cancelled")]
    Cancelled,
}

/// Runs `code` against the compute collaborator, applying at most
/// `max_attempts` error-driven repairs. Makes at most
/// `max_attempts + 1` collaborator calls. A repair that leaves the
/// code textually unchanged stops the loop immediately: that failure
/// class is not covered by the table.
pub async fn run_with_retry(
    compute: &dyn ComputeCollaborator,
    code: &str,
    max_attempts: u32,
    rules: &[RepairRule],
    cancel: &CancellationToken,
) -> Result<String, ExecutionError> {
    let mut current = code.to_string();
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        debug!(attempt, "submitting code to compute collaborator");
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            result = compute.execute(&current) => result?,
        };
        if !response.is_error() {
            return Ok(response.stdout);
        }
        let error_text = response.stderr.trim().to_string();
        if attempt >= max_attempts {
            warn!(attempt, "retry budget exhausted");
            return Err(ExecutionError::Exhausted {
                message: error_text,
                attempts: attempt + 1,
            });
        }
        match repair::repair(rules, &error_text, &current) {
            Some((rule, fixed)) if fixed != current => {
                info!(rule, attempt, "applied repair rule, retrying");
                current = fixed;
            }
            Some((rule, _)) => {
                debug!(rule, "repair was a no-op, giving up");
                return Err(ExecutionError::Exhausted {
                    message: error_text,
                    attempts: attempt + 1,
                });
            }
            None => {
                debug!("no repair rule matches error");
                return Err(ExecutionError::Exhausted {
                    message: error_text,
                    attempts: attempt + 1,
                });
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codefix::repair::default_rules;
    use async_trait::async_trait;
    use solver_contracts::{CollabResult, ExecuteResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedCompute {
        responses: Mutex<Vec<ExecuteResponse>>,
        calls: AtomicU32,
    }

    impl ScriptedCompute {
        fn new(responses: Vec<ExecuteResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ComputeCollaborator for ScriptedCompute {
        async fn execute(&self, _code: &str) -> CollabResult<ExecuteResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(ExecuteResponse {
                    stdout: String::new(),
                    stderr: "NameError: name 'R' is not defined".to_string(),
                })
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn ok(stdout: &str) -> ExecuteResponse {
        ExecuteResponse {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn err(stderr: &str) -> ExecuteResponse {
        ExecuteResponse {
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let compute = ScriptedCompute::new(vec![ok("[-2, 2]")]);
        let out = run_with_retry(
            &compute,
            "print(1)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, "[-2, 2]");
        assert_eq!(compute.calls(), 1);
    }

    #[tokio::test]
    async fn repairable_error_recovers_on_second_attempt() {
        let compute = ScriptedCompute::new(vec![
            err("NameError: name 'R' is not defined"),
            ok("4 - R"),
        ]);
        let out = run_with_retry(
            &compute,
            "from sympy import symbols\nprint(R)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, "4 - R");
        assert_eq!(compute.calls(), 2);
    }

    #[tokio::test]
    async fn persistent_repairable_error_hits_attempt_cap() {
        // The scripted default keeps returning the same NameError, and
        // the repair keeps inserting a declaration, so the code changes
        // every round and only the cap can stop the loop.
        let compute = ScriptedCompute::new(vec![]);
        let result = run_with_retry(
            &compute,
            "from sympy import symbols\nprint(R)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(ExecutionError::Exhausted { attempts: 4, .. })
        ));
        assert_eq!(compute.calls(), DEFAULT_MAX_ATTEMPTS + 1);
    }

    #[tokio::test]
    async fn uncovered_error_stops_after_single_call() {
        let compute = ScriptedCompute::new(vec![err("ZeroDivisionError: division by zero")]);
        let result = run_with_retry(
            &compute,
            "print(1/0)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(ExecutionError::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(compute.calls(), 1);
    }

    #[tokio::test]
    async fn noop_repair_stops_immediately() {
        // Subscript rule matches the error but the code contains no
        // indexing to rewrite, so the transform is a textual no-op.
        let compute = ScriptedCompute::new(vec![
            err("TypeError: 'FiniteSet' object is not subscriptable"),
            err("TypeError: 'FiniteSet' object is not subscriptable"),
        ]);
        let result = run_with_retry(
            &compute,
            "print(rozw)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            result,
            Err(ExecutionError::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(compute.calls(), 1);
    }

    #[tokio::test]
    async fn empty_rule_table_is_single_attempt() {
        let compute = ScriptedCompute::new(vec![err("sorry, goals remain")]);
        let result = run_with_retry(
            &compute,
            "theorem t : 1 = 1 := rfl",
            DEFAULT_MAX_ATTEMPTS,
            &[],
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(ExecutionError::Exhausted { .. })));
        assert_eq!(compute.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let compute = ScriptedCompute::new(vec![ok("unused")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_with_retry(
            &compute,
            "print(1)",
            DEFAULT_MAX_ATTEMPTS,
            default_rules(),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(ExecutionError::Cancelled)));
    }
}
