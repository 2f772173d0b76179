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

//! Decides whether a formal-verification stage should run for a
//! problem. The heuristic is lexical on purpose: it mirrors the
//! phrasing of matura proof tasks and stays cheap and predictable.

use serde::{Deserialize, Serialize};

/// Proof-request vocabulary, Polish first.
const PROOF_KEYWORDS: &[&str] = &[
    "udowodnij",
    "udowodnić",
    "wykaż",
    "wykazać",
    "uzasadnij",
    "dla każdego",
    "dla kazdego",
    "dla wszystkich",
    "istnieje",
    "prove",
    "show that",
    "for all",
    "for every",
    "there exists",
];

/// Vocabulary asking for a concrete value or solution set.
const COMPUTE_KEYWORDS: &[&str] = &[
    "oblicz",
    "rozwiąż",
    "rozwiaz",
    "wyznacz",
    "compute",
    "solve",
    "calculate",
    "evaluate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    SymbolicOnly,
    ProofOnly,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDecision {
    pub needs_verification: bool,
    pub backend: Backend,
}

/// Pure, never blocks, never fails. A keyword match with the verifier
/// down still routes to symbolic-only: the lexical hint never creates
/// a hard dependency on the proof collaborator.
pub fn decide(problem_text: &str, verifier_available: bool) -> PipelineDecision {
    let lower = problem_text.to_lowercase();
    let wants_proof = PROOF_KEYWORDS.iter().any(|k| lower.contains(k));
    if !wants_proof || !verifier_available {
        return PipelineDecision {
            needs_verification: false,
            backend: Backend::SymbolicOnly,
        };
    }
    let wants_compute = COMPUTE_KEYWORDS.iter().any(|k| lower.contains(k));
    PipelineDecision {
        needs_verification: true,
        backend: if wants_compute {
            Backend::Both
        } else {
            Backend::ProofOnly
        },
    }
}
