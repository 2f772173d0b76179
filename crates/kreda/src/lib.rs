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

//! Solve pipeline for a math chat application: role-scoped model
//! turns, SymPy code extraction and sanitisation, bounded
//! self-healing execution, and optional formal verification.

pub mod codefix;
pub mod collab;
pub mod pipeline;

pub use codefix::retry::ExecutionError;
pub use pipeline::{
    Conversation, Message, Phase, PipelineDecision, PipelineError, PipelineEvent, PipelineState,
    SolvePipeline, ToolCall, ToolResult,
};
