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

use solver_contracts::CollabError;
use thiserror::Error;

/// Fatal pipeline failures. Execution failures are deliberately not
/// here: they flow into the conversation as error tool results and
/// the run continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: CollabError,
    },

    #[error("compute collaborator unreachable: {0}")]
    Compute(#[source] CollabError),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}
