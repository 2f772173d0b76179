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

//! Deterministic code repair: extraction of generated code blocks,
//! pre-execution sanitisation, and the error-signature repair table
//! used by the bounded retry loop. Everything here is pure text
//! rewriting; collaborator calls live in [`retry`] only.

pub mod extract;
pub mod repair;
pub mod retry;
pub mod sanitize;

pub use extract::{extract_code, extract_code_with_preference, normalise_markup, truncate_after_first_block};
pub use repair::{default_rules, RepairRule};
pub use retry::{run_with_retry, ExecutionError, DEFAULT_MAX_ATTEMPTS};
pub use sanitize::sanitize;
