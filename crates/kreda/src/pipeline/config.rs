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

//! Typed, role-specific stage configuration. The prompt table is
//! enumerated once and selected by the controller; a YAML file can
//! override any part of it.

use super::error::PipelineError;
use crate::codefix::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Agent label shown in the chat UI next to this stage's messages.
    pub label: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub plan: StageConfig,
    pub solve: StageConfig,
    pub summary: StageConfig,
    pub formalize: StageConfig,
    pub max_attempts: u32,
    pub retrieval_top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plan: StageConfig {
                label: "Planista".to_string(),
                system_prompt: "Jesteś doświadczonym nauczycielem matematyki przygotowującym uczniów do matury rozszerzonej. \
Przeanalizuj zadanie i podaj zwięzły plan rozwiązania w punktach: jakie pojęcia, wzory i metody zastosować. \
Nie rozwiązuj zadania do końca."
                    .to_string(),
                max_tokens: 1024,
                temperature: 0.3,
            },
            solve: StageConfig {
                label: "Matematyk".to_string(),
                system_prompt: "Jesteś matematykiem piszącym kod SymPy. Rozwiąż zadanie zgodnie z planem. \
Odpowiedz dokładnie jednym blokiem kodu ```python. Kod musi importować sympy, deklarować zmienne przez symbols \
i kończyć się instrukcją print z wynikiem."
                    .to_string(),
                max_tokens: 2048,
                temperature: 0.2,
            },
            summary: StageConfig {
                label: "Recenzent".to_string(),
                system_prompt: "Jesteś recenzentem rozwiązań maturalnych. Na podstawie planu, kodu i wyniku wykonania \
przedstaw uczniowi czytelne rozwiązanie z odpowiedzią, używając notacji LaTeX w delimiterach $...$. \
Jeśli wykonanie kodu zakończyło się błędem, napisz to wprost i nie podawaj wymyślonego wyniku liczbowego."
                    .to_string(),
                max_tokens: 1536,
                temperature: 0.3,
            },
            formalize: StageConfig {
                label: "Formalista".to_string(),
                system_prompt: "Jesteś ekspertem od asystenta dowodzenia Lean 4. Sformalizuj podane twierdzenie \
wraz z dowodem jako samodzielny kod Lean w jednym bloku ```lean."
                    .to_string(),
                max_tokens: 2048,
                temperature: 0.2,
            },
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retrieval_top_k: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("invalid pipeline config: {e}")))
    }

    pub fn from_yaml_file(path: &str) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {path}: {e}")))?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_stages() {
        let config = PipelineConfig::default();
        assert_eq!(config.plan.label, "Planista");
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.retrieval_top_k, 3);
    }

    #[test]
    fn yaml_override_is_partial() {
        let config =
            PipelineConfig::from_yaml_str("max_attempts: 5\n").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.summary.label, "Recenzent");
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        assert!(PipelineConfig::from_yaml_str("max_attempts: [oops").is_err());
    }
}
