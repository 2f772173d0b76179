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

//! Pulls runnable code out of free-text model output and repairs the
//! malformed math markup generators leave behind.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```").expect("fence regex")
});
static BOXED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\boxed\{([^{}]*)\}").expect("boxed regex"));
static FRAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[dt]?frac\{([^{}]*)\}\{([^{}]*)\}").expect("frac regex"));
static SQRT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\sqrt\{([^{}]*)\}").expect("sqrt regex"));
static EMPTY_DISPLAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$\s*\$\$").expect("empty display regex"));
static EMPTY_INLINE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\$\s*\$\s*$").expect("empty inline regex"));

const PYTHON_TAGS: &[&str] = &["python", "py", "sympy"];

/// Returns the first fenced block that looks executable. A block with
/// an explicit matching language tag always wins over an untagged one.
pub fn extract_code(text: &str) -> Option<String> {
    extract_code_with_preference(text, PYTHON_TAGS)
}

/// Tag-preference variant; the formalisation stage uses it with the
/// `lean` tags.
pub fn extract_code_with_preference(text: &str, preferred: &[&str]) -> Option<String> {
    let mut untagged: Option<String> = None;
    for caps in FENCE_RE.captures_iter(text) {
        let lang = caps
            .get(1)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        let body = caps.get(2).map_or("", |m| m.as_str());
        if preferred.contains(&lang.as_str()) {
            return Some(body.trim().to_string());
        }
        if untagged.is_none() && lang.is_empty() && looks_executable(body) {
            untagged = Some(body.trim().to_string());
        }
    }
    untagged
}

fn looks_executable(body: &str) -> bool {
    body.contains("import ") || body.contains("print(") || body.contains("sympy") || body.contains("solve(")
}

/// Discards everything after the first fenced block closes. Models
/// often restate the whole solution below the code; the summary stage
/// regenerates that part anyway.
pub fn truncate_after_first_block(text: &str) -> String {
    match FENCE_RE.find(text) {
        Some(m) => text[..m.end()].to_string(),
        None => text.to_string(),
    }
}

/// Repairs common malformed math-markup artifacts so the rendering
/// collaborator receives consistently delimited LaTeX.
pub fn normalise_markup(text: &str) -> String {
    let mut out = replace_until_stable(text, &BOXED_RE, "$1");
    out = replace_until_stable(&out, &FRAC_RE, "(($1)/($2))");
    out = replace_until_stable(&out, &SQRT_RE, "sqrt($1)");
    out = EMPTY_DISPLAY_RE.replace_all(&out, "").into_owned();
    out = EMPTY_INLINE_LINE_RE.replace_all(&out, "").into_owned();
    close_unmatched_dollar(&out)
}

/// Repeats a substitution until a fixed point; handles nested macros
/// innermost-out.
fn replace_until_stable(text: &str, re: &Regex, replacement: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, replacement).into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// An odd number of `$` delimiters means one was left unmatched; the
/// trailing one is the usual culprit.
fn close_unmatched_dollar(text: &str) -> String {
    if text.matches('$').count() % 2 == 0 {
        return text.to_string();
    }
    match text.rfind('$') {
        Some(pos) => {
            let mut out = text.to_string();
            out.remove(pos);
            out
        }
        None => text.to_string(),
    }
}
