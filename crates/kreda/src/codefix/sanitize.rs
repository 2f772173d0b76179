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

//! Pre-execution sanitisation of generated SymPy code. Every pass is
//! a named pure function; `sanitize` composes them in a fixed order
//! and is idempotent. Targeted error-driven rewrites live in
//! [`super::repair`], not here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Single-letter names sympy genuinely exports. Everything else of
/// length one in an import list is a generator mistake.
const KEEP_SINGLE_LETTER: &[&str] = &["I", "E", "S", "N", "Q"];

/// Python builtins and keywords that models occasionally "import"
/// from sympy.
const RESERVED_NAMES: &[&str] = &["lambda", "print", "list", "sum", "all", "any", "abs"];

/// Known hallucinated function names and their real equivalents.
const HALLUCINATED_CALLS: &[(&str, &str)] = &[
    ("solve_equation", "solve"),
    ("square_root", "sqrt"),
    ("calculate_derivative", "diff"),
    ("calculate_integral", "integrate"),
];

static SYMBOL_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*\s*=\s*symbols\(").expect("symbol decl regex")
});
static FROM_SYMPY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)from\s+sympy\s+import\s+(.+)$").expect("sympy import regex"));
static MISCAP_PI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Pi|PI)\b").expect("pi regex"));
static PRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*print\s*\(").expect("print regex"));
static TOP_ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Za-z_]\w*)\s*=\s*[^=]").expect("assign regex"));

/// Normalises generated code into a runnable form. Idempotent by
/// construction; applied exactly once before the first execution
/// attempt.
pub fn sanitize(code: &str) -> String {
    let mut out = strip_assertions(code);
    out = dedupe_symbol_declarations(&out);
    out = dedupe_imports(&out);
    out = rewrite_caret_power(&out);
    out = prune_bad_imports(&out);
    out = rename_hallucinated_calls(&out);
    out = normalise_constants(&out);
    out = ensure_output(&out);
    out
}

/// Drops `assert` statements; the compute service treats a failing
/// assertion as a crash, not a result.
pub fn strip_assertions(code: &str) -> String {
    code.lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.starts_with("assert ") || t.starts_with("assert("))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keeps only the first occurrence of each repeated `symbols(...)`
/// declaration line.
pub fn dedupe_symbol_declarations(code: &str) -> String {
    dedupe_lines(code, |line| SYMBOL_DECL_RE.is_match(line))
}

/// Keeps only the first occurrence of each repeated import line.
pub fn dedupe_imports(code: &str) -> String {
    dedupe_lines(code, |line| {
        line.starts_with("import ") || line.starts_with("from ")
    })
}

fn dedupe_lines(code: &str, applies: impl Fn(&str) -> bool) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    code.lines()
        .filter(|line| {
            let t = line.trim();
            if applies(t) {
                seen.insert(t.to_string())
            } else {
                true
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrites `^` exponentiation to `**` outside comments and string
/// literals, including triple-quoted multi-line strings. Models
/// trained on LaTeX emit `^` constantly; in Python it is XOR and
/// silently produces nonsense.
pub fn rewrite_caret_power(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len() + 8);
    // (quote char, is triple-quoted)
    let mut in_string: Option<(char, bool)> = None;
    let mut escaped = false;
    let mut in_comment = false;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if let Some((quote, triple)) = in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                if !triple {
                    in_string = None;
                } else if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    out.push(quote);
                    out.push(quote);
                    i += 2;
                    in_string = None;
                }
            } else if !triple && ch == '\n' {
                // unterminated single-line literal, give up at the break
                in_string = None;
            }
            i += 1;
            continue;
        }
        if in_comment {
            out.push(ch);
            if ch == '\n' {
                in_comment = false;
            }
            i += 1;
            continue;
        }
        match ch {
            '#' => {
                in_comment = true;
                out.push(ch);
            }
            '\'' | '"' => {
                if chars.get(i + 1) == Some(&ch) && chars.get(i + 2) == Some(&ch) {
                    out.push(ch);
                    out.push(ch);
                    out.push(ch);
                    i += 2;
                    in_string = Some((ch, true));
                } else {
                    in_string = Some((ch, false));
                }
            }
            '^' => out.push_str("**"),
            _ => out.push(ch),
        }
        i += 1;
    }
    out
}

/// Removes single-letter and reserved names from `from sympy import`
/// lists; the single letters are almost always the problem's own
/// variables, which must be declared with `symbols`, not imported.
pub fn prune_bad_imports(code: &str) -> String {
    code.lines()
        .filter_map(|line| {
            let Some(caps) = FROM_SYMPY_RE.captures(line) else {
                return Some(line.to_string());
            };
            let indent = &caps[1];
            let kept: Vec<&str> = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|name| {
                    let base = name.split_whitespace().next().unwrap_or(name);
                    if base.len() == 1 && !KEEP_SINGLE_LETTER.contains(&base) {
                        return false;
                    }
                    !RESERVED_NAMES.contains(&base)
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(format!("{indent}from sympy import {}", kept.join(", ")))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrites known hallucinated function names to their sympy
/// equivalents.
pub fn rename_hallucinated_calls(code: &str) -> String {
    static CALL_RES: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
        HALLUCINATED_CALLS
            .iter()
            .map(|(wrong, right)| {
                (
                    Regex::new(&format!(r"\b{wrong}\s*\(")).expect("hallucinated call regex"),
                    format!("{right}("),
                )
            })
            .collect()
    });
    let mut out = code.to_string();
    for (re, replacement) in CALL_RES.iter() {
        out = re.replace_all(&out, replacement.as_str()).into_owned();
    }
    out
}

/// `Pi`/`PI` is the most common miscapitalisation; sympy exports `pi`.
pub fn normalise_constants(code: &str) -> String {
    MISCAP_PI_RE.replace_all(code, "pi").into_owned()
}

/// Guarantees at least one output-producing statement: without a
/// `print` the compute service returns an empty stdout and the
/// summary stage has nothing to report.
pub fn ensure_output(code: &str) -> String {
    if PRINT_RE.is_match(code) {
        return code.to_string();
    }
    let last_assigned = TOP_ASSIGN_RE
        .captures_iter(code)
        .last()
        .map(|caps| caps[1].to_string());
    match last_assigned {
        Some(name) => format!("{code}\nprint({name})"),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSY: &str = "from sympy import symbols, solve, x, lambda\n\
from sympy import symbols, solve, x, lambda\n\
x = symbols('x')\n\
x = symbols('x')\n\
assert x is not None\n\
y = x^2 + 1  # kwadrat: x^2\n\
z = square_root(y)\n\
w = 2 * Pi * x";

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize(MESSY);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn caret_becomes_power_operator_outside_comments() {
        let out = sanitize("y = x^2");
        assert!(out.contains("x**2"));
        let commented = rewrite_caret_power("y = x**2  # jak w LaTeX: x^2");
        assert!(commented.contains("# jak w LaTeX: x^2"));
    }

    #[test]
    fn caret_untouched_inside_strings() {
        let out = rewrite_caret_power("s = 'x^2'\nt = x^3");
        assert!(out.contains("'x^2'"));
        assert!(out.contains("x**3"));
    }

    #[test]
    fn caret_untouched_inside_triple_quoted_strings() {
        let code = "opis = \"\"\"wzór: x^2\ndalej: y^3\"\"\"\nz = a^2";
        let out = rewrite_caret_power(code);
        assert!(out.contains("x^2"));
        assert!(out.contains("y^3"));
        assert!(out.contains("a**2"));
        assert!(out.contains("\"\"\"wzór"));
    }

    #[test]
    fn duplicate_imports_and_declarations_keep_first() {
        let out = sanitize(MESSY);
        assert_eq!(out.matches("from sympy import").count(), 1);
        assert_eq!(out.matches("= symbols('x')").count(), 1);
    }

    #[test]
    fn assertions_are_dropped() {
        assert!(!sanitize(MESSY).contains("assert"));
    }

    #[test]
    fn bad_import_names_are_pruned() {
        let out = sanitize(MESSY);
        assert!(out.contains("from sympy import symbols, solve"));
        assert!(!out.contains("import symbols, solve, x"));
        assert!(!out.contains("lambda"));
    }

    #[test]
    fn known_single_letter_exports_survive() {
        let out = prune_bad_imports("from sympy import I, E, x, pi");
        assert_eq!(out, "from sympy import I, E, pi");
    }

    #[test]
    fn hallucinated_calls_are_renamed() {
        let out = sanitize(MESSY);
        assert!(out.contains("sqrt(y)"));
        assert!(!out.contains("square_root"));
    }

    #[test]
    fn miscapitalised_pi_is_normalised() {
        assert!(sanitize(MESSY).contains("2 * pi * x"));
    }

    #[test]
    fn print_appended_for_last_assignment() {
        let out = sanitize(MESSY);
        assert!(out.ends_with("print(w)"));
    }

    #[test]
    fn existing_print_not_duplicated() {
        let code = "a = 1\nprint(a)";
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn code_without_assignments_left_alone() {
        assert_eq!(ensure_output("1 + 1"), "1 + 1");
    }
}
