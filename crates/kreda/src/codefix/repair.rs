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

//! Maps compute-collaborator error signatures to code transforms.
//! The table is ordered; the first rule whose signature matches the
//! error text wins and its transform is applied as a substitution
//! over the whole code string.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub struct RepairRule {
    pub name: &'static str,
    signature: Regex,
    transform: fn(code: &str, error: &Captures) -> String,
}

impl RepairRule {
    pub fn matches<'e>(&self, error_text: &'e str) -> Option<Captures<'e>> {
        self.signature.captures(error_text)
    }

    pub fn apply(&self, code: &str, error: &Captures) -> String {
        (self.transform)(code, error)
    }
}

/// Applies the first matching rule. Returns the rule name and the
/// transformed code; the caller decides whether a textual no-op means
/// the failure class is not actually covered.
pub fn repair(rules: &[RepairRule], error_text: &str, code: &str) -> Option<(&'static str, String)> {
    for rule in rules {
        if let Some(caps) = rule.matches(error_text) {
            return Some((rule.name, rule.apply(code, &caps)));
        }
    }
    None
}

pub fn default_rules() -> &'static [RepairRule] {
    &DEFAULT_RULES
}

static DEFAULT_RULES: Lazy<Vec<RepairRule>> = Lazy::new(|| {
    vec![
        RepairRule {
            name: "declare_missing_symbol",
            signature: Regex::new(r"name '([A-Za-z_]\w*)' is not defined").expect("signature"),
            transform: declare_missing_symbol,
        },
        RepairRule {
            name: "guard_empty_solve_indexing",
            signature: Regex::new(r"list index out of range").expect("signature"),
            transform: guard_empty_solve_indexing,
        },
        RepairRule {
            name: "coerce_conjunction_in_loop",
            signature: Regex::new(r"'And' object is not iterable").expect("signature"),
            transform: coerce_conjunction_in_loop,
        },
        RepairRule {
            name: "rewrite_bool_to_equation",
            signature: Regex::new(r"cannot determine truth value|'bool' object").expect("signature"),
            transform: rewrite_bool_to_equation,
        },
        RepairRule {
            name: "force_first_element_indexing",
            signature: Regex::new(r"object is not subscriptable").expect("signature"),
            transform: force_first_element_indexing,
        },
    ]
});

static SOLVE_INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(\s*)([A-Za-z_]\w*)\s*=\s*solve\((.*)\)\[0\]\s*$").expect("solve index regex")
});
static FOR_LOOP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(\s*)for\s+([A-Za-z_]\w*)\s+in\s+([A-Za-z_]\w*)\s*:\s*$")
        .expect("for loop regex")
});
static EQ_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(\s*)([A-Za-z_]\w*)\s*=\s*(.+?)\s*==\s*(.+?)\s*$").expect("eq assign regex")
});
static SUBSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_]\w*)\[\d+\]").expect("subscript regex"));

/// `NameError: name 'R' is not defined` — the generator used a symbol
/// it never declared. Declare it right after the import block.
fn declare_missing_symbol(code: &str, error: &Captures) -> String {
    let name = &error[1];
    let declaration = format!("{name} = symbols('{name}')");
    let mut lines: Vec<&str> = code.lines().collect();
    let after_imports = lines
        .iter()
        .rposition(|line| {
            let t = line.trim_start();
            t.starts_with("import ") || t.starts_with("from ")
        })
        .map_or(0, |i| i + 1);
    lines.insert(after_imports, &declaration);
    lines.join("\n")
}

/// `solve(...)[0]` on an empty solution set. Split into a guarded
/// two-line form.
fn guard_empty_solve_indexing(code: &str, _error: &Captures) -> String {
    SOLVE_INDEX_RE
        .replace_all(code, "${1}${2}_candidates = solve(${3})\n${1}${2} = ${2}_candidates[0] if ${2}_candidates else None")
        .into_owned()
}

/// Iterating over a logical conjunction (`And`) instead of a list.
fn coerce_conjunction_in_loop(code: &str, _error: &Captures) -> String {
    FOR_LOOP_RE
        .replace_all(
            code,
            "${1}for ${2} in (${3} if isinstance(${3}, (list, tuple, set)) else [${3}]):",
        )
        .into_owned()
}

/// `a = b == c` evaluates to a Python bool; an equation object was
/// intended.
fn rewrite_bool_to_equation(code: &str, _error: &Captures) -> String {
    EQ_ASSIGN_RE
        .replace_all(code, "${1}${2} = Eq(${3}, ${4})")
        .into_owned()
}

/// Integer indexing on a non-sequence (a `FiniteSet`, usually). Force
/// the access through `list(...)[0]`.
fn force_first_element_indexing(code: &str, _error: &Captures) -> String {
    SUBSCRIPT_RE.replace_all(code, "list(${1})[0]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_symbol_declared_after_imports() {
        let code = "from sympy import symbols, solve\nrown = x + R\nprint(rown)";
        let (name, fixed) = repair(
            default_rules(),
            "NameError: name 'R' is not defined",
            code,
        )
        .unwrap();
        assert_eq!(name, "declare_missing_symbol");
        assert_eq!(
            fixed,
            "from sympy import symbols, solve\nR = symbols('R')\nrown = x + R\nprint(rown)"
        );
    }

    #[test]
    fn missing_symbol_without_imports_goes_on_top() {
        let (_, fixed) = repair(
            default_rules(),
            "NameError: name 'n' is not defined",
            "print(n)",
        )
        .unwrap();
        assert!(fixed.starts_with("n = symbols('n')\n"));
    }

    #[test]
    fn solve_indexing_gets_guarded() {
        let code = "    wynik = solve(rown, x)[0]";
        let (_, fixed) = repair(
            default_rules(),
            "IndexError: list index out of range",
            code,
        )
        .unwrap();
        assert_eq!(
            fixed,
            "    wynik_candidates = solve(rown, x)\n    wynik = wynik_candidates[0] if wynik_candidates else None"
        );
    }

    #[test]
    fn conjunction_loop_gets_coerced() {
        let code = "for warunek in rozw:\n    print(warunek)";
        let (_, fixed) = repair(
            default_rules(),
            "TypeError: 'And' object is not iterable",
            code,
        )
        .unwrap();
        assert!(fixed.starts_with(
            "for warunek in (rozw if isinstance(rozw, (list, tuple, set)) else [rozw]):"
        ));
    }

    #[test]
    fn bool_assignment_becomes_equation() {
        let code = "rown = 2*x + 1 == 5";
        let (_, fixed) = repair(
            default_rules(),
            "TypeError: cannot determine truth value of Relational",
            code,
        )
        .unwrap();
        assert_eq!(fixed, "rown = Eq(2*x + 1, 5)");
    }

    #[test]
    fn non_sequence_indexing_forced_to_first_element() {
        let code = "print(rozw[1])";
        let (_, fixed) = repair(
            default_rules(),
            "TypeError: 'FiniteSet' object is not subscriptable",
            code,
        )
        .unwrap();
        assert_eq!(fixed, "print(list(rozw)[0])");
    }

    #[test]
    fn unknown_error_matches_nothing() {
        assert!(repair(default_rules(), "ZeroDivisionError: division by zero", "x = 1").is_none());
    }
}
