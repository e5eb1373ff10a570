//! Heuristic repair of generated relational queries.
//!
//! A fixed, ordered list of regex rewrites for failure modes the model is
//! known to produce. Rules run unconditionally in order and a later rule may
//! match text written by an earlier one. There is no grammar awareness.

use crate::error::{NlqError, NlqResult};
use crate::models::{Dialect, SchemaDescription, TypeTag};
use regex::{Captures, Regex};
use tracing::{debug, warn};

/// Extra check a rule runs against a match before rewriting it.
pub type Precondition = fn(&Captures<'_>, &SchemaDescription) -> bool;

/// One pattern rewrite.
#[derive(Debug, Clone, Copy)]
pub struct RepairRule {
    pub name: &'static str,
    pub dialects: &'static [Dialect],
    pub pattern: &'static str,
    /// Replacement template in `regex` expansion syntax (`${1}`).
    pub replacement: &'static str,
    pub precondition: Option<Precondition>,
}

impl RepairRule {
    pub fn applies_to(&self, dialect: Dialect) -> bool {
        self.dialects.contains(&dialect)
    }
}

// =============================================================================
// Shipped Rules
// =============================================================================

/// Rewrites shipped for MySQL, in application order.
///
/// The first two rules are mutual inverses: an identifier-like
/// `CAST(x.id AS JSON)` is turned into `JSON_QUOTE(x.id)` by the first and
/// back into the cast by the second. Only non-identifier casts end up quoted.
pub const DEFAULT_RULES: &[RepairRule] = &[
    RepairRule {
        name: "cast_as_json_to_json_quote",
        dialects: &[Dialect::MySql],
        pattern: r"(?i)CAST\(\s*([^()]+?)\s+AS\s+JSON\s*\)",
        replacement: "JSON_QUOTE(${1})",
        precondition: None,
    },
    RepairRule {
        name: "identifier_json_quote_to_cast",
        dialects: &[Dialect::MySql],
        pattern: r"(?i)JSON_QUOTE\(\s*((?:\w+\.)?(?:id|\w+_id))\s*\)",
        replacement: "CAST(${1} AS JSON)",
        precondition: None,
    },
    RepairRule {
        name: "member_by_id_to_member_by_name",
        dialects: &[Dialect::MySql],
        pattern: r"(?i)JSON_CONTAINS\(\s*((?:\w+\.)?(\w+))\s*,\s*CAST\(\s*((?:\w+\.)?)\w+_id\s+AS\s+JSON\s*\)\s*\)",
        replacement: "JSON_CONTAINS(${1}, JSON_QUOTE(${3}name))",
        precondition: Some(column_holds_names),
    },
    RepairRule {
        name: "postgres_json_cast_to_json_quote",
        dialects: &[Dialect::MySql],
        pattern: r"(?i)('(?:[^']|'')*')::jsonb?\b",
        replacement: "JSON_QUOTE(${1})",
        precondition: None,
    },
];

/// The JSON column in capture 2 stores strings, so members are names not ids.
fn column_holds_names(caps: &Captures<'_>, schema: &SchemaDescription) -> bool {
    caps.get(2)
        .is_some_and(|col| schema.has_field_tagged(col.as_str(), &TypeTag::ArrayOfString))
}

// =============================================================================
// Repair Pass
// =============================================================================

/// Compiled, ordered rule list.
#[derive(Debug, Clone)]
pub struct RepairPass {
    rules: Vec<(RepairRule, Regex)>,
}

impl RepairPass {
    /// Compile a custom rule list.
    pub fn with_rules(rules: &[RepairRule]) -> NlqResult<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(rule.pattern)
                    .map(|re| (*rule, re))
                    .map_err(|e| {
                        NlqError::configuration(format!(
                            "Repair rule '{}' does not compile: {}",
                            rule.name, e
                        ))
                    })
            })
            .collect::<NlqResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Names of the compiled rules in application order.
    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(rule, _)| rule.name)
    }

    /// Apply every rule for `dialect` in order.
    pub fn apply(&self, query: &str, dialect: Dialect, schema: &SchemaDescription) -> String {
        let mut text = query.to_string();

        for (rule, regex) in self.rules.iter().filter(|(r, _)| r.applies_to(dialect)) {
            let rewritten = regex
                .replace_all(&text, |caps: &Captures<'_>| {
                    let allowed = rule.precondition.is_none_or(|check| check(caps, schema));
                    if allowed {
                        let mut out = String::new();
                        caps.expand(rule.replacement, &mut out);
                        out
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned();

            if rewritten != text {
                debug!(rule = rule.name, before = %text, after = %rewritten, "Repair rule applied");
                text = rewritten;
            }
        }

        text
    }
}

impl Default for RepairPass {
    /// Compile the shipped rules, skipping any that fail to compile.
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|rule| match Regex::new(rule.pattern) {
                Ok(re) => Some((*rule, re)),
                Err(e) => {
                    warn!(rule = rule.name, error = %e, "Skipping repair rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}
