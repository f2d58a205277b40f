//! Rule evaluation and conflict resolution (§4.6).
//!
//! Grounded on `backend/rules/override_manager.py` for the conflict-resolution pass over matched
//! rules. Regexes are compiled once at load time; a rule whose pattern fails to compile is
//! deactivated for evaluation and a warning is logged once (§4.6.S).

use regex::Regex;

use crate::document::{Document, Severity};

use super::model::{Combinator, Condition, ConditionValue, Field, Operator, Rule};

/// Evidence for one matched condition, carried into the audit trail.
#[derive(Debug, Clone)]
pub struct ConditionEvidence {
    pub field: Field,
    pub operator: Operator,
    pub description: String,
}

/// A rule whose conditions matched a document, with the evidence for each matched condition.
#[derive(Debug, Clone)]
pub struct MatchedRule {
    pub rule_id: String,
    pub priority: u8,
    pub severity_override: Severity,
    pub condition_count: usize,
    pub evidence: Vec<ConditionEvidence>,
}

/// Outcome of conflict resolution over a matched-rule set (§4.6: "Conflict resolution").
#[derive(Debug, Clone)]
pub struct ConflictResolution {
    pub chosen_severity: Severity,
    pub applied_rule_ids: Vec<String>,
}

/// A [`Rule`] with its regex conditions pre-compiled, and a flag recording whether it is usable
/// for evaluation (false if any regex condition failed to compile).
pub struct CompiledRule {
    pub rule: Rule,
    pub evaluable: bool,
    compiled_patterns: Vec<Option<Regex>>,
}

/// Compile a rule's regex conditions once. A non-compiling pattern marks the rule
/// non-evaluable and logs a warning; it is not rejected outright (§4.6.S).
pub fn compile_rule(rule: Rule) -> CompiledRule {
    let mut evaluable = rule.active;
    let mut compiled_patterns = Vec::with_capacity(rule.conditions.len());

    for condition in &rule.conditions {
        if condition.operator != Operator::RegexMatch {
            compiled_patterns.push(None);
            continue;
        }
        let Some(pattern) = condition.value.as_str() else {
            compiled_patterns.push(None);
            evaluable = false;
            continue;
        };
        match Regex::new(pattern) {
            Ok(re) => compiled_patterns.push(Some(re)),
            Err(err) => {
                tracing::warn!(rule_id = %rule.id, error = %err, "rule regex failed to compile; deactivating for evaluation");
                compiled_patterns.push(None);
                evaluable = false;
            }
        }
    }

    CompiledRule {
        rule,
        evaluable,
        compiled_patterns,
    }
}

fn resolve_field_text(document: &Document, field: Field) -> String {
    match field {
        Field::Text => document.text.clone(),
        Field::MetadataFilename => document.metadata.filename.clone(),
        Field::MetadataTags => document.metadata.tags.join(" "),
        Field::DocumentType => document.metadata.document_type.clone(),
    }
}

/// Word count used by `word_count_gt`/`word_count_lt`. `metadata.tags` counts tags, not words
/// within the joined string (§4.6: "Field resolution").
fn resolve_field_word_count(document: &Document, field: Field) -> usize {
    match field {
        Field::MetadataTags => document.metadata.tags.len(),
        other => resolve_field_text(document, other).split_whitespace().count(),
    }
}

fn evaluate_condition(
    document: &Document,
    condition: &Condition,
    compiled_pattern: Option<&Regex>,
) -> Option<ConditionEvidence> {
    match condition.operator {
        Operator::Contains => {
            let haystack = resolve_field_text(document, condition.field);
            let needle = condition.value.as_str()?;
            let matched = if condition.case_sensitive {
                haystack.contains(needle)
            } else {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            };
            matched.then(|| ConditionEvidence {
                field: condition.field,
                operator: condition.operator,
                description: format!("field contains {needle:?}"),
            })
        }
        Operator::RegexMatch => {
            let haystack = resolve_field_text(document, condition.field);
            let re = compiled_pattern?;
            re.is_match(&haystack).then(|| ConditionEvidence {
                field: condition.field,
                operator: condition.operator,
                description: format!("field matches /{}/", re.as_str()),
            })
        }
        Operator::WordCountGt => {
            let count = resolve_field_word_count(document, condition.field);
            let threshold = condition.value.as_usize()?;
            (count > threshold).then(|| ConditionEvidence {
                field: condition.field,
                operator: condition.operator,
                description: format!("word count {count} > {threshold}"),
            })
        }
        Operator::WordCountLt => {
            let count = resolve_field_word_count(document, condition.field);
            let threshold = condition.value.as_usize()?;
            (count < threshold).then(|| ConditionEvidence {
                field: condition.field,
                operator: condition.operator,
                description: format!("word count {count} < {threshold}"),
            })
        }
    }
}

/// Stateless rule evaluator.
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every evaluable, active rule against `document`, sorted `(priority DESC, id ASC)`
    /// per §4.6, returning only the rules whose conditions matched.
    pub fn evaluate(&self, rules: &[CompiledRule], document: &Document) -> Vec<MatchedRule> {
        let mut candidates: Vec<&CompiledRule> = rules.iter().filter(|r| r.evaluable && r.rule.active).collect();
        candidates.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority).then_with(|| a.rule.id.cmp(&b.rule.id)));

        let mut matched = Vec::new();
        for compiled in candidates {
            let mut evidence = Vec::new();
            for (condition, pattern) in compiled.rule.conditions.iter().zip(compiled.compiled_patterns.iter()) {
                if let Some(ev) = evaluate_condition(document, condition, pattern.as_ref()) {
                    evidence.push(ev);
                }
            }

            let satisfied = match compiled.rule.combinator {
                Combinator::And => evidence.len() == compiled.rule.conditions.len(),
                Combinator::Or => !evidence.is_empty(),
            };

            if satisfied {
                matched.push(MatchedRule {
                    rule_id: compiled.rule.id.clone(),
                    priority: compiled.rule.priority,
                    severity_override: compiled.rule.severity_override,
                    condition_count: compiled.rule.conditions.len(),
                    evidence,
                });
            }
        }
        matched
    }

    /// Among matched rules, find the highest priority P*, then the most restrictive severity
    /// among rules at P*; every P*-rule whose override equals the chosen severity is "applied"
    /// (§4.6: "Conflict resolution").
    pub fn resolve_conflicts(&self, matched: &[MatchedRule]) -> Option<ConflictResolution> {
        let top_priority = matched.iter().map(|m| m.priority).max()?;
        let at_top: Vec<&MatchedRule> = matched.iter().filter(|m| m.priority == top_priority).collect();
        let chosen = at_top.iter().map(|m| m.severity_override).max()?;
        let applied_rule_ids = at_top
            .iter()
            .filter(|m| m.severity_override == chosen)
            .map(|m| m.rule_id.clone())
            .collect();
        Some(ConflictResolution {
            chosen_severity: chosen,
            applied_rule_ids,
        })
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    fn contains_rule(name: &str, priority: u8, needle: &str, severity: Severity) -> Rule {
        Rule::new(
            name,
            priority,
            vec![Condition {
                field: Field::Text,
                operator: Operator::Contains,
                value: ConditionValue::Str(needle.to_string()),
                case_sensitive: false,
            }],
            Combinator::And,
            severity,
        )
    }

    #[test]
    fn invalid_regex_deactivates_rule_without_rejecting_it() {
        let rule = Rule::new(
            "bad regex",
            10,
            vec![Condition {
                field: Field::Text,
                operator: Operator::RegexMatch,
                value: ConditionValue::Str("(unterminated".to_string()),
                case_sensitive: false,
            }],
            Combinator::And,
            Severity::High,
        );
        let compiled = compile_rule(rule);
        assert!(!compiled.evaluable);
    }

    #[test]
    fn evaluate_matches_contains_condition_case_insensitively() {
        let engine = RuleEngine::new();
        let rule = compile_rule(contains_rule("termination", 50, "terminate", Severity::High));
        let doc = Document::new_classification("Notice of TERMINATE for cause", DocumentMetadata::default());
        let matched = engine.evaluate(&[rule], &doc);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].evidence.len(), 1);
    }

    #[test]
    fn conflict_resolution_picks_most_restrictive_at_top_priority() {
        let engine = RuleEngine::new();
        let matched = vec![
            MatchedRule {
                rule_id: "a".to_string(),
                priority: 90,
                severity_override: Severity::Medium,
                condition_count: 1,
                evidence: vec![],
            },
            MatchedRule {
                rule_id: "b".to_string(),
                priority: 90,
                severity_override: Severity::Critical,
                condition_count: 1,
                evidence: vec![],
            },
            MatchedRule {
                rule_id: "c".to_string(),
                priority: 50,
                severity_override: Severity::Critical,
                condition_count: 1,
                evidence: vec![],
            },
        ];
        let resolution = engine.resolve_conflicts(&matched).unwrap();
        assert_eq!(resolution.chosen_severity, Severity::Critical);
        assert_eq!(resolution.applied_rule_ids, vec!["b".to_string()]);
    }

    #[test]
    fn resolve_conflicts_returns_none_when_nothing_matched() {
        let engine = RuleEngine::new();
        assert!(engine.resolve_conflicts(&[]).is_none());
    }

    #[test]
    fn or_combinator_matches_on_any_condition() {
        let engine = RuleEngine::new();
        let rule = Rule::new(
            "either",
            10,
            vec![
                Condition {
                    field: Field::Text,
                    operator: Operator::Contains,
                    value: ConditionValue::Str("foo".to_string()),
                    case_sensitive: false,
                },
                Condition {
                    field: Field::Text,
                    operator: Operator::Contains,
                    value: ConditionValue::Str("bar".to_string()),
                    case_sensitive: false,
                },
            ],
            Combinator::Or,
            Severity::Low,
        );
        let compiled = compile_rule(rule);
        let doc = Document::new_classification("contains bar only", DocumentMetadata::default());
        let matched = engine.evaluate(&[compiled], &doc);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].evidence.len(), 1);
    }
}
