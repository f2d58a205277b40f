//! Rule engine (C6, §4.6): deterministic overrides over the LLM's raw classification.

pub mod engine;
pub mod model;

pub use engine::{compile_rule, CompiledRule, ConditionEvidence, ConflictResolution, MatchedRule, RuleEngine};
pub use model::{Combinator, Condition, ConditionValue, Field, Operator, Rule, RuleEffectiveness, RuleVersion};
