//! Choosing a category for a transaction description from the user's rules.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use rusqlite::Connection;

use crate::{
    Error, TransactionType, UserID,
    category::CategoryId,
    rule::{
        db::{get_all_rules, increment_match_count},
        models::{RuleId, RuleWithCategory},
    },
};

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// The pattern is a valid regular expression, matched case-insensitively.
    Regex(Regex),
    /// The pattern is not a valid regular expression and is matched as a lowercase substring.
    Substring(String),
}

impl RulePattern {
    /// Compile `pattern`, falling back to substring matching if it is not a valid regex.
    pub fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => RulePattern::Regex(regex),
            Err(error) => {
                tracing::debug!(
                    "Rule pattern {pattern:?} is not a valid regex, matching it as text: {error}"
                );
                RulePattern::Substring(pattern.to_lowercase())
            }
        }
    }

    /// Whether `description` matches the pattern, ignoring case.
    pub fn is_match(&self, description: &str) -> bool {
        let description = description.to_lowercase();

        match self {
            RulePattern::Regex(regex) => regex.is_match(&description),
            RulePattern::Substring(text) => description.contains(text.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    id: RuleId,
    category_id: CategoryId,
    transaction_type: TransactionType,
    confidence: f64,
    match_count: i64,
    pattern: RulePattern,
}

impl From<RuleWithCategory> for CompiledRule {
    fn from(rule_with_category: RuleWithCategory) -> Self {
        let transaction_type = rule_with_category.transaction_type();
        let rule = rule_with_category.rule;

        Self {
            id: rule.id,
            category_id: rule.category_id,
            transaction_type,
            confidence: rule.confidence,
            match_count: rule.match_count,
            pattern: RulePattern::new(&rule.pattern),
        }
    }
}

fn evaluation_order(left: &CompiledRule, right: &CompiledRule) -> Ordering {
    right
        .confidence
        .total_cmp(&left.confidence)
        .then_with(|| right.match_count.cmp(&left.match_count))
        .then_with(|| left.id.cmp(&right.id))
}

/// The user's rules, compiled once and kept in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
}

impl RuleMatcher {
    /// Load and compile all of the user's rules.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the rules could not be read.
    pub fn load(user_id: &UserID, connection: &Connection) -> Result<Self, Error> {
        let rules = get_all_rules(user_id, connection)?
            .into_iter()
            .map(CompiledRule::from)
            .collect();

        Ok(Self::from_compiled(rules))
    }

    fn from_compiled(mut rules: Vec<CompiledRule>) -> Self {
        rules.sort_by(evaluation_order);

        Self { rules }
    }

    /// Find the first rule for `transaction_type` that matches `description` without recording
    /// the match.
    pub fn find_match(
        &self,
        description: &str,
        transaction_type: TransactionType,
    ) -> Option<(RuleId, CategoryId)> {
        self.rules
            .iter()
            .filter(|rule| rule.transaction_type == transaction_type)
            .find(|rule| rule.pattern.is_match(description))
            .map(|rule| (rule.id, rule.category_id))
    }

    /// Choose a category for a transaction and record the match against the winning rule.
    ///
    /// Recording the match is best effort: if the match count cannot be saved the category is
    /// still returned. Returns `None` if no rule matches.
    pub fn categorize(
        &mut self,
        description: &str,
        transaction_type: TransactionType,
        connection: &Connection,
    ) -> Option<CategoryId> {
        let (rule_id, category_id) = self.find_match(description, transaction_type)?;

        if let Err(error) = increment_match_count(rule_id, connection) {
            tracing::warn!("Could not update match count for rule {rule_id}: {error}");
        }

        if let Some(rule) = self.rules.iter_mut().find(|rule| rule.id == rule_id) {
            rule.match_count += 1;
        }
        self.rules.sort_by(evaluation_order);

        Some(category_id)
    }
}
