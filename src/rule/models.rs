use serde::{Deserialize, Serialize};

use crate::{
    TransactionType, UserID,
    category::{Category, CategoryId},
    database_id::DatabaseId,
};

pub type RuleId = DatabaseId;

/// A rule that automatically categorizes transactions whose descriptions match a pattern.
///
/// The pattern is tried as a case-insensitive regular expression. Patterns that are not valid
/// regular expressions are matched as case-insensitive substrings instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,

    /// The pattern that transaction descriptions are matched against.
    pub pattern: String,

    /// The ID of the category to apply when this rule matches.
    pub category_id: CategoryId,

    /// The priority of the rule, rules with a higher confidence are tried first.
    pub confidence: f64,

    /// How many transactions this rule has categorized. Breaks ties between rules with the
    /// same confidence.
    pub match_count: i64,

    pub user_id: UserID,
}

/// A rule with its associated category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleWithCategory {
    #[serde(flatten)]
    pub rule: Rule,
    pub category: Category,
}

impl RuleWithCategory {
    /// The type of transactions this rule applies to.
    pub fn transaction_type(&self) -> TransactionType {
        self.category.category_type
    }
}

/// The request body for creating and editing rules.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleData {
    /// The pattern that transaction descriptions are matched against.
    pub pattern: Option<String>,
    /// The ID of the category to apply when this rule matches.
    pub category_id: Option<CategoryId>,
    /// The priority of the rule, defaults to zero.
    pub confidence: Option<f64>,
}
