use rusqlite::{Connection, Row};

use crate::{
    Error, UserID,
    category::{CategoryId, map_category_row_with_offset, require_category},
    rule::models::{Rule, RuleId, RuleWithCategory},
};

const SELECT_RULE_WITH_CATEGORY: &str = "SELECT r.id, r.pattern, r.category_id, r.confidence, r.match_count, r.user_id,
            c.id, c.name, c.type, c.color, c.user_id
     FROM category_rule r
     INNER JOIN category c ON r.category_id = c.id";

/// The order in which rules are tried: highest confidence first, then the most used rule.
/// Rules that are still tied are tried oldest first.
const EVALUATION_ORDER: &str = "ORDER BY r.confidence DESC, r.match_count DESC, r.id ASC";

/// Create a rule in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyPattern] if `pattern` is blank,
/// - [Error::InvalidCategory] if `category_id` does not refer to one of the user's categories,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_rule(
    pattern: &str,
    category_id: CategoryId,
    confidence: f64,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Rule, Error> {
    let pattern = validate_pattern(pattern)?;
    require_category(category_id, user_id, connection)?;

    connection.execute(
        "INSERT INTO category_rule (pattern, category_id, confidence, user_id) VALUES (?1, ?2, ?3, ?4);",
        (pattern, category_id, confidence, user_id),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Rule {
        id,
        pattern: pattern.to_string(),
        category_id,
        confidence,
        match_count: 0,
        user_id: user_id.clone(),
    })
}

/// Retrieve one of the user's rules by `rule_id`.
///
/// # Errors
/// This function will return a [Error::NotFound] if the rule does not exist or belongs to
/// another user, or an [Error::SqlError] if there is an SQL error.
pub fn get_rule(
    rule_id: RuleId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<RuleWithCategory, Error> {
    connection
        .prepare(&format!(
            "{SELECT_RULE_WITH_CATEGORY} WHERE r.id = :id AND r.user_id = :user_id"
        ))?
        .query_row(
            rusqlite::named_params! {":id": rule_id, ":user_id": user_id},
            map_rule_with_category_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve all of the user's rules, in the order they are tried when categorizing.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_rules(
    user_id: &UserID,
    connection: &Connection,
) -> Result<Vec<RuleWithCategory>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_RULE_WITH_CATEGORY} WHERE r.user_id = :user_id {EVALUATION_ORDER}"
        ))?
        .query_map(&[(":user_id", user_id)], map_rule_with_category_row)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Update a rule's pattern, category and confidence.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyPattern] if the pattern is blank,
/// - [Error::InvalidCategory] if the category is not one of the user's categories,
/// - [Error::NotFound] if the rule does not exist or belongs to another user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_rule(rule: &Rule, connection: &Connection) -> Result<(), Error> {
    let pattern = validate_pattern(&rule.pattern)?;
    require_category(rule.category_id, &rule.user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE category_rule SET pattern = ?1, category_id = ?2, confidence = ?3
         WHERE id = ?4 AND user_id = ?5",
        (
            pattern,
            rule.category_id,
            rule.confidence,
            rule.id,
            &rule.user_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete one of the user's rules.
///
/// # Errors
/// This function will return a [Error::NotFound] if the rule does not exist or belongs to
/// another user, or an [Error::SqlError] if there is an SQL error.
pub fn delete_rule(rule_id: RuleId, user_id: &UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category_rule WHERE id = ?1 AND user_id = ?2",
        (rule_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Record that a rule categorized a transaction.
///
/// The increment is a single statement so concurrent imports cannot lose updates.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn increment_match_count(rule_id: RuleId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE category_rule SET match_count = match_count + 1 WHERE id = ?1",
        [rule_id],
    )?;

    Ok(())
}

pub fn create_rule_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category_rule (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pattern TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                confidence REAL NOT NULL DEFAULT 0,
                match_count INTEGER NOT NULL DEFAULT 0,
                user_id TEXT NOT NULL,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
            );",
        (),
    )?;

    // Create index for foreign key to improve query performance
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_rule_category_id ON category_rule(category_id)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_rule_user_id ON category_rule(user_id)",
        (),
    )?;

    Ok(())
}

fn validate_pattern(pattern: &str) -> Result<&str, Error> {
    let pattern = pattern.trim();

    if pattern.is_empty() {
        Err(Error::EmptyPattern)
    } else {
        Ok(pattern)
    }
}

fn map_rule_with_category_row(row: &Row) -> Result<RuleWithCategory, rusqlite::Error> {
    let raw_user_id: String = row.get(5)?;

    let rule = Rule {
        id: row.get(0)?,
        pattern: row.get(1)?,
        category_id: row.get(2)?,
        confidence: row.get(3)?,
        match_count: row.get(4)?,
        user_id: UserID::new(&raw_user_id),
    };
    let category = map_category_row_with_offset(row, 6)?;

    Ok(RuleWithCategory { rule, category })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{
        Error, TransactionType, UserID,
        category::{Category, CategoryName, create_category},
        db::initialize,
        rule::{create_rule, get_all_rules},
        test_utils::{create_test_user, other_test_user},
    };

    use super::{delete_rule, get_rule, increment_match_count, update_rule};

    fn get_test_db_connection() -> (Connection, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        let user_id = create_test_user(&connection);
        (connection, user_id)
    }

    fn must_create_category(
        name: &str,
        category_type: TransactionType,
        user_id: &UserID,
        connection: &Connection,
    ) -> Category {
        create_category(
            CategoryName::new_unchecked(name),
            category_type,
            "#000000",
            user_id,
            connection,
        )
        .expect("Could not create test category")
    }

    #[test]
    fn create_rule_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("Groceries", TransactionType::Expense, &user_id, &connection);

        let rule = create_rule("store", category.id, 0.5, &user_id, &connection);

        let got_rule = rule.expect("Could not create rule");
        assert!(got_rule.id > 0);
        assert_eq!(got_rule.pattern, "store");
        assert_eq!(got_rule.category_id, category.id);
        assert_eq!(got_rule.match_count, 0);
    }

    #[test]
    fn create_rule_with_blank_pattern_fails() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("Groceries", TransactionType::Expense, &user_id, &connection);

        let rule = create_rule("   ", category.id, 0.0, &user_id, &connection);

        assert_eq!(rule, Err(Error::EmptyPattern));
    }

    #[test]
    fn create_rule_for_other_users_category_fails() {
        let (connection, user_id) = get_test_db_connection();
        let other_user_id = other_test_user(&connection);
        let category =
            must_create_category("Groceries", TransactionType::Expense, &other_user_id, &connection);

        let rule = create_rule("store", category.id, 0.0, &user_id, &connection);

        assert_eq!(rule, Err(Error::InvalidCategory(category.id)));
    }

    #[test]
    fn get_rule_of_other_user_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();
        let other_user_id = other_test_user(&connection);
        let category = must_create_category("Food", TransactionType::Expense, &user_id, &connection);
        let rule = create_rule("restaurant", category.id, 0.0, &user_id, &connection).unwrap();

        assert_eq!(
            get_rule(rule.id, &user_id, &connection).map(|found| found.rule),
            Ok(rule.clone())
        );
        assert_eq!(
            get_rule(rule.id, &other_user_id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn rules_are_ordered_by_confidence_then_match_count() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("Food", TransactionType::Expense, &user_id, &connection);
        let low = create_rule("a", category.id, 0.1, &user_id, &connection).unwrap();
        let high = create_rule("b", category.id, 0.9, &user_id, &connection).unwrap();
        let popular = create_rule("c", category.id, 0.1, &user_id, &connection).unwrap();
        increment_match_count(popular.id, &connection).unwrap();

        let ids: Vec<_> = get_all_rules(&user_id, &connection)
            .unwrap()
            .into_iter()
            .map(|found| found.rule.id)
            .collect();

        assert_eq!(ids, vec![high.id, popular.id, low.id]);
    }

    #[test]
    fn update_rule_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let original = must_create_category("Original", TransactionType::Expense, &user_id, &connection);
        let updated = must_create_category("Updated", TransactionType::Expense, &user_id, &connection);
        let mut rule = create_rule("old pattern", original.id, 0.0, &user_id, &connection).unwrap();

        rule.pattern = "new pattern".to_owned();
        rule.category_id = updated.id;
        rule.confidence = 0.75;
        let result = update_rule(&rule, &connection);

        assert!(result.is_ok());
        let got = get_rule(rule.id, &user_id, &connection).unwrap();
        assert_eq!(got.rule, rule);
        assert_eq!(got.category, updated);
    }

    #[test]
    fn update_missing_rule_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("Test", TransactionType::Expense, &user_id, &connection);
        let mut rule = create_rule("pattern", category.id, 0.0, &user_id, &connection).unwrap();
        rule.id = 999999;

        assert_eq!(update_rule(&rule, &connection), Err(Error::NotFound));
    }

    #[test]
    fn delete_rule_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("ToDelete", TransactionType::Expense, &user_id, &connection);
        let rule = create_rule("delete me", category.id, 0.0, &user_id, &connection).unwrap();

        let result = delete_rule(rule.id, &user_id, &connection);

        assert!(result.is_ok());
        assert_eq!(get_rule(rule.id, &user_id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn delete_missing_rule_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();

        assert_eq!(delete_rule(999999, &user_id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn increment_match_count_adds_one() {
        let (connection, user_id) = get_test_db_connection();
        let category = must_create_category("Food", TransactionType::Expense, &user_id, &connection);
        let rule = create_rule("cafe", category.id, 0.0, &user_id, &connection).unwrap();

        increment_match_count(rule.id, &connection).unwrap();
        increment_match_count(rule.id, &connection).unwrap();

        let got = get_rule(rule.id, &user_id, &connection).unwrap();
        assert_eq!(got.rule.match_count, 2);
    }
}
