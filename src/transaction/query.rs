//! Filtered, paginated listing of a user's transactions.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, TransactionType, UserID,
    category::CategoryId,
    transaction::core::{
        SELECT_TRANSACTION_WITH_CATEGORY, TransactionWithCategory,
        map_transaction_with_category_row,
    },
};

/// The number of transactions returned when the caller does not ask for a page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Filters and pagination for listing transactions.
///
/// Every filter is optional, a missing filter matches everything.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub category_id: Option<CategoryId>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Inclusive lower bound on the transaction date.
    #[serde(default, with = "crate::date::iso_date::option")]
    pub start_date: Option<Date>,
    /// Inclusive upper bound on the transaction date.
    #[serde(default, with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One page of transactions and the number of transactions matching the filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionWithCategory>,
    pub total: i64,
}

const FILTER_CLAUSE: &str = "WHERE t.user_id = :user_id
       AND (:category_id IS NULL OR t.category_id = :category_id)
       AND (:type IS NULL OR t.type = :type)
       AND (:start_date IS NULL OR t.date >= :start_date)
       AND (:end_date IS NULL OR t.date <= :end_date)";

/// Get the user's transactions matching `query`, newest first.
///
/// Transactions on the same date are ordered by descending ID so that pages are stable.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails or a row cannot be mapped.
pub fn query_transactions(
    query: &TransactionQuery,
    user_id: &UserID,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = query.offset.unwrap_or_default();

    let transactions = connection
        .prepare(&format!(
            "{SELECT_TRANSACTION_WITH_CATEGORY}
             {FILTER_CLAUSE}
             ORDER BY t.date DESC, t.id DESC
             LIMIT :limit OFFSET :offset"
        ))?
        .query_map(
            rusqlite::named_params! {
                ":user_id": user_id,
                ":category_id": query.category_id,
                ":type": query.transaction_type,
                ":start_date": query.start_date,
                ":end_date": query.end_date,
                ":limit": limit,
                ":offset": offset,
            },
            map_transaction_with_category_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, Error>>()?;

    let total: i64 = connection
        .prepare(&format!("SELECT COUNT(*) FROM \"transaction\" t {FILTER_CLAUSE}"))?
        .query_row(
            rusqlite::named_params! {
                ":user_id": user_id,
                ":category_id": query.category_id,
                ":type": query.transaction_type,
                ":start_date": query.start_date,
                ":end_date": query.end_date,
            },
            |row| row.get(0),
        )?;

    Ok(TransactionPage {
        transactions,
        total,
    })
}

/// Get all of the user's transactions dated from `start_date` to `end_date` inclusive, oldest
/// first. A missing bound leaves that side of the range open.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails or a row cannot be mapped.
pub fn get_transactions_in_range(
    start_date: Option<Date>,
    end_date: Option<Date>,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Vec<TransactionWithCategory>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_TRANSACTION_WITH_CATEGORY}
             {FILTER_CLAUSE}
             ORDER BY t.date ASC, t.id ASC"
        ))?
        .query_map(
            rusqlite::named_params! {
                ":user_id": user_id,
                ":category_id": None::<CategoryId>,
                ":type": None::<TransactionType>,
                ":start_date": start_date,
                ":end_date": end_date,
            },
            map_transaction_with_category_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Money, TransactionType, UserID,
        category::{Category, CategoryName, create_category},
        db::initialize,
        test_utils::{create_test_user, other_test_user},
        transaction::{Transaction, create_transaction},
    };

    use super::{TransactionQuery, get_transactions_in_range, query_transactions};

    fn get_test_connection() -> (Connection, UserID, Category, Category) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user_id = create_test_user(&conn);
        let food = create_category(
            CategoryName::new_unchecked("Food"),
            TransactionType::Expense,
            "#000000",
            &user_id,
            &conn,
        )
        .unwrap();
        let salary = create_category(
            CategoryName::new_unchecked("Salary"),
            TransactionType::Income,
            "#FFFFFF",
            &user_id,
            &conn,
        )
        .unwrap();

        let fixtures = [
            (date!(2025 - 01 - 01), TransactionType::Expense, food.id, 100),
            (date!(2025 - 01 - 15), TransactionType::Income, salary.id, 5000),
            (date!(2025 - 02 - 01), TransactionType::Expense, food.id, 250),
            (date!(2025 - 02 - 01), TransactionType::Expense, food.id, 300),
        ];

        for (date, transaction_type, category_id, cents) in fixtures {
            create_transaction(
                Transaction::build(
                    Money::new(Decimal::new(cents, 2)),
                    transaction_type,
                    date,
                    "",
                    category_id,
                ),
                &user_id,
                &conn,
            )
            .unwrap();
        }

        (conn, user_id, food, salary)
    }

    #[test]
    fn returns_newest_first_with_stable_order() {
        let (conn, user_id, _, _) = get_test_connection();

        let page = query_transactions(&TransactionQuery::default(), &user_id, &conn).unwrap();

        assert_eq!(page.total, 4);
        let ids: Vec<_> = page
            .transactions
            .iter()
            .map(|transaction| transaction.transaction.id)
            .collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn filters_by_type_and_category() {
        let (conn, user_id, food, salary) = get_test_connection();

        let income = query_transactions(
            &TransactionQuery {
                transaction_type: Some(TransactionType::Income),
                ..Default::default()
            },
            &user_id,
            &conn,
        )
        .unwrap();
        let food_page = query_transactions(
            &TransactionQuery {
                category_id: Some(food.id),
                ..Default::default()
            },
            &user_id,
            &conn,
        )
        .unwrap();

        assert_eq!(income.total, 1);
        assert_eq!(income.transactions[0].category, salary);
        assert_eq!(food_page.total, 3);
    }

    #[test]
    fn filters_by_inclusive_date_range() {
        let (conn, user_id, _, _) = get_test_connection();

        let page = query_transactions(
            &TransactionQuery {
                start_date: Some(date!(2025 - 01 - 15)),
                end_date: Some(date!(2025 - 02 - 01)),
                ..Default::default()
            },
            &user_id,
            &conn,
        )
        .unwrap();

        assert_eq!(page.total, 3);
    }

    #[test]
    fn paginates_but_counts_all_matches() {
        let (conn, user_id, _, _) = get_test_connection();

        let page = query_transactions(
            &TransactionQuery {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            },
            &user_id,
            &conn,
        )
        .unwrap();

        assert_eq!(page.total, 4);
        assert_eq!(page.transactions.len(), 2);
        assert_eq!(page.transactions[0].transaction.id, 3);
    }

    #[test]
    fn does_not_return_other_users_transactions() {
        let (conn, _, _, _) = get_test_connection();
        let other_user_id = other_test_user(&conn);

        let page = query_transactions(&TransactionQuery::default(), &other_user_id, &conn).unwrap();

        assert_eq!(page.total, 0);
        assert!(page.transactions.is_empty());
    }

    #[test]
    fn range_returns_every_match_oldest_first() {
        let (conn, user_id, _, _) = get_test_connection();

        let open_ended =
            get_transactions_in_range(Some(date!(2025 - 01 - 15)), None, &user_id, &conn).unwrap();
        let everything = get_transactions_in_range(None, None, &user_id, &conn).unwrap();

        let ids: Vec<_> = open_ended
            .iter()
            .map(|transaction| transaction.transaction.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(everything.len(), 4);
    }
}
