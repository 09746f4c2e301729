//! Aggregation of transactions into report totals.

use std::collections::HashMap;

use serde::Serialize;
use time::Date;

use crate::{
    Error, Money, TransactionType,
    category::{Category, CategoryId},
    date::{add_months, end_of_month, start_of_month},
    transaction::{Transaction, TransactionWithCategory},
};

/// The number of months in the monthly trend, including the current month.
pub const TREND_MONTHS: i32 = 6;

/// Income and expense totals over the report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: Money,
    pub total_expenses: Money,
    /// Income minus expenses, negative when more was spent than earned.
    pub net_income: Money,
}

/// The total of the transactions in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub total: Money,
}

/// Income and expense totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    /// The first day of the month.
    #[serde(with = "crate::date::iso_date")]
    pub month: Date,
    pub income: Money,
    pub expenses: Money,
    pub net: Money,
}

fn sum_by_type<'a>(
    mut transactions: impl Iterator<Item = &'a Transaction>,
) -> Result<(Money, Money), Error> {
    transactions.try_fold(
        (Money::ZERO, Money::ZERO),
        |(income, expenses), transaction| -> Result<(Money, Money), Error> {
            match transaction.transaction_type {
                TransactionType::Income => Ok((income.checked_add(transaction.amount)?, expenses)),
                TransactionType::Expense => {
                    Ok((income, expenses.checked_add(transaction.amount)?))
                }
            }
        },
    )
}

/// Total the income and expenses in `transactions`.
///
/// # Errors
/// Returns an [Error::AmountOverflow] if a total cannot be represented.
pub(super) fn summarize(transactions: &[TransactionWithCategory]) -> Result<Summary, Error> {
    let (total_income, total_expenses) =
        sum_by_type(transactions.iter().map(|item| &item.transaction))?;

    Ok(Summary {
        total_income,
        total_expenses,
        net_income: total_income.checked_sub(total_expenses)?,
    })
}

/// Total `transactions` per category and type, largest total first.
///
/// Categories with equal totals are ordered by name.
pub(super) fn totals_by_category(
    transactions: &[TransactionWithCategory],
) -> Result<Vec<CategoryTotal>, Error> {
    let mut totals: HashMap<(CategoryId, TransactionType), CategoryTotal> = HashMap::new();

    for item in transactions {
        let transaction_type = item.transaction.transaction_type;

        let entry = totals
            .entry((item.category.id, transaction_type))
            .or_insert_with(|| CategoryTotal {
                category: item.category.clone(),
                transaction_type,
                total: Money::ZERO,
            });
        entry.total = entry.total.checked_add(item.transaction.amount)?;
    }

    let mut totals: Vec<_> = totals.into_values().collect();
    totals.sort_by(|left, right| {
        right
            .total
            .cmp(&left.total)
            .then_with(|| left.category.name.as_ref().cmp(right.category.name.as_ref()))
            .then_with(|| left.transaction_type.cmp(&right.transaction_type))
    });

    Ok(totals)
}

/// The first day of each month in the trend, oldest first, ending with the month of `today`.
pub(super) fn trend_months(today: Date) -> Vec<Date> {
    let current_month = start_of_month(today);

    (0..TREND_MONTHS)
        .rev()
        .filter_map(|months_ago| add_months(current_month, -months_ago))
        .collect()
}

/// Total the income and expenses in `transactions` for each month in `months`.
///
/// Transactions outside of `months` are ignored.
pub(super) fn monthly_totals(
    months: &[Date],
    transactions: &[TransactionWithCategory],
) -> Result<Vec<MonthlyTotal>, Error> {
    months
        .iter()
        .map(|&month| -> Result<MonthlyTotal, Error> {
            let month_end = end_of_month(month);
            let (income, expenses) = sum_by_type(
                transactions
                    .iter()
                    .map(|item| &item.transaction)
                    .filter(|transaction| transaction.date >= month && transaction.date <= month_end),
            )?;

            Ok(MonthlyTotal {
                month,
                income,
                expenses,
                net: income.checked_sub(expenses)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::{Date, macros::date};

    use crate::{
        Error, Money, TransactionType, UserID,
        category::{Category, CategoryName},
        transaction::{Transaction, TransactionWithCategory},
    };

    use super::{monthly_totals, summarize, totals_by_category, trend_months};

    fn category(id: i64, name: &str, category_type: TransactionType) -> Category {
        Category {
            id,
            name: CategoryName::new_unchecked(name),
            category_type,
            color: "#000000".to_owned(),
            user_id: UserID::new("test-user"),
        }
    }

    fn transaction(
        id: i64,
        date: Date,
        amount: i64,
        category: &Category,
    ) -> TransactionWithCategory {
        TransactionWithCategory {
            transaction: Transaction {
                id,
                amount: Money::new(Decimal::from(amount)),
                transaction_type: category.category_type,
                description: String::new(),
                date,
                category_id: category.id,
                user_id: category.user_id.clone(),
                recurring_transaction_id: None,
                import_source: None,
                import_id: None,
                original_description: None,
            },
            category: category.clone(),
        }
    }

    fn money(amount: i64) -> Money {
        Money::new(Decimal::from(amount))
    }

    fn fixtures() -> Vec<TransactionWithCategory> {
        let salary = category(1, "Salary", TransactionType::Income);
        let food = category(2, "Food", TransactionType::Expense);
        let rent = category(3, "Rent", TransactionType::Expense);

        vec![
            transaction(1, date!(2024 - 01 - 31), 3000, &salary),
            transaction(2, date!(2024 - 02 - 01), 120, &food),
            transaction(3, date!(2024 - 02 - 14), 80, &food),
            transaction(4, date!(2024 - 02 - 15), 1500, &rent),
            transaction(5, date!(2024 - 02 - 29), 3000, &salary),
        ]
    }

    #[test]
    fn summary_nets_income_against_expenses() {
        let summary = summarize(&fixtures()).unwrap();

        assert_eq!(summary.total_income, money(6000));
        assert_eq!(summary.total_expenses, money(1700));
        assert_eq!(summary.net_income, money(4300));
    }

    #[test]
    fn summary_can_be_negative() {
        let rent = category(3, "Rent", TransactionType::Expense);

        let summary = summarize(&[transaction(1, date!(2024 - 02 - 15), 1500, &rent)]).unwrap();

        assert_eq!(summary.net_income, money(-1500));
        assert!(summary.net_income.is_negative());
    }

    #[test]
    fn empty_report_is_all_zero() {
        let summary = summarize(&[]).unwrap();

        assert_eq!(summary.total_income, Money::ZERO);
        assert_eq!(summary.net_income, Money::ZERO);
        assert!(totals_by_category(&[]).unwrap().is_empty());
    }

    #[test]
    fn category_totals_are_grouped_and_sorted() {
        let totals = totals_by_category(&fixtures()).unwrap();

        let got: Vec<_> = totals
            .iter()
            .map(|total| (total.category.name.as_ref().to_owned(), total.total))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Salary".to_owned(), money(6000)),
                ("Rent".to_owned(), money(1500)),
                ("Food".to_owned(), money(200)),
            ]
        );
        assert_eq!(totals[0].transaction_type, TransactionType::Income);
    }

    #[test]
    fn trend_covers_six_months_ending_this_month() {
        let months = trend_months(date!(2024 - 03 - 31));

        assert_eq!(
            months,
            vec![
                date!(2023 - 10 - 01),
                date!(2023 - 11 - 01),
                date!(2023 - 12 - 01),
                date!(2024 - 01 - 01),
                date!(2024 - 02 - 01),
                date!(2024 - 03 - 01),
            ]
        );
    }

    #[test]
    fn monthly_totals_use_calendar_months() {
        let months = trend_months(date!(2024 - 03 - 10));

        let totals = monthly_totals(&months, &fixtures()).unwrap();

        assert_eq!(totals.len(), 6);
        let january = &totals[3];
        assert_eq!(january.month, date!(2024 - 01 - 01));
        assert_eq!(january.income, money(3000));
        assert_eq!(january.expenses, Money::ZERO);
        let february = &totals[4];
        assert_eq!(february.income, money(3000));
        assert_eq!(february.expenses, money(1700));
        assert_eq!(february.net, money(1300));
        let march = &totals[5];
        assert_eq!(march.net, Money::ZERO);
    }

    #[test]
    fn totals_that_do_not_fit_are_errors() {
        let salary = category(1, "Salary", TransactionType::Income);
        let mut huge = transaction(1, date!(2024 - 02 - 01), 0, &salary);
        huge.transaction.amount = Money::new(Decimal::MAX);
        let transactions = vec![huge.clone(), huge];

        assert_eq!(summarize(&transactions), Err(Error::AmountOverflow("add up")));
        assert_eq!(
            totals_by_category(&transactions),
            Err(Error::AmountOverflow("add up"))
        );
        assert_eq!(
            monthly_totals(&trend_months(date!(2024 - 02 - 10)), &transactions),
            Err(Error::AmountOverflow("add up"))
        );
    }
}
