//! Parses CSV statements exported from ANZ bank accounts.
//!
//! ANZ statements have the columns
//! `Type,Details,Particulars,Code,Reference,Amount,Date,ForeignCurrencyAmount,ConversionCharge`
//! with a single header row.

use std::{fmt, str::FromStr, sync::OnceLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, Month};

use crate::{Error, Money, TransactionType, date::parse_date, money::MAX_AMOUNT};

/// The import source recorded against transactions imported from ANZ statements.
pub const ANZ_IMPORT_SOURCE: &str = "anz-csv";

/// The description used when a row has no text in any of the description columns.
const UNKNOWN_DESCRIPTION: &str = "Unknown Transaction";

/// The number of characters of the description used in the import ID.
const IMPORT_ID_DESCRIPTION_LENGTH: usize = 20;

const MIN_FIELD_COUNT: usize = 7;

// Column indices
const TYPE: usize = 0;
const DETAILS: usize = 1;
const PARTICULARS: usize = 2;
const CODE: usize = 3;
const AMOUNT: usize = 5;
const DATE: usize = 6;

/// A transaction read from one row of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub date: Date,
    /// The positive amount of the transaction.
    pub amount: Money,
    pub description: String,
    pub transaction_type: TransactionType,
    /// Identifies the row so that importing the same statement twice does not create duplicates.
    pub import_id: String,
}

/// Why a row of a statement was not turned into a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum SkipReason {
    TooFewFields,
    InvalidDate,
    InvalidAmount,
    ZeroAmount,
    AmountTooLarge,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::TooFewFields => "too few fields",
            SkipReason::InvalidDate => "invalid date",
            SkipReason::InvalidAmount => "invalid amount",
            SkipReason::ZeroAmount => "zero amount",
            SkipReason::AmountTooLarge => "amount too large",
        };

        f.write_str(reason)
    }
}

impl From<SkipReason> for String {
    fn from(reason: SkipReason) -> Self {
        reason.to_string()
    }
}

/// A row that was skipped, identified by its 1-based line number in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: SkipReason,
}

/// The result of parsing a statement.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    pub transactions: Vec<ParsedTransaction>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse an ANZ CSV statement.
///
/// Lines are trimmed and blank lines are ignored. The first remaining line is the header and
/// is skipped. Rows that cannot be turned into a transaction are reported in
/// [ParsedStatement::skipped] rather than failing the whole statement.
///
/// # Errors
/// Returns an [Error::EmptyCSV] if `text` has no non-blank lines.
pub fn parse_anz_csv(text: &str) -> Result<ParsedStatement, Error> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    if lines.next().is_none() {
        return Err(Error::EmptyCSV);
    }

    let mut statement = ParsedStatement::default();

    for (line_number, line) in lines {
        match extract_transaction(&parse_csv_line(line)) {
            Ok(transaction) => statement.transactions.push(transaction),
            Err(reason) => {
                tracing::debug!("skipping line {line_number} of ANZ statement: {reason}");
                statement.skipped.push(SkippedRow {
                    line: line_number,
                    reason,
                });
            }
        }
    }

    Ok(statement)
}

/// Split a line of CSV into trimmed fields.
///
/// Commas inside double quotes do not split fields. The quotes themselves are dropped, and
/// there is no escape for a literal quote.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_owned());
                current.clear();
            }
            c => current.push(c),
        }
    }

    fields.push(current.trim().to_owned());

    fields
}

/// Read a date written as DD/MM/YYYY, DD-MM-YYYY or YYYY-MM-DD.
///
/// Anything else is read as an ISO 8601 date or RFC 3339 timestamp. Returns `None` if the
/// text is not a date or names a day that does not exist, e.g. 31/02/2024.
pub fn normalize_date(text: &str) -> Option<Date> {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"^(\d{1,2})/(\d{1,2})/(\d{4})$",
            r"^(\d{1,2})-(\d{1,2})-(\d{4})$",
            r"^(\d{4})-(\d{1,2})-(\d{1,2})$",
        ]
        .map(|pattern| Regex::new(pattern).expect("date patterns are valid regexes"))
    });

    for pattern in patterns {
        let Some(captures) = pattern.captures(text) else {
            continue;
        };

        let (first, second, third) = (&captures[1], &captures[2], &captures[3]);
        let (year, month, day) = if first.len() == 4 {
            (first, second, third)
        } else {
            (third, second, first)
        };

        let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;

        return Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok();
    }

    parse_date(text).ok()
}

/// Turn the fields of one row into a transaction.
///
/// The description is the first non-empty field of Code, Particulars, Details and Type.
/// Negative amounts are expenses and positive amounts are income, the amount is always
/// stored as a positive number.
pub fn extract_transaction(fields: &[String]) -> Result<ParsedTransaction, SkipReason> {
    if fields.len() < MIN_FIELD_COUNT {
        return Err(SkipReason::TooFewFields);
    }

    let raw_date = &fields[DATE];
    let date = normalize_date(raw_date).ok_or(SkipReason::InvalidDate)?;

    let description = [CODE, PARTICULARS, DETAILS, TYPE]
        .into_iter()
        .map(|index| fields[index].as_str())
        .find(|field| !field.is_empty())
        .unwrap_or(UNKNOWN_DESCRIPTION)
        .to_owned();

    let amount = parse_amount(&fields[AMOUNT]).ok_or(SkipReason::InvalidAmount)?;

    if amount.is_zero() {
        return Err(SkipReason::ZeroAmount);
    }

    let transaction_type = if amount.is_negative() {
        TransactionType::Expense
    } else {
        TransactionType::Income
    };
    let amount = amount.abs();

    if amount.as_decimal() > Decimal::from(MAX_AMOUNT) {
        return Err(SkipReason::AmountTooLarge);
    }

    Ok(ParsedTransaction {
        import_id: create_import_id(raw_date, amount, &description),
        date,
        amount,
        description,
        transaction_type,
    })
}

/// Read an amount, ignoring everything except digits, the minus sign and the decimal point.
fn parse_amount(text: &str) -> Option<Money> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();

    Decimal::from_str(&cleaned).ok().map(Money::new)
}

/// Build the import ID from the date as written in the file, the amount and the start of the
/// description, e.g. "anz-01/03/2024-4.5-COFFEE SHOP".
fn create_import_id(raw_date: &str, amount: Money, description: &str) -> String {
    let description_prefix: String = description
        .chars()
        .take(IMPORT_ID_DESCRIPTION_LENGTH)
        .collect();

    format!("anz-{raw_date}-{amount}-{description_prefix}")
}
