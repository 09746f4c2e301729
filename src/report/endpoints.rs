use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, UserID,
    date::end_of_month,
    extract::QueryParams,
    report::aggregation::{
        CategoryTotal, MonthlyTotal, Summary, monthly_totals, summarize, totals_by_category,
        trend_months,
    },
    timezone::local_today,
    transaction::get_transactions_in_range,
};

/// The state needed for building reports.
#[derive(Debug, Clone)]
pub struct ReportState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides which month is the current month.
    pub local_timezone: String,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The optional, inclusive report window.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default, with = "crate::date::iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "crate::date::iso_date::option")]
    pub end_date: Option<Date>,
}

/// The response of the reports endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: Summary,
    pub categories_data: Vec<CategoryTotal>,
    pub monthly_data: Vec<MonthlyTotal>,
}

/// Route handler for the income and expense report.
///
/// The summary and category totals cover the requested window, or all time if no window is
/// given. The monthly trend always covers the six months up to and including the current month.
pub async fn get_report_endpoint(
    State(state): State<ReportState>,
    Extension(user_id): Extension<UserID>,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<Report>, Error> {
    if let (Some(start_date), Some(end_date)) = (query.start_date, query.end_date) {
        if end_date < start_date {
            return Err(Error::InvalidDateRange(format!(
                "the end date {end_date} is before the start date {start_date}"
            )));
        }
    }

    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let report = build_report(&query, today, &user_id, &connection)?;

    Ok(Json(report))
}

fn build_report(
    query: &ReportQuery,
    today: Date,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Report, Error> {
    let window_transactions =
        get_transactions_in_range(query.start_date, query.end_date, user_id, connection)?;

    let months = trend_months(today);
    let trend_transactions = get_transactions_in_range(
        months.first().copied(),
        Some(end_of_month(today)),
        user_id,
        connection,
    )?;

    Ok(Report {
        summary: summarize(&window_transactions)?,
        categories_data: totals_by_category(&window_transactions)?,
        monthly_data: monthly_totals(&months, &trend_transactions)?,
    })
}
