/// Read-only expense reports
///
/// All windows are UTC. The yearly summary is served from `SummaryCache` for
/// a short while after it is computed; writes do not evict it.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::ExpiringCache;
use crate::error::{AppError, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::models::{DateRange, MonthTotal};
use crate::store::ExpenseStore;
use crate::validators::{is_valid_month, is_valid_year, parse_date};

/// Yearly summaries keyed by (user, year)
pub type SummaryCache = ExpiringCache<(Uuid, i32), Vec<MonthTotal>>;

#[derive(Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl MonthQuery {
    fn range(&self) -> Result<DateRange, ValidationError> {
        let month = self
            .month
            .ok_or_else(|| ValidationError::EmptyField("month".into()))
            .and_then(is_valid_month)?;
        let year = self
            .year
            .ok_or_else(|| ValidationError::EmptyField("year".into()))
            .and_then(is_valid_year)?;
        DateRange::month(year, month)
    }
}

#[derive(Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, ValidationError> {
        let start = parse_date("start", self.start.as_deref().unwrap_or_default())?;
        let end = parse_date("end", self.end.as_deref().unwrap_or_default())?;
        DateRange::days(start.date_naive(), end.date_naive())
    }
}

#[derive(Serialize)]
struct RangeTotal {
    total: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AverageDaily {
    total: f64,
    average_daily: f64,
}

#[derive(Serialize)]
struct TopCategory {
    category: Option<String>,
    count: i64,
}

/// GET /api/expenses/summary?month=&year=
pub async fn monthly_summary(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<MonthQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let totals = expenses.totals(user.0.id, query.range()?).await?;
    Ok(HttpResponse::Ok().json(totals))
}

/// GET /api/expenses/category-breakdown?month=&year=
pub async fn category_breakdown(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<MonthQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let breakdown = expenses.category_totals(user.0.id, query.range()?).await?;
    Ok(HttpResponse::Ok().json(breakdown))
}

/// GET /api/expenses/range-total?start=&end=
///
/// Both days are included in full.
pub async fn range_total(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<RangeQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let totals = expenses.totals(user.0.id, query.range()?).await?;
    Ok(HttpResponse::Ok().json(RangeTotal {
        total: totals.total,
    }))
}

/// GET /api/expenses/yearly-summary?year=
pub async fn yearly_summary(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<YearQuery>,
    expenses: web::Data<dyn ExpenseStore>,
    cache: web::Data<SummaryCache>,
) -> Result<HttpResponse, AppError> {
    let year = query
        .year
        .ok_or_else(|| ValidationError::EmptyField("year".into()))
        .and_then(is_valid_year)?;
    let key = (user.0.id, year);

    if let Some(months) = cache.get(&key) {
        tracing::debug!(user_id = %user.0.id, year, "Yearly summary served from cache");
        return Ok(HttpResponse::Ok().json(months));
    }

    let months = expenses
        .monthly_totals(user.0.id, DateRange::year(year)?)
        .await?;
    cache.insert(key, months.clone());
    Ok(HttpResponse::Ok().json(months))
}

/// GET /api/expenses/average-daily?month=&year=
///
/// Divides by the number of days in the month, not the days elapsed.
pub async fn average_daily(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<MonthQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let range = query.range()?;
    let totals = expenses.totals(user.0.id, range).await?;
    Ok(HttpResponse::Ok().json(AverageDaily {
        total: totals.total,
        average_daily: totals.total / range.day_count() as f64,
    }))
}

/// GET /api/expenses/top-category?month=&year=
///
/// Most frequent category, `{category: null, count: 0}` for an empty month.
pub async fn top_category(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<MonthQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let top = expenses.top_category(user.0.id, query.range()?).await?;
    let body = match top {
        Some(top) => TopCategory {
            category: Some(top.category),
            count: top.count,
        },
        None => TopCategory {
            category: None,
            count: 0,
        },
    };
    Ok(HttpResponse::Ok().json(body))
}
