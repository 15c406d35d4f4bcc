use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub amount: Option<f64>,
    pub category: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.date.is_none()
    }

    pub fn apply(&self, expense: &mut Expense, now: DateTime<Utc>) {
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(category) = &self.category {
            expense.category = category.clone();
        }
        if let Some(description) = &self.description {
            expense.description = description.clone();
        }
        if let Some(date) = self.date {
            expense.date = date;
        }
        expense.updated_at = now;
    }
}

/// One page of a user's expenses, newest first.
#[derive(Debug, Clone)]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

/// Half-open `[start, end)` window in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn month(year: i32, month: u32) -> Result<Self, ValidationError> {
        let start = first_of_month(year, month)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let end = first_of_month(next_year, next_month)?;
        Ok(Self { start, end })
    }

    pub fn year(year: i32) -> Result<Self, ValidationError> {
        Ok(Self {
            start: first_of_month(year, 1)?,
            end: first_of_month(year + 1, 1)?,
        })
    }

    /// Covers whole days: from `start` 00:00 through the end of `end`.
    pub fn days(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::OutOfRange("start".into()));
        }
        let start = midnight(start);
        let end = midnight(end) + Duration::days(1);
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Number of calendar days covered.
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

fn first_of_month(year: i32, month: u32) -> Result<DateTime<Utc>, ValidationError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(midnight)
        .ok_or_else(|| ValidationError::OutOfRange("month".into()))
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MonthTotal {
    pub month: i32,
    pub total: f64,
}

/// Month number (1-12) of a timestamp in UTC
pub fn month_of(at: DateTime<Utc>) -> i32 {
    at.month() as i32
}
