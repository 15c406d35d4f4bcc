/// Expense CRUD routes
///
/// Everything here sits behind the auth gate and is scoped to the caller. An
/// expense owned by somebody else answers exactly like a missing one.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, ErrorContext, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::models::{Expense, ExpensePatch, ExpenseQuery, NewExpense};
use crate::store::ExpenseStore;
use crate::validators::{
    is_valid_amount, is_valid_category, is_valid_description, is_valid_limit, is_valid_page,
    parse_date,
};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePage {
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub data: Vec<Expense>,
}

impl ExpensePage {
    fn new(data: Vec<Expense>, total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            total_pages: if total > 0 { (total - 1) / limit + 1 } else { 0 },
            has_next_page: page.saturating_mul(limit) < total,
            has_prev_page: page > 1,
            data,
        }
    }
}

/// POST /api/expenses
///
/// # Errors
/// - 400: amount or category missing or invalid, description too long,
///   unparseable date
pub async fn create_expense(
    user: web::ReqData<AuthenticatedUser>,
    body: web::Json<CreateExpenseRequest>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.id;
    let body = body.into_inner();

    let amount = body
        .amount
        .ok_or_else(|| ValidationError::EmptyField("amount".into()))
        .and_then(is_valid_amount)?;
    let category = is_valid_category(body.category.as_deref().unwrap_or_default())?;
    let description = match body.description.as_deref() {
        Some(d) => is_valid_description(d)?,
        None => None,
    };
    let date = match body.date.as_deref() {
        Some(d) => parse_date("date", d)?,
        None => Utc::now(),
    };

    let expense = expenses
        .create_expense(
            user_id,
            NewExpense {
                amount,
                category,
                description,
                date,
            },
        )
        .await
        .map_err(|e| {
            ErrorContext::new("expense_create")
                .with_user_id(user_id)
                .log_error(&e);
            e
        })?;

    tracing::info!(user_id = %user_id, expense_id = %expense.id, "Expense created");
    Ok(HttpResponse::Created().json(expense))
}

/// GET /api/expenses?page=&limit=&category=
///
/// Newest first.
pub async fn list_expenses(
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<ListQuery>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = is_valid_page(query.page.unwrap_or(DEFAULT_PAGE))?;
    let limit = is_valid_limit(query.limit.unwrap_or(DEFAULT_LIMIT))?;
    // Far-out pages are empty, but the offset itself must fit in an i64.
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ValidationError::OutOfRange("page".into()))?;
    let category = query
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let (data, total) = expenses
        .list_expenses(
            user.0.id,
            &ExpenseQuery {
                category,
                offset,
                limit,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(ExpensePage::new(data, total, page, limit)))
}

/// PUT /api/expenses/{id}
///
/// Only the supplied fields change. A blank description clears it.
///
/// # Errors
/// - 400: no field supplied, or a supplied field is invalid
/// - 404: no such expense for this user
pub async fn update_expense(
    user: web::ReqData<AuthenticatedUser>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateExpenseRequest>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.id;
    let expense_id = path.into_inner();
    let body = body.into_inner();

    let patch = ExpensePatch {
        amount: body.amount.map(is_valid_amount).transpose()?,
        category: body.category.as_deref().map(is_valid_category).transpose()?,
        description: body
            .description
            .as_deref()
            .map(is_valid_description)
            .transpose()?,
        date: body
            .date
            .as_deref()
            .map(|d| parse_date("date", d))
            .transpose()?,
    };
    if patch.is_empty() {
        let fields = "amount, category, description or date";
        return Err(ValidationError::EmptyField(fields.into()).into());
    }

    let updated = expenses
        .update_expense(user_id, expense_id, &patch)
        .await?
        .ok_or_else(|| AppError::not_found("Expense"))?;

    tracing::info!(user_id = %user_id, expense_id = %expense_id, "Expense updated");
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/expenses/{id}
///
/// # Errors
/// - 404: no such expense for this user
pub async fn delete_expense(
    user: web::ReqData<AuthenticatedUser>,
    path: web::Path<Uuid>,
    expenses: web::Data<dyn ExpenseStore>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.id;
    let expense_id = path.into_inner();

    if !expenses.delete_expense(user_id, expense_id).await? {
        return Err(AppError::not_found("Expense"));
    }

    tracing::info!(user_id = %user_id, expense_id = %expense_id, "Expense deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Expense deleted successfully" })))
}
