use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ExpenseStore, UserStore};
use crate::error::AppError;
use crate::models::{
    CategoryCount, CategoryTotal, DateRange, Expense, ExpensePatch, ExpenseQuery, MonthTotal,
    NewExpense, NewUser, PasswordHash, Totals, User, UserCredentials,
};

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";
const EXPENSE_COLUMNS: &str =
    "id, user_id, amount, category, description, date, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: Uuid,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    password_hash: String,
    refresh_token_hash: Option<String>,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        UserCredentials {
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: PasswordHash::from_hashed(row.password_hash),
            refresh_token_hash: row.refresh_token_hash,
        }
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending migrations from `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(new_user.password_hash.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {}, password_hash, refresh_token_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserCredentials::from))
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {}, password_hash, refresh_token_hash FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserCredentials::from))
    }

    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<String>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        new_hash: String,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token_hash = $3, updated_at = $4
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(expected)
        .bind(new_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ExpenseStore for PgStore {
    async fn create_expense(&self, user_id: Uuid, new: NewExpense) -> Result<Expense, AppError> {
        let now = Utc::now();
        let expense = sqlx::query_as::<_, Expense>(&format!(
            r#"
            INSERT INTO expenses (id, user_id, amount, category, description, date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(new.amount)
        .bind(&new.category)
        .bind(&new.description)
        .bind(new.date)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(expense)
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        query: &ExpenseQuery,
    ) -> Result<(Vec<Expense>, i64), AppError> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM expenses
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR category = $2)
            "#,
        )
        .bind(user_id)
        .bind(&query.category)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {} FROM expenses
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(user_id)
        .bind(&query.category)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn update_expense(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ExpensePatch,
    ) -> Result<Option<Expense>, AppError> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE expenses SET
                amount = COALESCE($3, amount),
                category = COALESCE($4, category),
                description = CASE WHEN $5 THEN $6 ELSE description END,
                date = COALESCE($7, date),
                updated_at = $8
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.amount)
        .bind(&patch.category)
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.date)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(expense)
    }

    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn totals(&self, user_id: Uuid, range: DateRange) -> Result<Totals, AppError> {
        let (total, count): (f64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION, COUNT(*)
            FROM expenses
            WHERE user_id = $1 AND date >= $2 AND date < $3
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(Totals { total, count })
    }

    async fn category_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<CategoryTotal>, AppError> {
        let rows = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT category, SUM(amount)::DOUBLE PRECISION AS total
            FROM expenses
            WHERE user_id = $1 AND date >= $2 AND date < $3
            GROUP BY category
            ORDER BY total DESC, category ASC
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn monthly_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<MonthTotal>, AppError> {
        let rows = sqlx::query_as::<_, MonthTotal>(
            r#"
            SELECT EXTRACT(MONTH FROM date AT TIME ZONE 'UTC')::INT AS month,
                   SUM(amount)::DOUBLE PRECISION AS total
            FROM expenses
            WHERE user_id = $1 AND date >= $2 AND date < $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn top_category(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Option<CategoryCount>, AppError> {
        let row = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category, COUNT(*) AS count
            FROM expenses
            WHERE user_id = $1 AND date >= $2 AND date < $3
            GROUP BY category
            ORDER BY 2 DESC, 1 ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
