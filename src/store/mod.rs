/// Persistence seams
///
/// Handlers and the session manager only see these two traits. `PgStore`
/// backs them with PostgreSQL; `MemoryStore` keeps everything in process and
/// is what the integration tests run against.
///
/// Reads through `UserStore::find_by_*` never carry credentials. The password
/// column is written exactly once, by `create_user`, with a value that is
/// already a `PasswordHash`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CategoryCount, CategoryTotal, DateRange, Expense, ExpensePatch, ExpenseQuery, MonthTotal,
    NewExpense, NewUser, Totals, User, UserCredentials,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with a duplicate-entry error when the email is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError>;

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<UserCredentials>, AppError>;

    /// Unconditional overwrite of the stored refresh hash. `None` clears it.
    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<String>,
    ) -> Result<(), AppError>;

    /// Compare-and-set variant: writes `new_hash` only if the stored hash is
    /// still `expected`. Returns whether the write happened.
    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        new_hash: String,
    ) -> Result<bool, AppError>;
}

/// Every call is scoped by owner; a record belonging to someone else behaves
/// exactly like a missing one.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create_expense(&self, user_id: Uuid, new: NewExpense) -> Result<Expense, AppError>;

    /// Returns the requested page and the total number of matching rows.
    async fn list_expenses(
        &self,
        user_id: Uuid,
        query: &ExpenseQuery,
    ) -> Result<(Vec<Expense>, i64), AppError>;

    async fn update_expense(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ExpensePatch,
    ) -> Result<Option<Expense>, AppError>;

    /// Returns `false` when nothing owned by `user_id` matched.
    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn totals(&self, user_id: Uuid, range: DateRange) -> Result<Totals, AppError>;

    /// Sorted by total, largest first.
    async fn category_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<CategoryTotal>, AppError>;

    /// Only months with at least one expense, ascending.
    async fn monthly_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<MonthTotal>, AppError>;

    /// Category with the most expenses in the range, if any.
    async fn top_category(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Option<CategoryCount>, AppError>;
}
