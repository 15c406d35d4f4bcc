use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{ExpenseStore, UserStore};
use crate::error::{AppError, DatabaseError};
use crate::models::{
    month_of, CategoryCount, CategoryTotal, DateRange, Expense, ExpensePatch, ExpenseQuery,
    MonthTotal, NewExpense, NewUser, PasswordHash, Totals, User, UserCredentials,
};

struct UserRecord {
    user: User,
    password_hash: PasswordHash,
    refresh_token_hash: Option<String>,
}

impl UserRecord {
    fn credentials(&self) -> UserCredentials {
        UserCredentials {
            user: self.user.clone(),
            password_hash: self.password_hash.clone(),
            refresh_token_hash: self.refresh_token_hash.clone(),
        }
    }
}

/// In-process store behind the same traits as `PgStore`
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    expenses: RwLock<HashMap<Uuid, Expense>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, UserRecord>>, AppError> {
        self.users.read().map_err(|_| poisoned())
    }

    fn users_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, UserRecord>>, AppError> {
        self.users.write().map_err(|_| poisoned())
    }

    fn expenses(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, Expense>>, AppError> {
        self.expenses.read().map_err(|_| poisoned())
    }

    fn expenses_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, Expense>>, AppError> {
        self.expenses.write().map_err(|_| poisoned())
    }

    fn owned_in_range(&self, user_id: Uuid, range: DateRange) -> Result<Vec<Expense>, AppError> {
        Ok(self
            .expenses()?
            .values()
            .filter(|e| e.user_id == user_id && range.contains(e.date))
            .cloned()
            .collect())
    }
}

fn poisoned() -> AppError {
    AppError::Database(DatabaseError::UnexpectedError(
        "memory store lock poisoned".to_string(),
    ))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut users = self.users_mut()?;
        if users.values().any(|r| r.user.email == new_user.email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new_user.password_hash,
                refresh_token_hash: None,
            },
        );
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users()?.get(&id).map(|r| r.user.clone()))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        Ok(self
            .users()?
            .values()
            .find(|r| r.user.email == email)
            .map(UserRecord::credentials))
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<UserCredentials>, AppError> {
        Ok(self.users()?.get(&id).map(UserRecord::credentials))
    }

    async fn set_refresh_token_hash(
        &self,
        user_id: Uuid,
        hash: Option<String>,
    ) -> Result<(), AppError> {
        if let Some(record) = self.users_mut()?.get_mut(&user_id) {
            record.refresh_token_hash = hash;
            record.user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_refresh_token_hash(
        &self,
        user_id: Uuid,
        expected: &str,
        new_hash: String,
    ) -> Result<bool, AppError> {
        let mut users = self.users_mut()?;
        match users.get_mut(&user_id) {
            Some(record) if record.refresh_token_hash.as_deref() == Some(expected) => {
                record.refresh_token_hash = Some(new_hash);
                record.user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn create_expense(&self, user_id: Uuid, new: NewExpense) -> Result<Expense, AppError> {
        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id,
            amount: new.amount,
            category: new.category,
            description: new.description,
            date: new.date,
            created_at: now,
            updated_at: now,
        };
        self.expenses_mut()?.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        query: &ExpenseQuery,
    ) -> Result<(Vec<Expense>, i64), AppError> {
        let mut matching: Vec<Expense> = self
            .expenses()?
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| match &query.category {
                Some(category) => &e.category == category,
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_expense(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &ExpensePatch,
    ) -> Result<Option<Expense>, AppError> {
        let mut expenses = self.expenses_mut()?;
        match expenses.get_mut(&id) {
            Some(expense) if expense.user_id == user_id => {
                patch.apply(expense, Utc::now());
                Ok(Some(expense.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_expense(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut expenses = self.expenses_mut()?;
        let owned = expenses.get(&id).map(|e| e.user_id == user_id).unwrap_or(false);
        if owned {
            expenses.remove(&id);
        }
        Ok(owned)
    }

    async fn totals(&self, user_id: Uuid, range: DateRange) -> Result<Totals, AppError> {
        let rows = self.owned_in_range(user_id, range)?;
        Ok(Totals {
            total: rows.iter().map(|e| e.amount).sum(),
            count: rows.len() as i64,
        })
    }

    async fn category_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<CategoryTotal>, AppError> {
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for expense in self.owned_in_range(user_id, range)? {
            *sums.entry(expense.category).or_insert(0.0) += expense.amount;
        }
        let mut totals: Vec<CategoryTotal> = sums
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect();
        // BTreeMap order keeps ties alphabetical after the stable sort.
        totals.sort_by(|a, b| b.total.total_cmp(&a.total));
        Ok(totals)
    }

    async fn monthly_totals(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<MonthTotal>, AppError> {
        let mut sums: BTreeMap<i32, f64> = BTreeMap::new();
        for expense in self.owned_in_range(user_id, range)? {
            *sums.entry(month_of(expense.date)).or_insert(0.0) += expense.amount;
        }
        Ok(sums
            .into_iter()
            .map(|(month, total)| MonthTotal { month, total })
            .collect())
    }

    async fn top_category(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Option<CategoryCount>, AppError> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for expense in self.owned_in_range(user_id, range)? {
            *counts.entry(expense.category).or_insert(0) += 1;
        }
        let mut best: Option<CategoryCount> = None;
        for (category, count) in counts {
            if best.as_ref().map(|b| count > b.count).unwrap_or(true) {
                best = Some(CategoryCount { category, count });
            }
        }
        Ok(best)
    }
}
