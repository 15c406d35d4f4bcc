mod expense;
mod user;

pub use expense::{
    month_of, CategoryCount, CategoryTotal, DateRange, Expense, ExpensePatch, ExpenseQuery,
    MonthTotal, NewExpense, Totals,
};
pub use user::{NewUser, PasswordHash, PublicUser, User, UserCredentials};
