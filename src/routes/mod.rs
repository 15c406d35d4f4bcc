mod auth;
mod expenses;
mod health_check;
mod reports;

pub use auth::{current_user, login, logout, refresh, register};
pub use expenses::{create_expense, delete_expense, list_expenses, update_expense};
pub use health_check::{health_check, route_not_found};
pub use reports::{
    average_daily, category_breakdown, monthly_summary, range_total, top_category,
    yearly_summary, SummaryCache,
};
