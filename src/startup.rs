use actix_web::dev::Server;
use actix_web::{error, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{SessionManager, TokenCodec};
use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{AuthGate, RateLimit};
use crate::routes::{
    average_daily, category_breakdown, create_expense, current_user, delete_expense,
    health_check, list_expenses, login, logout, monthly_summary, range_total, refresh, register,
    route_not_found, top_category, update_expense, yearly_summary, SummaryCache,
};
use crate::security::RateLimiter;
use crate::store::{ExpenseStore, UserStore};

const JSON_BODY_LIMIT: usize = 10 * 1024;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            tracing::debug!(error = %err, "Rejected JSON body");
            let validation = match err {
                error::JsonPayloadError::Overflow { .. }
                | error::JsonPayloadError::OverflowKnownLength { .. } => {
                    ValidationError::TooLong("body".into(), JSON_BODY_LIMIT)
                }
                _ => ValidationError::InvalidFormat("body".into()),
            };
            AppError::Validation(validation).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected query string");
        AppError::Validation(ValidationError::InvalidFormat("query".into())).into()
    })
}

fn path_config() -> web::PathConfig {
    // The only path parameter is an expense id; a malformed one cannot exist.
    web::PathConfig::default().error_handler(|_err, _req| AppError::not_found("Expense").into())
}

/// Build the HTTP server over the given stores.
///
/// Credential endpoints share one rate-limit budget per client. Logout, the
/// current-user probe and every expense route sit behind the auth gate.
pub fn run(
    listener: TcpListener,
    settings: Settings,
    users: Arc<dyn UserStore>,
    expenses: Arc<dyn ExpenseStore>,
) -> Result<Server, std::io::Error> {
    let codec = Arc::new(TokenCodec::new(&settings.auth));
    let sessions = web::Data::new(SessionManager::new(
        users.clone(),
        codec.clone(),
        &settings.auth,
    ));
    let application = web::Data::new(settings.application.clone());
    let expenses: web::Data<dyn ExpenseStore> = web::Data::from(expenses);
    let summary_cache = web::Data::new(SummaryCache::new(Duration::from_secs(
        settings.cache.summary_ttl_seconds,
    )));
    let limiter = Arc::new(RateLimiter::new(&settings.rate_limit));

    let server = HttpServer::new(move || {
        let gate = || AuthGate::new(codec.clone(), users.clone());
        let limited = || RateLimit::new(limiter.clone());

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            // Extractor error bodies
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            // Shared state
            .app_data(sessions.clone())
            .app_data(application.clone())
            .app_data(expenses.clone())
            .app_data(summary_cache.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .service(
                        web::resource("/register")
                            .wrap(limited())
                            .route(web::post().to(register)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(limited())
                            .route(web::post().to(login)),
                    )
                    .service(
                        web::resource("/refresh")
                            .wrap(limited())
                            .route(web::post().to(refresh)),
                    )
                    .service(
                        web::resource("/logout")
                            .wrap(gate())
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(gate())
                            .route(web::get().to(current_user)),
                    ),
            )
            .service(
                web::scope("/api/expenses")
                    .wrap(gate())
                    .route("", web::post().to(create_expense))
                    .route("", web::get().to(list_expenses))
                    .route("/summary", web::get().to(monthly_summary))
                    .route("/category-breakdown", web::get().to(category_breakdown))
                    .route("/range-total", web::get().to(range_total))
                    .route("/yearly-summary", web::get().to(yearly_summary))
                    .route("/average-daily", web::get().to(average_daily))
                    .route("/top-category", web::get().to(top_category))
                    .route("/{id}", web::put().to(update_expense))
                    .route("/{id}", web::delete().to(delete_expense)),
            )
            .default_service(web::to(route_not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
