//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, reminders, reports, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfkeeper API",
        version = "0.3.0",
        description = "Library lending and reminder REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        // Books
        books::list_books,
        books::search_books,
        books::available_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::search_users,
        users::get_user,
        users::create_user,
        users::delete_user,
        // Loans
        loans::issue_book,
        loans::return_book,
        loans::delete_loan,
        loans::open_loans,
        loans::get_user_loans,
        loans::get_user_issued,
        loans::get_user_overdue,
        // Reports
        reports::overdue,
        reports::recent_issues,
        reports::recent_returns,
        reports::summary,
        // Reminders
        reminders::run_sweep,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::BookDetails,
            crate::models::book::BookHolder,
            crate::models::book::BookInput,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserDetails,
            crate::models::user::CreateUser,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::IssueLoan,
            crate::models::loan::LoanDetails,
            crate::models::loan::IssuedBook,
            crate::models::loan::OverdueLoan,
            crate::models::loan::LoanActivity,
            loans::ReturnResponse,
            // Reports
            crate::models::report::LibrarySummary,
            crate::services::reminders::SweepReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "users", description = "User management"),
        (name = "loans", description = "Issuing and returning books"),
        (name = "reports", description = "Overdue lists and activity"),
        (name = "reminders", description = "Due and overdue reminders")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
