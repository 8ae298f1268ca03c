//! Reminder endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, services::reminders::SweepReport};

use super::AuthenticatedUser;

/// Run a reminder sweep now
#[utoipa::path(
    post,
    path = "/reminders/sweep",
    tag = "reminders",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn run_sweep(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;

    let report = state.services.scheduler.run_now().await?;
    Ok(Json(report))
}
