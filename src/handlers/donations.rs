use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::Caller,
    error::{ActionError, ErrorBody},
    models::{DonationInput, DonationIntent, DonationStatus, NewDonation},
    validation::{parse_body, validate_payload},
    views::View,
};

/// create_donation
///
/// [Public Action] Records a donation intent. No payment is taken; every intent starts and
/// stays `pending`. A signed-in donor is linked to the intent, anonymous donors are not.
#[utoipa::path(
    post,
    path = "/api/donations",
    request_body = DonationInput,
    responses(
        (status = 201, description = "Donation intent recorded", body = DonationIntent),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_donation(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<DonationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DonationIntent>), ActionError> {
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let donation = NewDonation {
        amount: payload.amount,
        email: payload.email.map(|email| email.to_lowercase()),
        name: payload.name,
        message: payload.message,
        user_id: caller.map(|identity| identity.id),
        status: DonationStatus::Pending,
    };
    let intent = state.repo.create_donation(donation).await?;

    tracing::info!(donation_id = %intent.id, amount = intent.amount, "donation intent recorded");
    state.views.invalidate(&[View::AdminDonations, View::Admin]);
    Ok((StatusCode::CREATED, Json(intent)))
}
