//! Prescription uploads and the doctor directory.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState, Notice, Session};
use crate::domain::aggregates::{Prescription, PrescriptionUpload};
use crate::services::DoctorDirectory;

#[derive(Debug, Serialize)]
pub struct PrescriptionList {
    pub prescriptions: Vec<Prescription>,
}

/// Anonymous visitors get an empty list.
pub async fn prescriptions(State(state): State<AppState>, session: Session) -> ApiResult<Json<PrescriptionList>> {
    let prescriptions = match session.user_id() {
        Some(user_id) => state.shop.prescriptions_for(user_id).await?,
        None => Vec::new(),
    };
    Ok(Json(PrescriptionList { prescriptions }))
}

#[derive(Debug, Serialize)]
pub struct PrescriptionBody {
    pub prescription: Prescription,
}

pub async fn upload_prescription(
    State(state): State<AppState>,
    session: Session,
    Json(upload): Json<PrescriptionUpload>,
) -> ApiResult<(StatusCode, Json<Notice<PrescriptionBody>>)> {
    let prescription = state.shop.upload_prescription(session.user_id(), upload, Utc::now()).await?;
    let message = format!(
        "Thank you {}! Your prescription has been uploaded successfully. We will process it within 2-4 hours.",
        prescription.patient_name
    );
    Ok((StatusCode::CREATED, Notice::new(message, PrescriptionBody { prescription })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
}

/// A specialization that is not a number is ignored.
pub async fn doctors(State(state): State<AppState>, Query(query): Query<DoctorQuery>) -> ApiResult<Json<DoctorDirectory>> {
    let specialization = query.specialization.and_then(|s| s.trim().parse().ok());
    Ok(Json(state.shop.doctor_directory(specialization).await?))
}
