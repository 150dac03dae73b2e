//! Prescription Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::domain::events::{DomainEvent, PrescriptionEvent};

pub type PrescriptionId = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Fulfilled,
}

impl PrescriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Fulfilled => "fulfilled",
        }
    }

    /// Pending prescriptions can be decided either way or filled directly;
    /// approved ones can still be filled.
    pub fn can_transition_to(&self, next: PrescriptionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected | Self::Fulfilled) | (Self::Approved, Self::Fulfilled)
        )
    }
}

impl std::str::FromStr for PrescriptionStatus {
    type Err = PrescriptionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "fulfilled" => Ok(Self::Fulfilled),
            other => Err(PrescriptionError::UnknownStatus(other.to_string())),
        }
    }
}

/// Upload form. The image itself is stored elsewhere; only its reference is kept.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PrescriptionUpload {
    #[validate(length(min = 1, message = "Patient name is required."))]
    pub patient_name: String,
    #[validate(length(min = 1, max = 15))]
    pub patient_phone: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub patient_email: String,
    #[validate(length(min = 1, message = "Doctor name is required."))]
    pub doctor_name: String,
    #[validate(length(min = 1, message = "A prescription image is required."))]
    pub image_ref: String,
    #[validate(length(min = 1, message = "Delivery address is required."))]
    pub delivery_address: String,
    pub special_instructions: String,
    pub is_urgent: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub user_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: String,
    pub doctor_name: String,
    pub image_ref: String,
    pub delivery_address: String,
    pub special_instructions: String,
    pub is_urgent: bool,
    pub status: PrescriptionStatus,
    pub uploaded_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub notes: String,
}

impl Prescription {
    /// A fresh pending prescription. The id is assigned by storage.
    pub fn submit(upload: PrescriptionUpload, user_id: Option<i64>, doctor_id: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0, user_id, doctor_id,
            patient_name: upload.patient_name, patient_phone: upload.patient_phone, patient_email: upload.patient_email,
            doctor_name: upload.doctor_name, image_ref: upload.image_ref, delivery_address: upload.delivery_address,
            special_instructions: upload.special_instructions, is_urgent: upload.is_urgent,
            status: PrescriptionStatus::Pending, uploaded_at: now, reviewed_at: None, reviewed_by: None, notes: String::new(),
        }
    }

    /// Records a review decision. Status, reviewer and review time change together or not at all.
    pub fn review(&mut self, next: PrescriptionStatus, reviewer_id: i64, notes: impl Into<String>, now: DateTime<Utc>) -> Result<DomainEvent, PrescriptionError> {
        if !self.status.can_transition_to(next) {
            return Err(PrescriptionError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.reviewed_by = Some(reviewer_id);
        self.reviewed_at = Some(now);
        self.notes = notes.into();
        Ok(DomainEvent::Prescription(PrescriptionEvent::Reviewed { prescription_id: self.id, status: next, reviewer_id }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrescriptionError {
    #[error("Cannot move prescription from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: PrescriptionStatus, to: PrescriptionStatus },
    #[error("Unknown prescription status: {0}")]
    UnknownStatus(String),
    #[error("Prescription not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> PrescriptionUpload {
        PrescriptionUpload {
            patient_name: "Asha Rao".into(), patient_phone: "9876543210".into(), patient_email: "asha@example.com".into(),
            doctor_name: "Mehta".into(), image_ref: "uploads/rx-1.jpg".into(), delivery_address: "12 MG Road".into(),
            special_instructions: String::new(), is_urgent: true,
        }
    }

    #[test]
    fn test_review_sets_reviewer_and_time() {
        let now = Utc::now();
        let mut rx = Prescription::submit(upload(), Some(3), None, now);
        assert_eq!(rx.status, PrescriptionStatus::Pending);
        rx.review(PrescriptionStatus::Approved, 99, "ok", now).unwrap();
        assert_eq!(rx.reviewed_by, Some(99));
        assert_eq!(rx.reviewed_at, Some(now));
        rx.review(PrescriptionStatus::Fulfilled, 99, "", now).unwrap();
        assert_eq!(rx.status, PrescriptionStatus::Fulfilled);
    }

    #[test]
    fn test_rejected_is_final() {
        let now = Utc::now();
        let mut rx = Prescription::submit(upload(), None, None, now);
        rx.review(PrescriptionStatus::Rejected, 1, "illegible", now).unwrap();
        let before = rx.clone();
        assert!(rx.review(PrescriptionStatus::Approved, 2, "", now).is_err());
        assert_eq!(rx, before);
    }

    #[test]
    fn test_upload_validation() {
        let mut form = upload();
        assert!(form.validate().is_ok());
        form.patient_email = "not-an-email".into();
        assert!(form.validate().is_err());
    }
}
