//! Doctor directory and prescription uploads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use super::Storefront;
use crate::domain::aggregates::account::first_message;
use crate::domain::aggregates::{Doctor, Prescription, PrescriptionUpload, Specialization, UserId};
use crate::domain::events::{DomainEvent, PrescriptionEvent};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Serialize)]
pub struct DoctorDirectory {
    pub doctors: Vec<Doctor>,
    pub specializations: Vec<Specialization>,
    pub selected_specialization: Option<i64>,
}

impl Storefront {
    pub async fn doctor_directory(&self, specialization: Option<i64>) -> Result<DoctorDirectory> {
        Ok(DoctorDirectory {
            doctors: self.store.doctors(specialization).await?,
            specializations: self.store.specializations().await?,
            selected_specialization: specialization,
        })
    }

    /// Stores a pending prescription, linking the first listed doctor whose
    /// name contains the one given. Storage failures are reported as
    /// "Error uploading prescription: ...".
    pub async fn upload_prescription(&self, user_id: Option<UserId>, upload: PrescriptionUpload, now: DateTime<Utc>) -> Result<Prescription> {
        upload.validate().map_err(|e| StorefrontError::Invalid(first_message(&e)))?;
        let failed = |e: crate::repository::StoreError| {
            warn!(error = %e, "prescription upload failed");
            StorefrontError::Invalid(format!("Error uploading prescription: {e}"))
        };
        let doctor = self.store.find_doctor_by_name(&upload.doctor_name).await.map_err(failed)?;
        let prescription = Prescription::submit(upload, user_id, doctor.map(|d| d.id), now);
        let stored = self.store.create_prescription(&prescription).await.map_err(failed)?;
        info!(prescription_id = stored.id, urgent = stored.is_urgent, "prescription uploaded");
        self.events
            .publish(vec![DomainEvent::Prescription(PrescriptionEvent::Uploaded { prescription_id: stored.id, is_urgent: stored.is_urgent })])
            .await;
        Ok(stored)
    }

    pub async fn prescriptions_for(&self, user_id: UserId) -> Result<Vec<Prescription>> {
        Ok(self.store.prescriptions_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::pricing::PricingPolicy;
    use crate::infrastructure::{EventPublisher, InMemoryStore, SampleData};

    async fn shop() -> Storefront {
        let store = InMemoryStore::seeded(&SampleData::build(Utc::now())).await;
        Storefront { store: Arc::new(store), events: EventPublisher::disabled(), pricing: PricingPolicy::default(), count_coupon_redemptions: false }
    }

    fn upload(doctor: &str) -> PrescriptionUpload {
        PrescriptionUpload {
            patient_name: "Asha Rao".into(), patient_phone: "9876543210".into(), patient_email: "asha@example.com".into(),
            doctor_name: doctor.into(), image_ref: "uploads/rx.jpg".into(), delivery_address: "12 MG Road".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_links_matching_doctor() {
        let shop = shop().await;
        let rx = shop.upload_prescription(Some(7), upload("mehta"), Utc::now()).await.unwrap();
        assert_eq!(rx.doctor_id, Some(1));
        let unknown = shop.upload_prescription(Some(7), upload("House"), Utc::now()).await.unwrap();
        assert_eq!(unknown.doctor_id, None);
        assert_eq!(shop.prescriptions_for(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_directory_filters_by_specialization() {
        let shop = shop().await;
        let all = shop.doctor_directory(None).await.unwrap();
        assert_eq!(all.doctors.len(), 2);
        assert_eq!(all.doctors[0].name, "Dr. Arjun Nair");
        let cardio = shop.doctor_directory(Some(2)).await.unwrap();
        assert_eq!(cardio.doctors.len(), 1);
        assert_eq!(cardio.specializations.len(), 2);
    }
}
