//! Doctor directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Specialization {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialization_id: i64,
    pub license_number: String,
    pub phone: String,
    pub email: String,
    pub hospital: String,
    pub experience_years: i32,
    pub photo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    /// Case-insensitive substring match used to link a prescription to a listed doctor.
    pub fn name_matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        !needle.is_empty() && self.name.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_name_matches() {
        let d = Doctor {
            id: 1, name: "Priya Mehta".into(), specialization_id: 1, license_number: "MH-1".into(), phone: String::new(),
            email: String::new(), hospital: String::new(), experience_years: 10, photo_url: None, is_active: true, created_at: Utc::now(),
        };
        assert!(d.name_matches("mehta"));
        assert!(!d.name_matches("  "));
        assert!(!d.name_matches("sharma"));
    }
}
