//! Sample catalog used to seed a fresh store.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::aggregates::{
    Banner, Category, Coupon, DiscountKind, Doctor, PaymentMethod, Product, Specialization,
};
use crate::domain::value_objects::{CouponCode, Slug};

#[derive(Clone, Debug, Default)]
pub struct SampleData {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub payment_methods: Vec<PaymentMethod>,
    pub coupons: Vec<Coupon>,
    pub banners: Vec<Banner>,
    pub specializations: Vec<Specialization>,
    pub doctors: Vec<Doctor>,
}

// (name, category id, description, price in paise, stock)
const PRODUCTS: [(&str, i64, &str, i64, i32); 6] = [
    ("Aspirin 325mg", 1, "Fast-acting pain relief for headaches and minor aches", 899, 50),
    ("Vitamin D3 1000 IU", 2, "Essential vitamin D supplement for bone health", 1299, 30),
    ("Cough Syrup", 3, "Effective cough suppressant for dry coughs", 1599, 25),
    ("Digital Thermometer", 4, "Accurate digital thermometer for temperature monitoring", 1999, 15),
    ("Ibuprofen 200mg", 1, "Anti-inflammatory pain reliever", 999, 40),
    ("Multivitamin Complex", 2, "Complete daily vitamin supplement", 2499, 35),
];

impl SampleData {
    /// Ids are assigned in declaration order starting at 1 within each table.
    pub fn build(now: DateTime<Utc>) -> Self {
        let categories = [
            ("Pain Relief", "Medications for pain management"),
            ("Vitamins", "Essential vitamins and supplements"),
            ("Cold & Flu", "Cold and flu medications"),
            ("First Aid", "First aid supplies and equipment"),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, description), id)| Category { id, name: name.into(), description: description.into() })
        .collect();

        let products = PRODUCTS.iter().zip(1..).map(|(&(name, category_id, description, paise, stock), id)| {
            let price = Decimal::new(paise, 2);
            Product {
                id, name: name.into(), slug: Slug::from_name(name).to_string(), category_id,
                brand: String::new(), manufacturer: String::new(), description: description.into(),
                short_description: String::new(), price, mrp: price, stock, min_stock_level: 10,
                is_prescription: false, is_featured: false, is_active: true, expiry_date: None,
                batch_number: String::new(), image_url: None, view_count: 0, purchase_count: 0,
                created_at: now, updated_at: now,
            }
        }).collect();

        let payment_methods = [
            ("Credit/Debit Card", "card", "fas fa-credit-card", 0),
            ("UPI Payment", "upi", "fas fa-mobile-alt", 0),
            ("Digital Wallet", "wallet", "fas fa-wallet", 0),
            ("Cash on Delivery", "cod", "fas fa-money-bill-wave", 25),
            ("Net Banking", "bank", "fas fa-university", 0),
        ]
        .into_iter()
        .zip(1..)
        .map(|((name, kind, icon, fee), id)| PaymentMethod {
            id, name: name.into(), payment_type: kind.into(), is_active: true,
            processing_fee: Decimal::from(fee), icon: icon.into(),
        })
        .collect();

        let coupons = [
            ("WELCOME10", DiscountKind::Percentage, 10, 100, 100, 30),
            ("SAVE50", DiscountKind::Fixed, 50, 500, 50, 15),
            ("HEALTH20", DiscountKind::Percentage, 20, 200, 200, 60),
        ]
        .into_iter()
        .zip(1..)
        .filter_map(|((code, kind, value, minimum, uses, days), id)| {
            Some(Coupon {
                id, code: CouponCode::parse(code).ok()?, discount_kind: kind,
                discount_value: Decimal::from(value), minimum_amount: Decimal::from(minimum),
                maximum_uses: uses, used_count: 0, valid_from: now, valid_to: now + Duration::days(days),
                is_active: true, created_at: now,
            })
        })
        .collect();

        let banners = vec![
            Banner {
                id: 1, title: "Upload your prescription".into(), icon: "fas fa-file-medical".into(), photo_url: None,
                link_url: "/prescriptions/".into(), is_active: true, display_order: 0, created_at: now,
            },
            Banner {
                id: 2, title: "Free delivery above 500".into(), icon: "fas fa-truck".into(), photo_url: None,
                link_url: "/products/".into(), is_active: true, display_order: 1, created_at: now,
            },
        ];

        let specializations = [("General Physician", "Primary care"), ("Cardiologist", "Heart and blood vessels")]
            .into_iter()
            .zip(1..)
            .map(|((name, description), id)| Specialization { id, name: name.into(), description: description.into(), created_at: now })
            .collect();

        let doctors = [("Dr. Priya Mehta", 1, "MH-10231", 12), ("Dr. Arjun Nair", 2, "KL-44120", 18)]
            .into_iter()
            .zip(1..)
            .map(|((name, specialization_id, license, years), id)| Doctor {
                id, name: name.into(), specialization_id, license_number: license.into(), phone: String::new(),
                email: String::new(), hospital: String::new(), experience_years: years, photo_url: None,
                is_active: true, created_at: now,
            })
            .collect();

        Self { categories, products, payment_methods, coupons, banners, specializations, doctors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_shape() {
        let now = Utc::now();
        let data = SampleData::build(now);
        assert_eq!(data.categories.len(), 4);
        assert_eq!(data.products.len(), 6);
        assert_eq!(data.payment_methods.len(), 5);
        let codes: Vec<_> = data.coupons.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["WELCOME10", "SAVE50", "HEALTH20"]);
        assert!(data.coupons.iter().all(|c| c.is_valid(now)));
        assert!(data.products.iter().all(|p| data.categories.iter().any(|c| c.id == p.category_id)));
    }
}
