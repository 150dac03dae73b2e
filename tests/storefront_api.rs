use std::str::FromStr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use pharmacy_storefront::api::{self, AppState};
use pharmacy_storefront::config::StorefrontConfig;
use pharmacy_storefront::infrastructure::{EventPublisher, InMemorySessionStore, InMemoryStore, SampleData};
use pharmacy_storefront::services::Storefront;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

/// One browser: keeps whatever session cookie the server hands out.
struct Client {
    router: Router,
    store: Arc<InMemoryStore>,
    cookie: Option<String>,
}

impl Client {
    async fn new() -> Self {
        let store = Arc::new(InMemoryStore::seeded(&SampleData::build(Utc::now())).await);
        let shop = Storefront::new(store.clone(), EventPublisher::disabled(), &StorefrontConfig::default());
        let state = AppState { shop, sessions: Arc::new(InMemorySessionStore::new()) };
        Self { router: api::router(state), store, cookie: None }
    }

    /// A second visitor against the same server.
    fn fresh(&self) -> Self {
        Self { router: self.router.clone(), store: self.store.clone(), cookie: None }
    }

    async fn send(&mut self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set) = response.headers().get(header::SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = if pair.ends_with('=') { None } else { Some(pair) };
        }
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) { self.send("GET", uri, None).await }

    async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) { self.send("POST", uri, Some(body)).await }

    async fn register_and_login(&mut self, email: &str) -> i64 {
        let (status, body) = self.post("/register", json!({
            "first_name": "Asha", "last_name": "Rao", "email": email, "mobile": "98765 43210",
            "password1": "s3cretpass", "password2": "s3cretpass",
        })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let (status, body) = self.post("/login", json!({ "username": email, "password": "s3cretpass" })).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["message"], "Welcome back, Asha!");
        body["user"]["id"].as_i64().unwrap()
    }
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

#[tokio::test]
async fn test_health_and_home() {
    let mut client = Client::new().await;
    let (status, body) = client.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = client.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 4);
    assert_eq!(body["cart"]["item_count"], 0);
    assert!(client.cookie.is_none(), "reading a page must not mint a session");
}

#[tokio::test]
async fn test_cart_flow_and_session_cookie() {
    let mut client = Client::new().await;
    let (status, body) = client.post("/add_to_cart/1/", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Aspirin 325mg has been added to your cart!");
    let cookie = client.cookie.clone().expect("session cookie set");
    assert!(cookie.starts_with("sessionid="));

    client.post("/add_to_cart/1/", json!({})).await;
    let (_, body) = client.post("/add_to_cart/4/", json!({})).await;
    assert_eq!(body["cart"]["item_count"], 3);
    assert_eq!(body["cart"]["distinct_items"], 2);
    assert_eq!(client.cookie.as_ref(), Some(&cookie), "existing session keeps its id");

    let (_, body) = client.post("/decrease_cart/1/", json!({})).await;
    assert_eq!(body["message"], "Quantity updated!");
    assert_eq!(body["quantity"], 1);
    let (_, body) = client.post("/decrease_cart/1/", json!({})).await;
    assert_eq!(body["message"], "Aspirin 325mg removed from cart!");

    let (status, body) = client.get("/cart/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&body["subtotal"]), Decimal::new(1999, 2));

    let (status, _) = client.post("/add_to_cart/999/", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = client.post("/clear_cart/", json!({})).await;
    assert_eq!(body["message"], "Cart cleared!");
    assert_eq!(body["cart"]["item_count"], 0);

    let mut stranger = client.fresh();
    let (_, body) = stranger.get("/cart/").await;
    assert_eq!(body["cart"]["item_count"], 0);
}

#[tokio::test]
async fn test_deleted_products_drop_out_of_the_cart() {
    let mut client = Client::new().await;
    client.post("/add_to_cart/2/", json!({})).await;
    client.post("/add_to_cart/3/", json!({})).await;
    assert!(client.store.delete_product(3).await);

    let (_, body) = client.get("/cart/").await;
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["product"]["id"], 2);
    assert_eq!(decimal(&body["subtotal"]), Decimal::new(1299, 2));

    assert!(client.store.delete_product(2).await);
    let (status, body) = client.get("/checkout/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your cart is empty!");
}

#[tokio::test]
async fn test_checkout_quote_and_empty_cart() {
    let mut client = Client::new().await;
    let (status, body) = client.get("/checkout/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your cart is empty!");

    client.post("/add_to_cart/1/", json!({})).await;
    client.post("/add_to_cart/1/", json!({})).await;
    client.post("/add_to_cart/4/", json!({})).await;
    let (status, body) = client.get("/checkout/").await;
    assert_eq!(status, StatusCode::OK);
    let totals = &body["totals"];
    assert_eq!(decimal(&totals["subtotal"]["amount"]), Decimal::new(3797, 2));
    assert_eq!(decimal(&totals["tax"]["amount"]), Decimal::new(68346, 4));
    assert_eq!(decimal(&totals["shipping"]["amount"]), Decimal::new(50, 0));
    assert_eq!(decimal(&totals["total"]["amount"]), Decimal::new(948046, 4));
    assert_eq!(body["payment_methods"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_coupon_application_and_order_placement() {
    let mut client = Client::new().await;
    for _ in 0..5 {
        client.post("/add_to_cart/6/", json!({})).await;
    }
    let (status, body) = client.post("/apply_coupon/", json!({ "coupon_code": "WELCOME10" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to continue.");

    let (status, body) = client.post("/checkout/", json!({ "shipping_address": "12 MG Road" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Please log in to continue.");

    client.register_and_login("asha@example.com").await;
    let (status, body) = client.post("/apply_coupon/", json!({ "coupon_code": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid coupon code.");
    let (status, body) = client.post("/apply_coupon/", json!({ "coupon_code": " welcome10 " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Coupon WELCOME10 applied successfully!");

    let (_, quote) = client.get("/checkout/").await;
    assert_eq!(decimal(&quote["totals"]["discount"]["amount"]), Decimal::new(12495, 3));
    assert_eq!(decimal(&quote["totals"]["total"]["amount"]), Decimal::new(184946, 3));
    assert_eq!(quote["applied_coupon"]["code"], "WELCOME10");

    let (status, body) = client.post("/checkout/", json!({ "payment_method_id": 5, "shipping_address": "12 MG Road" })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["message"], "Order placed successfully! You will receive a confirmation email shortly.");
    let order = &body["order"];
    assert_eq!(order["status"], "pending");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD"));
    assert_eq!(decimal(&order["total_price"]), Decimal::new(184946, 3));
    assert_eq!(order["coupon_id"], 1);

    let (_, cart) = client.get("/cart/").await;
    assert_eq!(cart["cart"]["item_count"], 0);
    assert!(cart["applied_coupon"].is_null());

    let (_, detail) = client.get("/product/6/").await;
    assert_eq!(detail["product"]["stock"], 30);

    let (_, profile) = client.get("/profile/").await;
    assert_eq!(profile["orders_count"], 1);
    assert_eq!(decimal(&profile["total_spent"]), Decimal::ZERO);
}

#[tokio::test]
async fn test_checkout_rejects_more_than_in_stock() {
    let mut client = Client::new().await;
    client.register_and_login("stock@example.com").await;
    for _ in 0..16 {
        client.post("/add_to_cart/4/", json!({})).await;
    }
    let (status, body) = client.post("/checkout/", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Not enough stock left for Digital Thermometer");
    let (_, detail) = client.get("/product/4/").await;
    assert_eq!(detail["product"]["stock"], 15);
}

#[tokio::test]
async fn test_registration_errors() {
    let mut client = Client::new().await;
    let form = |email: &str, p1: &str, p2: &str| json!({
        "first_name": "Asha", "last_name": "Rao", "email": email, "mobile": "9876543210",
        "password1": p1, "password2": p2,
    });
    let (status, body) = client.post("/register", json!({ "first_name": "Asha" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please fill in all required fields.");

    let (_, body) = client.post("/register", form("a@b.com", "s3cretpass", "different")).await;
    assert_eq!(body["error"], "Passwords do not match.");
    let (_, body) = client.post("/register", form("a@b.com", "short", "short")).await;
    assert_eq!(body["error"], "Password must be at least 8 characters long.");

    let (status, body) = client.post("/register", form("a@b.com", "s3cretpass", "s3cretpass")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Account created successfully! Please login to continue.");
    assert!(body["user"].get("password_hash").is_none());

    let (_, body) = client.post("/register", form("A@B.com", "s3cretpass", "s3cretpass")).await;
    assert_eq!(body["error"], "Email already registered.");

    let (status, body) = client.post("/login", json!({ "email": "a@b.com", "password": "wrong" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password.");
}

#[tokio::test]
async fn test_login_rotates_session_and_logout_clears_it() {
    let mut client = Client::new().await;
    client.post("/add_to_cart/2/", json!({})).await;
    let anonymous = client.cookie.clone().unwrap();
    client.register_and_login("rotate@example.com").await;
    let logged_in = client.cookie.clone().unwrap();
    assert_ne!(anonymous, logged_in);

    let (_, cart) = client.get("/cart/").await;
    assert_eq!(cart["cart"]["item_count"], 1, "cart survives login");

    let (_, body) = client.get("/logout").await;
    assert_eq!(body["message"], "You have been logged out successfully.");
    assert!(client.cookie.is_none());

    client.cookie = Some(logged_in);
    let (status, _) = client.get("/profile/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "old session id is gone");
}

#[tokio::test]
async fn test_wishlist_and_reviews_require_login() {
    let mut client = Client::new().await;
    let (status, _) = client.post("/add_to_wishlist/1/", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    client.register_and_login("wish@example.com").await;
    let (_, body) = client.post("/add_to_wishlist/1/", json!({})).await;
    assert_eq!(body["message"], "Aspirin 325mg added to your wishlist!");
    let (_, body) = client.post("/add_to_wishlist/1/", json!({})).await;
    assert_eq!(body["message"], "Aspirin 325mg is already in your wishlist!");
    let (_, body) = client.get("/wishlist/").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    let (_, body) = client.post("/remove_from_wishlist/1/", json!({})).await;
    assert_eq!(body["message"], "Aspirin 325mg removed from your wishlist!");
    let (status, body) = client.post("/remove_from_wishlist/1/", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found in your wishlist!");

    let (status, body) = client.post("/product/2/", json!({ "rating": 4, "comment": "Good" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Your review has been added!");
    let (status, body) = client.post("/product/2/", json!({ "rating": 2, "comment": "Changed my mind" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already reviewed this product.");
    let (_, detail) = client.get("/product/2/").await;
    assert_eq!(decimal(&detail["average_rating"]), Decimal::new(4, 0));
}

#[tokio::test]
async fn test_prescription_upload_and_doctor_directory() {
    let mut client = Client::new().await;
    let upload = json!({
        "patient_name": "Ravi", "patient_phone": "9876543210", "patient_email": "ravi@example.com",
        "doctor_name": "Priya", "image_ref": "uploads/rx-1.jpg", "delivery_address": "Kochi", "is_urgent": true,
    });
    let (status, body) = client.post("/prescriptions/", upload).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(
        body["message"],
        "Thank you Ravi! Your prescription has been uploaded successfully. We will process it within 2-4 hours."
    );
    assert_eq!(body["prescription"]["doctor_id"], 1);
    assert_eq!(body["prescription"]["status"], "pending");

    let (status, _) = client.post("/prescriptions/", json!({ "patient_name": "Ravi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = client.get("/prescriptions/").await;
    assert!(body["prescriptions"].as_array().unwrap().is_empty());

    let (_, body) = client.get("/doctors/?specialization=2").await;
    assert_eq!(body["doctors"].as_array().unwrap().len(), 1);
    let (_, body) = client.get("/doctors/?specialization=cardio").await;
    assert_eq!(body["doctors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_back_office_requires_staff() {
    let mut customer = Client::new().await;
    let (status, _) = customer.get("/admin/coupons").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    customer.register_and_login("buyer@example.com").await;
    let (status, body) = customer.get("/admin/coupons").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Staff access required.");

    customer.post("/add_to_cart/5/", json!({})).await;
    let (_, placed) = customer.post("/checkout/", json!({})).await;
    let order_id = placed["order"]["id"].as_i64().unwrap();

    let mut staff = customer.fresh();
    let staff_id = staff.register_and_login("staff@example.com").await;
    assert!(staff.store.set_staff(staff_id, true).await);

    let (status, body) = staff.get("/admin/coupons").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = staff.post("/admin/orders/999/status", json!({ "status": "shipped" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let uri = format!("/admin/orders/{order_id}/status");
    let (status, body) = staff.post(&uri, json!({ "status": "confirmed", "notes": "stock checked" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "confirmed");
    let (status, body) = staff.post(&uri, json!({ "status": "pending" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot move order from confirmed to pending");
    let (status, _) = staff.post(&uri, json!({ "status": "teleported" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = staff.post(&format!("/admin/orders/{order_id}/paid"), json!({ "payment_id": "pay_42" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_paid"], true);

    let (_, profile) = customer.get("/profile/").await;
    assert_eq!(decimal(&profile["total_spent"]), decimal(&placed["order"]["total_price"]));

    let (status, body) = staff.get("/admin/products/low_stock").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_staff_coupon_creation() {
    let mut staff = Client::new().await;
    let staff_id = staff.register_and_login("ops@example.com").await;
    staff.store.set_staff(staff_id, true).await;

    let valid_to = (Utc::now() + chrono::Duration::days(10)).to_rfc3339();
    let request = json!({ "code": "monsoon15", "discount_type": "percentage", "discount_value": "15", "valid_to": valid_to });
    let (status, body) = staff.post("/admin/coupons", request.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["code"], "MONSOON15");
    let (status, _) = staff.post("/admin/coupons", request).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = staff.post("/apply_coupon/", json!({ "coupon_code": "MONSOON15" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, listing) = staff.get("/admin/coupons").await;
    assert_eq!(status, StatusCode::OK);
    let monsoon = listing.as_array().unwrap().iter().find(|c| c["code"] == "MONSOON15").unwrap();
    assert_eq!(monsoon["remaining_uses"], 1);
    assert_eq!(monsoon["used_count"], 0);
}

#[tokio::test]
async fn test_newsletter_and_contact() {
    let mut client = Client::new().await;
    let (status, body) = client.post("/newsletter/", json!({ "email": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please enter a valid email address.");
    let (_, body) = client.post("/newsletter/", json!({ "email": "reader@example.com" })).await;
    assert_eq!(body["message"], "Thank you for subscribing to our newsletter!");

    let (status, body) = client.post("/contact/", json!({
        "name": "Meera", "email": "meera@example.com", "subject": "Refill", "message": "Do you deliver on Sundays?",
    })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Thank you Meera! Your message has been sent. We will get back to you soon.");
}

#[tokio::test]
async fn test_product_listing_and_search() {
    let mut client = Client::new().await;
    let (_, body) = client.get("/products/?category=vitamins").await;
    assert_eq!(body["products"].as_array().unwrap().len(), 2);
    let (_, body) = client.get("/advanced_search/?q=pain&sort=price_low").await;
    let prices: Vec<Decimal> = body["products"].as_array().unwrap().iter().map(|p| decimal(&p["price"])).collect();
    assert!(!prices.is_empty());
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    let (status, _) = client.get("/product/404/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
