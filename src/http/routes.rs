//! HTTP route definitions

use axum::{
    extract::{Extension, Form, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::warn;

use crate::app::AppState;
use crate::http::middleware::{mint_token, require_auth, AuthenticatedAdmin, SESSION_COOKIE};
use crate::store::db::StoreError;
use crate::store::products::{NewProduct, Product};
use crate::store::purchases::PurchaseRow;
use crate::store::suppliers::Supplier;
use crate::util::time::uptime_secs;

/// Number of purchases shown on the dashboard
const RECENT_PURCHASES_LIMIT: i64 = 5;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/", get(login_page))
        .route("/login", get(login_page).post(login_handler))
        .route("/health", get(health_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/logout", get(logout_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/products", get(list_products_handler))
        .route("/products/add", post(add_product_handler))
        .route("/products/update/:id", post(update_product_handler))
        .route("/products/delete/:id", post(delete_product_handler))
        .route("/suppliers", get(list_suppliers_handler))
        .route("/suppliers/add", post(add_supplier_handler))
        .route("/suppliers/delete/:id", post(delete_supplier_handler))
        .route("/purchases", get(list_purchases_handler))
        .route("/purchases/add", post(add_purchase_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Auth endpoints
// ============================================================================

#[derive(Serialize)]
struct LoginPromptResponse {
    message: &'static str,
}

async fn login_page() -> Json<LoginPromptResponse> {
    Json(LoginPromptResponse {
        message: "Submit username and password to POST /login",
    })
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let username = form.username.trim();
    let password = form.password.trim();

    let valid = state
        .admin_store
        .verify_credentials(username, password)
        .await?;

    if !valid {
        warn!("Failed login attempt for '{}'", username);
        return Err(AppError::Unauthorized);
    }

    let token = mint_token(
        username,
        &state.config.session_secret,
        state.config.session_ttl_secs,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/dashboard")))
}

async fn logout_handler(jar: CookieJar) -> (CookieJar, Redirect) {
    let removal = Cookie::build(SESSION_COOKIE).path("/").build();
    (jar.remove(removal), Redirect::to("/login"))
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
    })
}

// ============================================================================
// Dashboard endpoint
// ============================================================================

#[derive(Serialize)]
struct DashboardResponse {
    admin: String,
    total_products: i64,
    total_suppliers: i64,
    low_stock_count: i64,
    recent_purchases: Vec<PurchaseRow>,
}

async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedAdmin>,
) -> Result<Json<DashboardResponse>, AppError> {
    let total_products = state.product_store.count().await?;
    let total_suppliers = state.supplier_store.count().await?;
    let low_stock_count = state.product_store.low_stock_count().await?;
    let recent_purchases = state
        .purchase_store
        .recent(RECENT_PURCHASES_LIMIT)
        .await?;

    Ok(Json(DashboardResponse {
        admin: admin.username,
        total_products,
        total_suppliers,
        low_stock_count,
        recent_purchases,
    }))
}

// ============================================================================
// Product endpoints
// ============================================================================

#[derive(Serialize)]
struct ProductsResponse {
    products: Vec<Product>,
}

async fn list_products_handler(
    State(state): State<AppState>,
) -> Result<Json<ProductsResponse>, AppError> {
    let products = state.product_store.list().await?;
    Ok(Json(ProductsResponse { products }))
}

#[derive(Deserialize)]
struct ProductForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    stock_qty: String,
}

impl ProductForm {
    fn into_new_product(self) -> Result<NewProduct, AppError> {
        let stock_qty = coerce_stock_qty(&self.stock_qty)?;
        Ok(NewProduct {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            price: self.price.trim().to_string(),
            stock_qty,
        })
    }
}

async fn add_product_handler(
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> Result<Redirect, AppError> {
    state.product_store.add(form.into_new_product()?).await?;
    Ok(Redirect::to("/products"))
}

async fn update_product_handler(
    State(state): State<AppState>,
    Path(prod_id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Redirect, AppError> {
    // Unknown ids are a silent no-op, not an error
    state
        .product_store
        .update(prod_id, form.into_new_product()?)
        .await?;
    Ok(Redirect::to("/products"))
}

async fn delete_product_handler(
    State(state): State<AppState>,
    Path(prod_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state.product_store.delete(prod_id).await?;
    Ok(Redirect::to("/products"))
}

// ============================================================================
// Supplier endpoints
// ============================================================================

#[derive(Serialize)]
struct SuppliersResponse {
    suppliers: Vec<Supplier>,
}

async fn list_suppliers_handler(
    State(state): State<AppState>,
) -> Result<Json<SuppliersResponse>, AppError> {
    let suppliers = state.supplier_store.list().await?;
    Ok(Json(SuppliersResponse { suppliers }))
}

#[derive(Deserialize)]
struct SupplierForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    contact: String,
}

async fn add_supplier_handler(
    State(state): State<AppState>,
    Form(form): Form<SupplierForm>,
) -> Result<Redirect, AppError> {
    state
        .supplier_store
        .add(form.name.trim(), form.contact.trim())
        .await?;
    Ok(Redirect::to("/suppliers"))
}

async fn delete_supplier_handler(
    State(state): State<AppState>,
    Path(supplier_id): Path<i64>,
) -> Result<Redirect, AppError> {
    state.supplier_store.delete(supplier_id).await?;
    Ok(Redirect::to("/suppliers"))
}

// ============================================================================
// Purchase endpoints
// ============================================================================

#[derive(Serialize)]
struct PurchasesResponse {
    purchases: Vec<PurchaseRow>,
    /// Reference data for the purchase form
    products: Vec<Product>,
    suppliers: Vec<Supplier>,
}

async fn list_purchases_handler(
    State(state): State<AppState>,
) -> Result<Json<PurchasesResponse>, AppError> {
    let purchases = state.purchase_store.list().await?;
    let products = state.product_store.list().await?;
    let suppliers = state.supplier_store.list().await?;

    Ok(Json(PurchasesResponse {
        purchases,
        products,
        suppliers,
    }))
}

#[derive(Deserialize)]
struct PurchaseForm {
    #[serde(default)]
    prod_id: String,
    #[serde(default)]
    supplier_id: String,
    #[serde(default)]
    quantity: String,
    #[serde(default)]
    date: String,
}

async fn add_purchase_handler(
    State(state): State<AppState>,
    Form(form): Form<PurchaseForm>,
) -> Result<Redirect, AppError> {
    let prod_id = require_int("prod_id", &form.prod_id)?;
    let supplier_id = require_int("supplier_id", &form.supplier_id)?;
    let quantity = require_int("quantity", &form.quantity)?;
    let date = coerce_date(&form.date)?;

    state
        .purchase_store
        .record(prod_id, supplier_id, quantity, date)
        .await?;

    Ok(Redirect::to("/purchases"))
}

// ============================================================================
// Form coercion
// ============================================================================

/// Absent or empty stock quantity falls back to zero; anything else must be
/// a whole number
fn coerce_stock_qty(raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .map_err(|_| AppError::Validation(format!("stock_qty must be a whole number, got '{}'", raw)))
}

fn require_int(field: &'static str, raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    raw.parse()
        .map_err(|_| AppError::Validation(format!("{} must be a whole number, got '{}'", field, raw)))
}

/// Absent or empty date falls back to today's calendar date
fn coerce_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Utc::now().date_naive());
    }
    raw.parse()
        .map_err(|_| AppError::Validation(format!("date must be YYYY-MM-DD, got '{}'", raw)))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ForeignKey => AppError::Integrity(
                "purchase references a product or supplier that does not exist".to_string(),
            ),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
            AppError::Integrity(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::store::db::memory_pool;

    async fn test_router() -> Router {
        let pool = memory_pool().await;
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            database_url: "sqlite::memory:".to_string(),
            session_secret: "test-secret".to_string(),
            session_ttl_secs: 3600,
            admin_username: "admin".to_string(),
            admin_password: "1234".to_string(),
        };
        build_router(AppState::new(config, pool))
    }

    async fn get(router: &Router, path: &str, cookie: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_form(
        router: &Router,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        router
            .clone()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Log in with the seeded credentials and return the session cookie pair
    async fn login(router: &Router) -> String {
        let response = post_form(router, "/login", "username=admin&password=1234", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");

        let set_cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let router = test_router().await;
        let response = get(&router, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_redirect_without_session() {
        let router = test_router().await;
        for path in ["/dashboard", "/products", "/suppliers", "/purchases", "/logout"] {
            let response = get(&router, path, None).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(location(&response), "/login", "{}", path);
        }
    }

    #[tokio::test]
    async fn wrong_credentials_establish_no_session() {
        let router = test_router().await;

        let response = post_form(&router, "/login", "username=admin&password=wrong", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        // Protected routes still redirect
        let response = get(&router, "/dashboard", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn login_grants_access_and_logout_clears_it() {
        let router = test_router().await;
        let cookie = login(&router).await;

        let response = get(&router, "/dashboard", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["admin"], "admin");

        let response = get(&router, "/logout", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn tampered_session_cookie_redirects_to_login() {
        let router = test_router().await;
        let cookie = format!("{}=bogus.token", SESSION_COOKIE);
        let response = get(&router, "/products", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn product_form_coercion() {
        let router = test_router().await;
        let cookie = login(&router).await;

        // Empty stock_qty falls back to zero
        let response = post_form(
            &router,
            "/products/add",
            "name=Widget&category=Hardware&price=9.99&stock_qty=",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/products");

        // Malformed stock_qty is a recovered validation error
        let response = post_form(
            &router,
            "/products/add",
            "name=Widget&stock_qty=lots",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(&router, "/products", Some(&cookie)).await;
        let body = json_body(response).await;
        let products = body["products"].as_array().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0]["name"], "Widget");
        assert_eq!(products[0]["stock_qty"], 0);
    }

    #[tokio::test]
    async fn purchase_against_unknown_references_is_a_conflict() {
        let router = test_router().await;
        let cookie = login(&router).await;

        let response = post_form(
            &router,
            "/purchases/add",
            "prod_id=1&supplier_id=1&quantity=5",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn purchase_requires_numeric_fields() {
        let router = test_router().await;
        let cookie = login(&router).await;

        let response = post_form(
            &router,
            "/purchases/add",
            "prod_id=1&supplier_id=1&quantity=many",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_form(
            &router,
            "/purchases/add",
            "prod_id=1&supplier_id=1&quantity=5&date=June 1st",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn record_purchase_end_to_end() {
        let router = test_router().await;
        let cookie = login(&router).await;

        let response = post_form(
            &router,
            "/products/add",
            "name=Widget&category=Hardware&price=9.99&stock_qty=5",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = post_form(
            &router,
            "/suppliers/add",
            "name=Acme&contact=acme%40example.com",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = post_form(
            &router,
            "/purchases/add",
            "prod_id=1&supplier_id=1&quantity=20&date=2024-06-01",
            Some(&cookie),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/purchases");

        // Stock went from 5 to 25
        let response = get(&router, "/products", Some(&cookie)).await;
        let body = json_body(response).await;
        assert_eq!(body["products"][0]["stock_qty"], 25);

        // One joined purchase row
        let response = get(&router, "/purchases", Some(&cookie)).await;
        let body = json_body(response).await;
        let purchases = body["purchases"].as_array().unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0]["product"], "Widget");
        assert_eq!(purchases[0]["supplier"], "Acme");
        assert_eq!(purchases[0]["quantity"], 20);
        assert_eq!(purchases[0]["date"], "2024-06-01");

        // Dashboard reflects the new state
        let response = get(&router, "/dashboard", Some(&cookie)).await;
        let body = json_body(response).await;
        assert_eq!(body["total_products"], 1);
        assert_eq!(body["total_suppliers"], 1);
        assert_eq!(body["low_stock_count"], 0);
        assert_eq!(body["recent_purchases"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_endpoints_are_idempotent() {
        let router = test_router().await;
        let cookie = login(&router).await;

        let response = post_form(&router, "/products/delete/42", "", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = post_form(&router, "/suppliers/delete/42", "", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
