//! In-memory stand-in for the managed backend's REST and auth endpoints.
//!
//! Understands just the slice of the query dialect the storefront sends:
//! `eq.` and `in.()` filters, `order`, `limit`, `on_conflict`, and the few
//! embedded resources the storefront selects. Row visibility follows the
//! same owner rules the real row-level security policies enforce.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

/// Public key the storefront is configured with.
pub const ANON_KEY: &str = "anon-test-key";
/// Privileged key for CLI-style callers.
pub const SERVICE_KEY: &str = "service-test-key";

/// Tables readable by anyone and writable only with the service key.
const CATALOG_TABLES: &[&str] = &["categories", "products", "product_variants"];

struct User {
    id: Uuid,
    email: String,
    password: String,
    full_name: String,
    confirmed: bool,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    users: Vec<User>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    require_confirmation: bool,
    token_lifetime_secs: Option<i64>,
    refreshes: usize,
    ticks: i64,
}

impl Inner {
    fn rows(&self, table: &str) -> &[Value] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    /// Strictly increasing timestamps so `created_at` ordering is stable.
    fn next_timestamp(&mut self) -> String {
        self.ticks += 1;
        (Utc::now() + Duration::milliseconds(self.ticks))
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn store(&mut self, table: &str, mut row: Value) -> Value {
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            let created_at = self.next_timestamp();
            obj.entry("created_at")
                .or_insert_with(|| Value::String(created_at));
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    fn issue_session(&mut self, user_id: Uuid) -> Value {
        let access = format!("access-{}", Uuid::new_v4().simple());
        let refresh = format!("refresh-{}", Uuid::new_v4().simple());
        self.access_tokens.insert(access.clone(), user_id);
        self.refresh_tokens.insert(refresh.clone(), user_id);

        let user = self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map_or(Value::Null, user_json);

        json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": self.token_lifetime_secs.unwrap_or(3600),
            "refresh_token": refresh,
            "user": user,
        })
    }
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "user_metadata": { "full_name": user.full_name },
    })
}

/// Who a REST request runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    Anon,
    Service,
    User(Uuid),
}

/// Handle to the fake backend. Clones share state.
#[derive(Clone, Default)]
pub struct FakeSupabase {
    inner: Arc<Mutex<Inner>>,
}

/// Ids of a product created with [`FakeSupabase::seed_product`].
#[derive(Debug, Clone)]
pub struct SeededProduct {
    pub category_id: String,
    pub product_id: String,
    pub variant_ids: Vec<String>,
}

impl FakeSupabase {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Axum router serving `/rest/v1` and `/auth/v1`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/rest/v1/", get(rest_root))
            .route(
                "/rest/v1/{table}",
                get(rest_select)
                    .post(rest_insert)
                    .patch(rest_update)
                    .delete(rest_delete),
            )
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/signup", post(auth_signup))
            .route("/auth/v1/logout", post(auth_logout))
            .with_state(self.clone())
    }

    /// Make sign-up return an unconfirmed user instead of a session.
    pub fn set_require_confirmation(&self, required: bool) {
        self.lock().require_confirmation = required;
    }

    /// Lifetime of access tokens issued from now on. Zero makes every new
    /// session arrive already expired.
    pub fn set_token_lifetime(&self, secs: i64) {
        self.lock().token_lifetime_secs = Some(secs);
    }

    /// Invalidate every outstanding refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    /// How many refresh grants have succeeded.
    pub fn refresh_count(&self) -> usize {
        self.lock().refreshes
    }

    /// Register a confirmed customer with a profile row.
    pub fn add_user(&self, email: &str, password: &str, full_name: &str) -> Uuid {
        let mut inner = self.lock();
        let id = Uuid::new_v4();
        inner.users.push(User {
            id,
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            confirmed: true,
        });
        inner.store(
            "profiles",
            json!({ "id": id, "full_name": full_name, "email": email, "phone": null }),
        );
        id
    }

    /// Insert a category (reused by slug), an active product, and its
    /// variants given as `(name, price, available)`.
    pub fn seed_product(
        &self,
        category_slug: &str,
        name: &str,
        variants: &[(&str, &str, bool)],
    ) -> SeededProduct {
        let mut inner = self.lock();

        let existing = inner
            .rows("categories")
            .iter()
            .find(|c| c["slug"] == category_slug)
            .cloned();
        let category = match existing {
            Some(category) => category,
            None => inner.store(
                "categories",
                json!({
                    "name": category_slug.replace('-', " "),
                    "slug": category_slug,
                    "description": null,
                }),
            ),
        };
        let category_id = id_of(&category);

        let base_price = variants.first().map_or("0", |v| v.1);
        let product = inner.store(
            "products",
            json!({
                "name": name,
                "description": format!("{name}, made by hand"),
                "base_price": base_price,
                "image_url": null,
                "category_id": category_id,
                "is_active": true,
            }),
        );
        let product_id = id_of(&product);

        let variant_ids = variants
            .iter()
            .map(|(variant_name, price, available)| {
                id_of(&inner.store(
                    "product_variants",
                    json!({
                        "product_id": product_id,
                        "variant_name": variant_name,
                        "price": price,
                        "is_available": available,
                    }),
                ))
            })
            .collect();

        SeededProduct {
            category_id,
            product_id,
            variant_ids,
        }
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().rows(table).to_vec()
    }

    /// Rows of `table` where `column` equals `value`.
    pub fn rows_where(&self, table: &str, column: &str, value: &str) -> Vec<Value> {
        self.lock()
            .rows(table)
            .iter()
            .filter(|row| text(row.get(column)).as_deref() == Some(value))
            .cloned()
            .collect()
    }

    /// Overwrite one column of the rows matching `id`.
    pub fn set_column(&self, table: &str, id: &str, column: &str, value: Value) {
        let mut inner = self.lock();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| r["id"] == id) {
                row[column] = value.clone();
            }
        }
    }
}

fn id_of(row: &Value) -> String {
    row["id"].as_str().unwrap_or_default().to_string()
}

// =============================================================================
// Query parsing
// =============================================================================

#[derive(Default)]
struct Params {
    select: String,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
    on_conflict: Vec<String>,
}

impl Params {
    fn parse(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "select" => params.select = value,
                "order" => {
                    let (column, direction) =
                        value.rsplit_once('.').unwrap_or((value.as_str(), "asc"));
                    params.order = Some((column.to_string(), direction == "desc"));
                }
                "limit" => params.limit = value.parse().ok(),
                "on_conflict" => {
                    params.on_conflict = value.split(',').map(str::to_string).collect();
                }
                _ => params.filters.push((key, value)),
            }
        }
        params
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, condition)| {
            let cell = text(row.get(column));
            if let Some(expected) = condition.strip_prefix("eq.") {
                cell.as_deref() == Some(expected)
            } else if let Some(list) = condition
                .strip_prefix("in.(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                cell.is_some_and(|c| list.split(',').any(|v| v == c))
            } else {
                false
            }
        })
    }
}

/// A cell as the query dialect compares it.
fn text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

// =============================================================================
// Row-level security
// =============================================================================

fn caller(inner: &Inner, headers: &HeaderMap) -> Result<Caller, Response> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let apikey = header("apikey").unwrap_or_default();
    if apikey != ANON_KEY && apikey != SERVICE_KEY {
        return Err(unauthorized("Invalid API key"));
    }

    let bearer = header("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    match bearer {
        ANON_KEY => Ok(Caller::Anon),
        SERVICE_KEY => Ok(Caller::Service),
        token => inner
            .access_tokens
            .get(token)
            .map(|id| Caller::User(*id))
            .ok_or_else(|| unauthorized("JWT expired")),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": "PGRST301", "message": message })),
    )
        .into_response()
}

fn forbidden(table: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "code": "42501",
            "message": format!("new row violates row-level security policy for table \"{table}\""),
        })),
    )
        .into_response()
}

/// Whether `caller` may see `row` of `table`.
fn can_read(inner: &Inner, caller: Caller, table: &str, row: &Value) -> bool {
    if CATALOG_TABLES.contains(&table) {
        return true;
    }
    match caller {
        Caller::Service => true,
        Caller::Anon => false,
        Caller::User(user_id) => owns(inner, user_id, table, row),
    }
}

/// Whether `caller` may insert, update, or delete `row` of `table`.
fn can_write(inner: &Inner, caller: Caller, table: &str, row: &Value) -> bool {
    match caller {
        Caller::Service => true,
        Caller::Anon => false,
        Caller::User(user_id) => {
            !CATALOG_TABLES.contains(&table) && owns(inner, user_id, table, row)
        }
    }
}

fn owns(inner: &Inner, user_id: Uuid, table: &str, row: &Value) -> bool {
    let user = user_id.to_string();
    match table {
        "cart_items" | "orders" => text(row.get("user_id")).as_deref() == Some(user.as_str()),
        "profiles" => text(row.get("id")).as_deref() == Some(user.as_str()),
        "order_items" => {
            let order_id = text(row.get("order_id"));
            inner.rows("orders").iter().any(|order| {
                text(order.get("id")) == order_id
                    && text(order.get("user_id")).as_deref() == Some(user.as_str())
            })
        }
        _ => false,
    }
}

// =============================================================================
// Embedding
// =============================================================================

fn embed(inner: &Inner, table: &str, select: &str, mut row: Value) -> Value {
    let id = text(row.get("id"));
    let find = |table: &str, id: Option<String>| {
        inner
            .rows(table)
            .iter()
            .find(|r| text(r.get("id")) == id)
            .cloned()
            .unwrap_or(Value::Null)
    };
    let children = |table: &str, column: &str| {
        Value::Array(
            inner
                .rows(table)
                .iter()
                .filter(|r| text(r.get(column)) == id)
                .cloned()
                .collect(),
        )
    };

    match table {
        "products" if select.contains("variants:") => {
            row["variants"] = children("product_variants", "product_id");
        }
        "cart_items" if select.contains("product:") => {
            row["product"] = find("products", text(row.get("product_id")));
            row["variant"] = find("product_variants", text(row.get("variant_id")));
        }
        "orders" if select.contains("order_items(") => {
            row["order_items"] = children("order_items", "order_id");
        }
        _ => {}
    }
    row
}

// =============================================================================
// REST handlers
// =============================================================================

async fn rest_root(State(fake): State<FakeSupabase>, headers: HeaderMap) -> Response {
    match caller(&fake.lock(), &headers) {
        Ok(_) => Json(json!({})).into_response(),
        Err(response) => response,
    }
}

async fn rest_select(
    State(fake): State<FakeSupabase>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let inner = fake.lock();
    let caller = match caller(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let params = Params::parse(pairs);

    let mut rows: Vec<Value> = inner
        .rows(&table)
        .iter()
        .filter(|row| params.matches(row) && can_read(&inner, caller, &table, row))
        .cloned()
        .collect();

    if let Some((column, descending)) = &params.order {
        rows.sort_by_key(|row| text(row.get(column)));
        if *descending {
            rows.reverse();
        }
    }
    if let Some(limit) = params.limit {
        rows.truncate(limit);
    }

    let rows: Vec<Value> = rows
        .into_iter()
        .map(|row| embed(&inner, &table, &params.select, row))
        .collect();
    Json(rows).into_response()
}

async fn rest_insert(
    State(fake): State<FakeSupabase>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = fake.lock();
    let caller = match caller(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let params = Params::parse(pairs);
    let ignore_duplicates = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("ignore-duplicates"));

    let rows = match body {
        Value::Array(rows) => rows,
        row => vec![row],
    };
    if rows.iter().any(|row| !can_write(&inner, caller, &table, row)) {
        return forbidden(&table);
    }

    let mut inserted = Vec::new();
    for row in rows {
        let conflicts = !params.on_conflict.is_empty()
            && inner.rows(&table).iter().any(|existing| {
                params
                    .on_conflict
                    .iter()
                    .all(|column| text(existing.get(column)) == text(row.get(column)))
            });
        if conflicts {
            if ignore_duplicates {
                continue;
            }
            return (
                StatusCode::CONFLICT,
                Json(json!({ "code": "23505", "message": "duplicate key value" })),
            )
                .into_response();
        }
        inserted.push(inner.store(&table, row));
    }

    (StatusCode::CREATED, Json(inserted)).into_response()
}

async fn rest_update(
    State(fake): State<FakeSupabase>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    let mut inner = fake.lock();
    let caller = match caller(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let params = Params::parse(pairs);

    let targets: Vec<usize> = inner
        .rows(&table)
        .iter()
        .enumerate()
        .filter(|(_, row)| params.matches(row) && can_write(&inner, caller, &table, row))
        .map(|(i, _)| i)
        .collect();

    let mut updated = Vec::new();
    if let (Some(rows), Some(patch)) = (inner.tables.get_mut(&table), patch.as_object()) {
        for i in targets {
            if let Some(row) = rows.get_mut(i) {
                for (key, value) in patch {
                    row[key.as_str()] = value.clone();
                }
                updated.push(row.clone());
            }
        }
    }

    Json(updated).into_response()
}

async fn rest_delete(
    State(fake): State<FakeSupabase>,
    Path(table): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let mut inner = fake.lock();
    let caller = match caller(&inner, &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let params = Params::parse(pairs);

    let keep: Vec<Value> = inner
        .rows(&table)
        .iter()
        .filter(|row| !(params.matches(row) && can_write(&inner, caller, &table, row)))
        .cloned()
        .collect();
    inner.tables.insert(table, keep);

    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Auth handlers
// =============================================================================

fn auth_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "msg": message }))).into_response()
}

async fn auth_token(
    State(fake): State<FakeSupabase>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = fake.lock();

    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let Some(user) = inner
                .users
                .iter()
                .find(|u| u.email == email && u.password == password)
            else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_grant",
                        "error_description": "Invalid login credentials",
                    })),
                )
                    .into_response();
            };
            if !user.confirmed {
                return auth_error(
                    StatusCode::BAD_REQUEST,
                    "email_not_confirmed",
                    "Email not confirmed",
                );
            }
            let id = user.id;
            Json(inner.issue_session(id)).into_response()
        }
        Some("refresh_token") => {
            let token = body["refresh_token"].as_str().unwrap_or_default();
            match inner.refresh_tokens.remove(token) {
                Some(id) => {
                    inner.refreshes += 1;
                    Json(inner.issue_session(id)).into_response()
                }
                None => auth_error(
                    StatusCode::BAD_REQUEST,
                    "refresh_token_not_found",
                    "Invalid Refresh Token",
                ),
            }
        }
        _ => auth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Unsupported grant type",
        ),
    }
}

async fn auth_signup(State(fake): State<FakeSupabase>, Json(body): Json<Value>) -> Response {
    let mut inner = fake.lock();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    let full_name = body["data"]["full_name"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    if inner.users.iter().any(|u| u.email == email) {
        return auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "user_already_exists",
            "User already registered",
        );
    }

    let id = Uuid::new_v4();
    let confirmed = !inner.require_confirmation;
    inner.store(
        "profiles",
        json!({ "id": id, "full_name": full_name, "email": email, "phone": null }),
    );
    inner.users.push(User {
        id,
        email,
        password,
        full_name,
        confirmed,
    });

    if confirmed {
        Json(inner.issue_session(id)).into_response()
    } else {
        let user = inner
            .users
            .iter()
            .find(|u| u.id == id)
            .map_or(Value::Null, user_json);
        Json(user).into_response()
    }
}

async fn auth_logout(State(fake): State<FakeSupabase>, headers: HeaderMap) -> StatusCode {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    let mut inner = fake.lock();
    if let Some(user_id) = inner.access_tokens.remove(token) {
        inner.refresh_tokens.retain(|_, id| *id != user_id);
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_filtering() {
        let params = Params::parse(vec![
            ("select".to_string(), "id,status".to_string()),
            ("status".to_string(), "in.(pending,failed)".to_string()),
            ("is_active".to_string(), "eq.true".to_string()),
            ("order".to_string(), "created_at.desc".to_string()),
            ("limit".to_string(), "1".to_string()),
        ]);
        assert_eq!(params.order, Some(("created_at".to_string(), true)));
        assert_eq!(params.limit, Some(1));

        assert!(params.matches(&json!({ "status": "failed", "is_active": true })));
        assert!(!params.matches(&json!({ "status": "paid", "is_active": true })));
        assert!(!params.matches(&json!({ "status": "pending", "is_active": false })));
    }
}
