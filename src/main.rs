use std::{error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tokio::{fs, net, sync::broadcast, task};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use bengkel_queue::{
    ai, api, db, queue, Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await.map_err(|e| {
        format!(
            "configuration required: cannot read config.toml ({e}); \
             see config.example.toml"
        )
    })?;
    let config = toml::from_str::<Config>(&config)?;

    if config.inference.is_none() {
        tracing::warn!(
            "no [inference] section: triage runs on the keyword fallback \
             and invoice scanning is unavailable"
        );
    }

    let (db_client, db_driver) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_driver.await {
            panic!("database connection failed: {e}");
        }
    });
    db_client.listen_for_changes().await?;

    let db_client = Arc::new(db_client);
    let store: Arc<dyn db::Store> = db_client.clone();

    // This process is one reconciliation peer among many: every change to
    // the ticket collection, whoever made it, re-triggers the fill pass.
    task::spawn(reconcile_on_changes(
        db_client.subscribe(),
        Arc::clone(&store),
    ));

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/user", get(get_user))
        .route("/queue", get(get_board).post(check_in))
        .route(
            "/queue/:id",
            patch(apply_action).delete(delete_ticket),
        )
        .route("/recap", get(get_recap))
        .route("/inventory", get(list_inventory).post(add_item))
        .route("/inventory/scan", post(scan_invoice))
        .route("/inventory/restock", post(restock))
        .route(
            "/inventory/:id",
            patch(edit_item).delete(delete_item),
        )
        .layer(cors)
        .with_state(Arc::new(AppState {
            db_client,
            controller: queue::Controller::new(
                Arc::clone(&store),
                ai::Gate::new(config.inference.clone()),
            ),
            scanner: ai::Scanner::new(config.inference),
            store,
            jwt_expiration_time: config.jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
            jwt_encoding_key: EncodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn reconcile_on_changes(
    mut changes: broadcast::Receiver<db::Change>,
    store: Arc<dyn db::Store>,
) {
    loop {
        match changes.recv().await {
            Ok(db::Change) => {
                let pass =
                    queue::fill_slots(store.as_ref(), queue::today_start());
                if let Err(e) = pass.await {
                    tracing::warn!("reconciliation failed: {e}");
                }
            }
            // Missed events are covered by the next pass anyway.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[derive(Deserialize)]
struct AuthInput {
    login: String,
    password: String,
}

async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let password_hash = api::user::PasswordHash::new(&password);

    let user = state
        .db_client
        .get_user_by_login(&login)
        .await?
        .filter(|u| u.password_hash == password_hash)
        .ok_or(E::WrongLoginOrPassword)?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            staff_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::WrongLoginOrPassword => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.staff_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(api::User {
        id: my.id,
        name: my.name,
    }))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

async fn get_board(
    State(state): State<SharedAppState>,
) -> Result<Json<api::ticket::Board>, BoardError> {
    let tickets = state.store.tickets_since(queue::today_start()).await?;

    let busy_slots = tickets
        .iter()
        .filter(|t| t.status == api::ticket::Status::Processing)
        .count();

    Ok(Json(api::ticket::Board {
        busy_slots,
        max_slots: queue::MAX_CONCURRENT_SERVICE,
        tickets: tickets.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, From)]
pub enum BoardError {
    #[from]
    StoreError(db::StoreError),
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        match self {
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInInput {
    customer_name: String,
    issue: String,
}

async fn check_in(
    State(state): State<SharedAppState>,
    Json(CheckInInput {
        customer_name,
        issue,
    }): Json<CheckInInput>,
) -> Result<Json<api::ticket::CheckedIn>, CheckInError> {
    let checked_in = state.controller.check_in(&customer_name, &issue).await?;

    Ok(Json(api::ticket::CheckedIn {
        queue_number: checked_in.queue_number,
        ticket: checked_in.ticket.into(),
    }))
}

#[derive(Debug, From)]
pub enum CheckInError {
    #[from]
    Queue(queue::CheckInError),
}

impl IntoResponse for CheckInError {
    fn into_response(self) -> Response {
        use queue::CheckInError as E;

        let Self::Queue(e) = self;
        match e {
            E::EmptyName | E::EmptyIssue => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "reason": e.to_string() })),
            )
                .into_response(),
            E::Rejected(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "reason": reason })),
            )
                .into_response(),
            E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

#[derive(Deserialize)]
struct ActionInput {
    op: queue::Action,
}

async fn apply_action(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::ticket::Id>,
    Json(ActionInput { op }): Json<ActionInput>,
) -> Result<Json<api::ticket::Status>, ApplyActionError> {
    let status = state.controller.apply(id, op).await?;
    Ok(Json(status))
}

#[derive(Debug, From)]
pub enum ApplyActionError {
    #[from]
    Queue(queue::ActionError),
}

impl IntoResponse for ApplyActionError {
    fn into_response(self) -> Response {
        use queue::ActionError as E;

        let Self::Queue(e) = self;
        match e {
            E::NotFound => StatusCode::NOT_FOUND.into_response(),
            E::Illegal { .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "reason": e.to_string() })),
            )
                .into_response(),
            E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn delete_ticket(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<StatusCode, DeleteTicketError> {
    state.controller.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum DeleteTicketError {
    #[from]
    Queue(queue::RemoveError),
}

impl IntoResponse for DeleteTicketError {
    fn into_response(self) -> Response {
        use queue::RemoveError as E;

        let Self::Queue(e) = self;
        match e {
            E::NotFound => StatusCode::NOT_FOUND.into_response(),
            E::InService(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "reason": e.to_string() })),
            )
                .into_response(),
            E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn get_recap(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<api::ticket::Recap>, RecapError> {
    let history = state.store.tickets_before(queue::today_start()).await?;

    let (finished, unfinished): (Vec<_>, Vec<_>) = history
        .into_iter()
        .partition(|t| t.status == api::ticket::Status::Done);

    Ok(Json(api::ticket::Recap {
        finished: finished.into_iter().map(Into::into).collect(),
        unfinished: unfinished.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, From)]
pub enum RecapError {
    #[from]
    StoreError(db::StoreError),
}

impl IntoResponse for RecapError {
    fn into_response(self) -> Response {
        match self {
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

async fn list_inventory(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<api::inventory::List>, InventoryError> {
    let items = state.db_client.list_inventory().await?;

    Ok(Json(api::inventory::List {
        items: items.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemInput {
    name: String,
    category: Option<String>,
    purchase_price: Option<i64>,
    sale_price: Option<i64>,
    stock: u32,
    supplier: Option<String>,
}

async fn add_item(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Json(input): Json<ItemInput>,
) -> Result<Json<api::InventoryItem>, InventoryError> {
    if input.name.trim().is_empty() {
        return Err(InventoryError::EmptyName);
    }

    let item = db::InventoryItem {
        id: api::inventory::Id::new(),
        name: input.name.trim().to_string(),
        category: input.category,
        purchase_price: input.purchase_price,
        sale_price: input.sale_price,
        stock: input.stock,
        supplier: input.supplier,
    };
    state.db_client.insert_item(&item).await?;

    Ok(Json(item.into()))
}

async fn edit_item(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::inventory::Id>,
    Json(input): Json<ItemInput>,
) -> Result<Json<api::InventoryItem>, InventoryError> {
    if input.name.trim().is_empty() {
        return Err(InventoryError::EmptyName);
    }

    let item = db::InventoryItem {
        id,
        name: input.name.trim().to_string(),
        category: input.category,
        purchase_price: input.purchase_price,
        sale_price: input.sale_price,
        stock: input.stock,
        supplier: input.supplier,
    };
    let updated = state.db_client.update_item(&item).await?;
    if updated == 0 {
        return Err(InventoryError::ItemNotFound);
    }

    Ok(Json(item.into()))
}

async fn delete_item(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::inventory::Id>,
) -> Result<StatusCode, InventoryError> {
    let deleted = state.db_client.delete_item(id).await?;
    if deleted == 0 {
        return Err(InventoryError::ItemNotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum InventoryError {
    #[from]
    DbError(db::Error),
    EmptyName,
    ItemNotFound,
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        match self {
            Self::EmptyName => StatusCode::BAD_REQUEST,
            Self::ItemNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanInput {
    image_base64: String,
    mime_type: Option<String>,
}

async fn scan_invoice(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Json(ScanInput {
        image_base64,
        mime_type,
    }): Json<ScanInput>,
) -> Result<Json<ai::invoice::Scan>, ScanInvoiceError> {
    let mime_type = mime_type.as_deref().unwrap_or("image/jpeg");
    let scan = state.scanner.scan(&image_base64, mime_type).await?;
    Ok(Json(scan))
}

#[derive(Debug, From)]
pub enum ScanInvoiceError {
    #[from]
    Scanner(ai::invoice::Error),
}

impl IntoResponse for ScanInvoiceError {
    fn into_response(self) -> Response {
        use ai::invoice::Error as E;

        let Self::Scanner(e) = self;
        match e {
            E::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            E::Http(_) => StatusCode::BAD_GATEWAY,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestockInput {
    items: Vec<RestockItemInput>,
    supplier: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestockItemInput {
    name: String,
    quantity: u32,
    unit_price: Option<i64>,
    category: Option<String>,
    sale_price: Option<i64>,
}

async fn restock(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Json(RestockInput { items, supplier }): Json<RestockInput>,
) -> Result<Json<api::inventory::RestockOutcome>, RestockError> {
    let mut inserted = 0;
    let mut updated = 0;

    for item in items {
        // Unconfirmed or blank scan lines are skipped, not rejected.
        if item.name.trim().is_empty() || item.quantity == 0 {
            continue;
        }

        match state.db_client.find_item_by_name(item.name.trim()).await? {
            Some(existing) => {
                state
                    .db_client
                    .add_stock(
                        existing.id,
                        item.quantity,
                        item.unit_price,
                        supplier.as_deref(),
                    )
                    .await?;
                updated += 1;
            }
            None => {
                state
                    .db_client
                    .insert_item(&db::InventoryItem {
                        id: api::inventory::Id::new(),
                        name: item.name.trim().to_string(),
                        category: item.category,
                        purchase_price: item.unit_price,
                        sale_price: item.sale_price,
                        stock: item.quantity,
                        supplier: supplier.clone(),
                    })
                    .await?;
                inserted += 1;
            }
        }
    }

    Ok(Json(api::inventory::RestockOutcome { inserted, updated }))
}

#[derive(Debug, From)]
pub enum RestockError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for RestockError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: Arc<db::Client>,

    /// Same client behind a trait handle for the queue core and reads.
    store: Arc<dyn db::Store>,

    controller: queue::Controller,

    scanner: ai::Scanner,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    staff_id: api::user::Id,
    exp: i64,
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
