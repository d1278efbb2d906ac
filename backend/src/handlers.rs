use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, AuthError, LoginChallenges};
use crate::chain::ChainError;
use crate::config::AppConfig;
use crate::detail::{DetailError, PropertyDetail, PropertyDetailView};
use crate::forms::{FormErrors, SubmissionForm};
use crate::gateway::{ContractGateway, GatewayError, MarketListing};
use crate::ipfs::{format_with_gateway, Pinning, PinningError};
use crate::models::{Address, Listing, Notification, Property};
use crate::oracle::PriceOracle;
use crate::session::WalletSessions;
use crate::store::{NotificationStore, PropertyStore, StoreError};
use crate::units::{parse_ether, usd_to_wei, UnitsError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: ContractGateway,
    pub properties: Arc<PropertyStore>,
    pub sessions: Arc<WalletSessions>,
    pub pinning: Arc<dyn Pinning>,
    pub oracle: Arc<dyn PriceOracle>,
    pub challenges: Arc<LoginChallenges>,
}

/// The wallet a request was authenticated as.
#[derive(Clone, Debug)]
pub struct Wallet(pub Address);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("Admin access required")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Detail(#[from] DetailError),
    #[error(transparent)]
    Form(#[from] FormErrors),
    #[error(transparent)]
    Pinning(#[from] PinningError),
    #[error(transparent)]
    Units(#[from] UnitsError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::WalletUnavailable => StatusCode::UNAUTHORIZED,
        GatewayError::AlreadyHandled { .. } => StatusCode::CONFLICT,
        GatewayError::NotAdmin => StatusCode::FORBIDDEN,
        GatewayError::InvalidListing | GatewayError::InvalidProperty | GatewayError::NoProperties => {
            StatusCode::NOT_FOUND
        }
        GatewayError::InvalidAmount(_) | GatewayError::Overflow => StatusCode::BAD_REQUEST,
        GatewayError::Chain(ChainError::Reverted(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::Chain(ChainError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Form(_) | ApiError::Units(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(e) => gateway_status(e),
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::AlreadyHandled(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Gateway(e)) => gateway_status(e),
            ApiError::Detail(DetailError::WalletRequired) => StatusCode::UNAUTHORIZED,
            ApiError::Detail(DetailError::Gateway(e)) => gateway_status(e),
            ApiError::Detail(_) => StatusCode::BAD_REQUEST,
            ApiError::Pinning(PinningError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Pinning(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn bearer_wallet(headers: &HeaderMap, jwt_secret: &str) -> Result<Address, ApiError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))?;
    Ok(auth::validate_token(token, jwt_secret)?)
}

async fn authenticate(
    headers: HeaderMap,
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let wallet = bearer_wallet(&headers, &state.config.jwt_secret)?;
    log::debug!("Authenticated wallet {} for {}", wallet, request.uri());
    request.extensions_mut().insert(Wallet(wallet));
    Ok(next.run(request).await)
}

async fn require_admin(state: &AppState, wallet: &Address) -> Result<(), ApiError> {
    if state.gateway.is_admin(wallet).await {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[derive(Deserialize)]
pub struct ChallengeRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub message: String,
}

/// Issues the message the wallet must `personal_sign` to log in.
pub async fn login_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> ApiResult<ChallengeResponse> {
    let address = Address::parse(&req.address).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let message = state.challenges.issue(&address);
    Ok(Json(ChallengeResponse { message }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub address: String,
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub address: Address,
    pub is_admin: bool,
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let address = Address::parse(&req.address).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if let Err(e) = state.challenges.redeem(&address, &req.signature) {
        log::warn!("Rejected login for {}: {}", address, e);
        return Err(e.into());
    }
    let token = auth::create_token(&address, &state.config.jwt_secret)?;
    state.sessions.connect(&address).await;
    let is_admin = state.gateway.is_admin(&address).await;
    Ok(Json(LoginResponse {
        token,
        address,
        is_admin,
    }))
}

pub async fn logout(State(state): State<AppState>, Extension(Wallet(wallet)): Extension<Wallet>) -> StatusCode {
    state.sessions.disconnect(&wallet).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyPage {
    pub listings: Vec<MarketListing>,
    pub featured: Vec<Property>,
    pub eth_usd: f64,
}

pub async fn buy_page(State(state): State<AppState>) -> ApiResult<BuyPage> {
    let listings = state.gateway.get_all_listings().await?;
    let featured = state.gateway.get_featured_properties(3).await?;
    let eth_usd = state.oracle.eth_usd().await;
    Ok(Json(BuyPage {
        listings,
        featured,
        eth_usd,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    #[serde(flatten)]
    pub form: SubmissionForm,
    pub image_hashes: Vec<String>,
}

pub async fn sell_submit(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Json(req): Json<SellRequest>,
) -> Result<Response, ApiError> {
    let submission = req.form.into_submission(req.image_hashes)?;
    let hash = state.gateway.with_signer(Some(wallet)).submit(submission).await?;
    state.properties.refresh_pending().await;
    Ok((StatusCode::CREATED, Json(json!({ "transactionHash": hash }))).into_response())
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub name: String,
}

pub async fn sell_upload(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty upload".to_string()));
    }
    log::info!("Wallet {} uploading {}", wallet, query.name);
    let hash = state.pinning.pin_file(&query.name, body.to_vec()).await?;
    let url = format_with_gateway(&hash, &state.config.ipfs_gateway);
    Ok(Json(json!({ "hash": hash, "url": url })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPage {
    pub pending_properties: Vec<Property>,
    pub approved_properties: Vec<Property>,
    pub rejected_properties: Vec<Property>,
}

async fn admin_snapshot(store: &PropertyStore) -> AdminPage {
    AdminPage {
        pending_properties: store.pending().await,
        approved_properties: store.approved().await,
        rejected_properties: store.rejected().await,
    }
}

pub async fn admin_page(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
) -> ApiResult<AdminPage> {
    require_admin(&state, &wallet).await?;
    state.properties.refresh().await;
    Ok(Json(admin_snapshot(&state.properties).await))
}

pub async fn admin_approve(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path(id): Path<usize>,
) -> ApiResult<AdminPage> {
    require_admin(&state, &wallet).await?;
    state.properties.approve_property(id, &wallet).await?;
    Ok(Json(admin_snapshot(&state.properties).await))
}

pub async fn admin_reject(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path(id): Path<usize>,
) -> ApiResult<AdminPage> {
    require_admin(&state, &wallet).await?;
    state.properties.reject_property(id, &wallet).await?;
    Ok(Json(admin_snapshot(&state.properties).await))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub property: Property,
    pub wallet_tokens: u64,
    pub listings: Vec<Listing>,
}

impl Holding {
    /// Tokens in the wallet plus those escrowed in its listings.
    pub fn total_tokens(&self) -> u64 {
        self.listings
            .iter()
            .fold(self.wallet_tokens, |total, l| total.saturating_add(l.token_amount))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage {
    pub address: Address,
    pub submitted_properties: Vec<Property>,
    pub holdings: Vec<Holding>,
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub eth_usd: f64,
}

pub async fn profile_page(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
) -> ApiResult<ProfilePage> {
    let submitted_properties = state.gateway.get_user_submitted_properties(&wallet).await;

    let mut holdings = Vec::new();
    for property in state.gateway.get_all_properties().await? {
        let property_id = property.contract_index;
        let listings: Vec<Listing> = state
            .gateway
            .get_active_listings(property_id)
            .await?
            .into_iter()
            .filter(|l| l.seller == wallet)
            .collect();
        let wallet_tokens = state
            .gateway
            .get_user_token_balance(property_id, &wallet)
            .await?
            .whole_tokens();
        let holding = Holding {
            property,
            wallet_tokens,
            listings,
        };
        if holding.total_tokens() > 0 {
            holdings.push(holding);
        }
    }

    let feed = state.sessions.connect(&wallet).await;
    Ok(Json(ProfilePage {
        address: wallet,
        submitted_properties,
        holdings,
        notifications: feed.notifications().await,
        unread_count: feed.unread_count().await,
        eth_usd: state.oracle.eth_usd().await,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileListRequest {
    pub property_id: u64,
    pub amount: u64,
    pub price_usd: f64,
}

/// Lists tokens priced in USD, converted to wei at the live rate.
pub async fn profile_list(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Json(req): Json<ProfileListRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let eth_usd = state.oracle.eth_usd().await;
    let price_per_token = usd_to_wei(req.price_usd, eth_usd)?;
    let receipt = state
        .gateway
        .with_signer(Some(wallet))
        .list_tokens_for_sale(req.property_id, req.amount, price_per_token)
        .await?;
    Ok(Json(json!({ "receipt": receipt, "pricePerToken": price_per_token.to_string(), "ethUsd": eth_usd })))
}

async fn detail_for(state: &AppState, property_id: u64, wallet: Option<Address>) -> PropertyDetail {
    let feed = match &wallet {
        Some(w) => state.sessions.connect(w).await,
        None => Arc::new(NotificationStore::new(state.sessions.storage())),
    };
    PropertyDetail::new(property_id, state.gateway.with_signer(wallet), feed)
}

pub async fn property_page(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> ApiResult<PropertyDetailView> {
    let wallet = if headers.contains_key("Authorization") {
        Some(bearer_wallet(&headers, &state.config.jwt_secret)?)
    } else {
        None
    };
    let detail = detail_for(&state, id, wallet).await;
    Ok(Json(detail.fetch().await?))
}

#[derive(Deserialize)]
pub struct BuyRequest {
    pub amount: u64,
}

pub async fn property_buy(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path(id): Path<u64>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let detail = detail_for(&state, id, Some(wallet)).await;
    let receipt = detail.buy_tokens(req.amount).await?;
    Ok(Json(json!({
        "message": format!("Successfully purchased {} tokens!", receipt.token_amount),
        "receipt": receipt,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub amount: u64,
    pub price_per_token_eth: String,
}

pub async fn property_list(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path(id): Path<u64>,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let price = parse_ether(&req.price_per_token_eth)?;
    let detail = detail_for(&state, id, Some(wallet)).await;
    let receipt = detail.create_listing(req.amount, price).await?;
    Ok(Json(json!({ "message": "Listing created successfully!", "receipt": receipt })))
}

pub async fn listing_buy(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path((id, index)): Path<(u64, usize)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let detail = detail_for(&state, id, Some(wallet)).await;
    let receipt = detail.buy_from_listing(index).await?;
    Ok(Json(json!({
        "message": format!(
            "Successfully purchased {} tokens from listing #{}.",
            receipt.token_amount,
            index + 1
        ),
        "receipt": receipt,
    })))
}

pub async fn listing_cancel(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path((id, index)): Path<(u64, usize)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let detail = detail_for(&state, id, Some(wallet)).await;
    let hash = detail.cancel_listing(index).await?;
    Ok(Json(json!({
        "message": "Listing cancelled and tokens returned to your wallet.",
        "transactionHash": hash,
    })))
}

pub async fn notification_read(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
    Path(key): Path<String>,
) -> Json<serde_json::Value> {
    let feed = state.sessions.connect(&wallet).await;
    feed.mark_as_read(&key).await;
    Json(json!({ "unreadCount": feed.unread_count().await }))
}

pub async fn notification_read_all(
    State(state): State<AppState>,
    Extension(Wallet(wallet)): Extension<Wallet>,
) -> Json<serde_json::Value> {
    let feed = state.sessions.connect(&wallet).await;
    feed.mark_all_as_read().await;
    Json(json!({ "unreadCount": feed.unread_count().await }))
}

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/logout", post(logout))
        .route("/page/sell", post(sell_submit))
        .route("/page/sell/images", post(sell_upload))
        .route("/page/admin", get(admin_page))
        .route("/page/admin/:id/approve", post(admin_approve))
        .route("/page/admin/:id/reject", post(admin_reject))
        .route("/page/profile", get(profile_page))
        .route("/page/profile/list", post(profile_list))
        .route("/page/property/:id/buy", post(property_buy))
        .route("/page/property/:id/listings", post(property_list))
        .route("/page/property/:id/listings/:index/buy", post(listing_buy))
        .route("/page/property/:id/listings/:index/cancel", post(listing_cancel))
        .route("/notifications/read-all", post(notification_read_all))
        .route("/notifications/read/:key", post(notification_read))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(|| async { "Hello, Real Estate Marketplace!" }))
        .route("/login/challenge", post(login_challenge))
        .route("/login", post(login))
        .route("/page/buy", get(buy_page))
        .route("/page/property/:id", get(property_page))
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::{address_of, sign_personal};
    use crate::auth::CHALLENGE_TTL;
    use crate::chain::testing::UnreachableContract;
    use crate::chain::LocalChain;
    use crate::gateway::GatewayOptions;
    use crate::models::{PropertyAttributes, PropertyStatus};
    use k256::ecdsa::SigningKey;
    use crate::oracle::FixedRate;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct StubPinning;

    #[async_trait]
    impl Pinning for StubPinning {
        async fn pin_file(&self, file_name: &str, _contents: Vec<u8>) -> Result<String, PinningError> {
            Ok(format!("Qm{}", file_name.len()))
        }
    }

    fn admin_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn admin() -> Address {
        address_of(admin_key().verifying_key())
    }

    fn seller() -> Address {
        Address::from_index(0xacc0, 1)
    }

    async fn state() -> AppState {
        let vars = HashMap::from([("JWT_SECRET".to_string(), "test-secret".to_string())]);
        let config = AppConfig::from_vars(vars).unwrap();
        let chain = Arc::new(LocalChain::new(admin(), 1_000));
        let gateway = ContractGateway::new(
            chain,
            GatewayOptions {
                sale_price: 1_000,
                ..GatewayOptions::default()
            },
        );
        AppState {
            config: Arc::new(config),
            properties: Arc::new(PropertyStore::load(gateway.clone()).await),
            gateway,
            sessions: Arc::new(WalletSessions::new(Arc::new(MemoryStore::new()), Duration::from_secs(15))),
            pinning: Arc::new(StubPinning),
            oracle: Arc::new(FixedRate(2000.0)),
            challenges: Arc::new(LoginChallenges::new(CHALLENGE_TTL)),
        }
    }

    async fn signed_login(state: &AppState, key: &SigningKey, address: String) -> Result<LoginResponse, ApiError> {
        let Json(challenge) = login_challenge(
            State(state.clone()),
            Json(ChallengeRequest {
                address: address.clone(),
            }),
        )
        .await?;
        let signature = sign_personal(key, &challenge.message);
        let Json(response) = login(State(state.clone()), Json(LoginRequest { address, signature })).await?;
        Ok(response)
    }

    fn form() -> SubmissionForm {
        SubmissionForm {
            apartment_type: "Studio".into(),
            title: "Harbor studio".into(),
            description: "Compact studio with a view over the harbor".into(),
            price: "250000".into(),
            bedrooms: "1".into(),
            bathrooms: "1".into(),
            area: "40".into(),
            address: "3 Quay Rd".into(),
            city: "Portsmouth".into(),
            state: "NH".into(),
            zip_code: "03801".into(),
            ..SubmissionForm::default()
        }
    }

    #[tokio::test]
    async fn sell_then_admin_approve() {
        let state = state().await;
        let request = SellRequest {
            form: form(),
            image_hashes: vec!["QmA".into()],
        };
        let response = sell_submit(State(state.clone()), Extension(Wallet(seller())), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.properties.pending().await.len(), 1);

        let err = admin_page(State(state.clone()), Extension(Wallet(seller()))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let Json(page) = admin_approve(State(state.clone()), Extension(Wallet(admin())), Path(0))
            .await
            .unwrap();
        assert!(page.pending_properties.is_empty());
        assert_eq!(page.approved_properties.len(), 1);
        assert_eq!(page.approved_properties[0].property_address, "3 Quay Rd, Portsmouth, NH 03801");

        let err = admin_reject(State(state), Extension(Wallet(admin())), Path(0)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_form_is_bad_request() {
        let state = state().await;
        let request = SellRequest {
            form: SubmissionForm::default(),
            image_hashes: Vec::new(),
        };
        let err = sell_submit(State(state), Extension(Wallet(seller())), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_issues_token_accepted_by_property_page() {
        let state = state().await;
        let address = admin().to_string().to_uppercase().replace("0X", "0x");
        let login = signed_login(&state, &admin_key(), address).await.unwrap();
        assert!(login.is_admin);
        assert_eq!(state.sessions.connected().await, 1);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {}", login.token).parse().unwrap());
        let err = property_page(State(state.clone()), Path(0), headers).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let mut bad = HeaderMap::new();
        bad.insert("Authorization", "Token abc".parse().unwrap());
        let err = property_page(State(state), Path(0), bad).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_without_valid_signature_is_unauthorized() {
        let state = state().await;
        let unsigned = login(
            State(state.clone()),
            Json(LoginRequest {
                address: admin().to_string(),
                signature: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let impostor = SigningKey::from_slice(&[8u8; 32]).unwrap();
        let err = signed_login(&state, &impostor, admin().to_string()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        login_challenge(
            State(state.clone()),
            Json(ChallengeRequest {
                address: admin().to_string(),
            }),
        )
        .await
        .unwrap();
        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                address: admin().to_string(),
                signature: "0xdeadbeef".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.sessions.connected().await, 0);
    }

    #[tokio::test]
    async fn unreachable_node_is_bad_gateway() {
        let mut state = state().await;
        state.gateway = ContractGateway::new(Arc::new(UnreachableContract::new()), GatewayOptions::default());
        let err = buy_page(State(state)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn holding_total_saturates() {
        let listing = |listing_index, token_amount| Listing {
            property_id: 0,
            listing_index,
            seller: seller(),
            token_amount,
            price_per_token: 1,
        };
        let property = Property {
            id: 0,
            contract_index: 0,
            property_address: "3 Quay Rd".into(),
            value: "250000".into(),
            token_address: None,
            property_image_urls: Vec::new(),
            document_urls: Vec::new(),
            status: PropertyStatus::Approved,
            original_owner: Some(seller()),
            attributes: PropertyAttributes::default(),
            pending_confirmation: false,
        };
        let holding = Holding {
            property,
            wallet_tokens: u64::MAX - 1,
            listings: vec![listing(0, 5), listing(1, 7)],
        };
        assert_eq!(holding.total_tokens(), u64::MAX);
    }

    #[tokio::test]
    async fn upload_returns_gateway_url() {
        let state = state().await;
        let Json(body) = sell_upload(
            State(state),
            Extension(Wallet(seller())),
            Query(UploadQuery { name: "front.jpg".into() }),
            Bytes::from_static(b"jpeg"),
        )
        .await
        .unwrap();
        assert_eq!(body["hash"], "Qm9");
        assert_eq!(body["url"], "https://gateway.pinata.cloud/ipfs/Qm9");
    }
}
