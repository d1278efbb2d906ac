use std::net::SocketAddr;
use std::sync::Arc;

use estate_client::auth::{LoginChallenges, CHALLENGE_TTL};
use estate_client::chain::{LocalChain, MarketplaceContract};
use estate_client::config::AppConfig;
use estate_client::gateway::{ContractGateway, GatewayOptions};
use estate_client::handlers::{self, AppState};
use estate_client::ipfs::PinataClient;
use estate_client::models::Address;
use estate_client::oracle::CoinGeckoOracle;
use estate_client::session::WalletSessions;
use estate_client::store::{FileStore, PropertyStore};
use estate_client::units::parse_ether;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: port={} gateway={}", config.port, config.ipfs_gateway);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    let admin = Address::parse(&config.admin_address)?;
    let sale_price = parse_ether(&config.token_sale_price_eth)?;
    let chain = Arc::new(LocalChain::new(admin.clone(), sale_price));
    log::info!("Factory {} owned by {}", chain.factory_address(), admin);

    let gateway = ContractGateway::new(
        chain,
        GatewayOptions {
            ipfs_gateway: config.ipfs_gateway.clone(),
            sale_price,
        },
    );
    let properties = Arc::new(PropertyStore::load(gateway.clone()).await);
    let storage = Arc::new(FileStore::new(&config.notification_store));
    let sessions = Arc::new(WalletSessions::new(storage, config.poll_period()));
    let pinning = Arc::new(PinataClient::new(
        config.pinata_api_url.clone(),
        config.pinata_api_key.clone(),
        config.pinata_secret_api_key.clone(),
    ));
    let oracle = Arc::new(CoinGeckoOracle::new(config.price_oracle_url.clone()));

    log::info!("Starting server on {}", addr);

    let state = AppState {
        config: Arc::new(config),
        gateway,
        properties,
        sessions,
        pinning,
        oracle,
        challenges: Arc::new(LoginChallenges::new(CHALLENGE_TTL)),
    };
    let app = handlers::router(state);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service()).await?;

    Ok(())
}
