use std::sync::Arc;

use estate_client::chain::LocalChain;
use estate_client::detail::PropertyDetail;
use estate_client::gateway::{ContractGateway, GatewayOptions};
use estate_client::models::{Address, NotificationKind, PropertyStatus};
use estate_client::store::{KeyValueStore, MemoryStore, NotificationStore, PropertyStore, StoreError};
use estate_client::units::{parse_ether, parse_units, ETHER_DECIMALS};

fn admin() -> Address {
    Address::parse("0xad000000000000000000000000000000000000ad").unwrap()
}

fn seller() -> Address {
    Address::parse("0x5e11e5000000000000000000000000000000005e").unwrap()
}

fn buyer() -> Address {
    Address::parse("0xb0b0000000000000000000000000000000000b0b").unwrap()
}

fn setup() -> (Arc<LocalChain>, ContractGateway) {
    let chain = Arc::new(LocalChain::new(admin(), parse_ether("0.01").unwrap()));
    let gateway = ContractGateway::new(
        chain.clone(),
        GatewayOptions {
            sale_price: chain.sale_price(),
            ..GatewayOptions::default()
        },
    );
    (chain, gateway)
}

async fn submit(gateway: &ContractGateway, street: &str, usd: &str) {
    gateway
        .with_signer(Some(seller()))
        .submit_property(street, parse_units(usd, ETHER_DECIMALS).unwrap(), vec!["Qm123".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn submitted_property_appears_pending_with_gateway_image() {
    let (_, gateway) = setup();
    submit(&gateway, "1 Main St", "500000").await;

    let store = PropertyStore::load(gateway).await;
    let pending = store.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].value, "500000");
    assert_eq!(pending[0].status, PropertyStatus::Pending);
    assert_eq!(
        pending[0].property_image_urls,
        vec!["https://gateway.pinata.cloud/ipfs/Qm123".to_string()]
    );
    assert!(store.approved().await.is_empty());
}

#[tokio::test]
async fn admin_review_moves_entries_between_collections() {
    let (_, gateway) = setup();
    submit(&gateway, "1 Main St", "500000").await;
    submit(&gateway, "2 Side St", "100000").await;
    let store = PropertyStore::load(gateway.clone()).await;

    store.approve_property(0, &admin()).await.unwrap();
    let approved = store.approved().await;
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].property_address, "1 Main St");
    assert!(!approved[0].pending_confirmation);

    let pending = store.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, 0);
    assert_eq!(pending[0].property_address, "2 Side St");

    store.reject_property(0, &admin()).await.unwrap();
    assert!(store.pending().await.is_empty());
    let rejected = store.rejected().await;
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].status, PropertyStatus::Rejected);

    assert!(matches!(store.approve_property(0, &admin()).await, Err(StoreError::NotFound(0))));
}

#[tokio::test]
async fn non_owner_review_rolls_back() {
    let (_, gateway) = setup();
    submit(&gateway, "1 Main St", "500000").await;
    let store = PropertyStore::load(gateway).await;

    assert!(store.approve_property(0, &seller()).await.is_err());
    assert_eq!(store.pending().await.len(), 1);
    assert!(store.approved().await.is_empty());
}

#[tokio::test]
async fn resale_charges_exact_cost_and_notifies_both_sides() {
    let (chain, gateway) = setup();
    submit(&gateway, "1 Main St", "500000").await;
    gateway.with_signer(Some(admin())).approve_property(0).await.unwrap();

    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let seller_feed = Arc::new(NotificationStore::for_account(storage.clone(), seller()).await);
    let buyer_feed = Arc::new(NotificationStore::for_account(storage.clone(), buyer()).await);
    let as_seller = PropertyDetail::new(0, gateway.with_signer(Some(seller())), seller_feed.clone());
    let as_buyer = PropertyDetail::new(0, gateway.with_signer(Some(buyer())), buyer_feed.clone());

    let bought = as_seller.buy_tokens(20).await.unwrap();
    assert_eq!(bought.total_cost, parse_ether("0.2").unwrap());
    let purchased = seller_feed.notifications().await;
    assert_eq!(purchased.len(), 1);
    assert_eq!(purchased[0].kind, NotificationKind::PropertyPurchased);

    as_seller.create_listing(10, parse_ether("0.01").unwrap()).await.unwrap();
    as_seller.create_listing(5, parse_ether("0.01").unwrap()).await.unwrap();
    let view = as_buyer.fetch().await.unwrap();
    assert_eq!(view.listings.len(), 2);
    assert_eq!(view.listings[1].total_cost_eth, "0.05");
    assert_eq!(view.total_tokens, 10_000);

    let receipt = as_buyer.buy_from_listing(1).await.unwrap();
    assert_eq!(receipt.total_cost, parse_ether("0.05").unwrap());
    assert_eq!(receipt.token_amount, 5);
    assert_eq!(receipt.seller, Some(seller()));
    assert_eq!(chain.ether_balance(&seller()), parse_ether("0.05").unwrap());

    let view = as_buyer.fetch().await.unwrap();
    assert_eq!(view.user_balance, 5);
    assert_eq!(view.listings.len(), 1);
    assert_eq!(view.listings[0].listing.token_amount, 10);

    let confirmations = buyer_feed.notifications().await;
    assert_eq!(confirmations[0].kind, NotificationKind::PurchaseConfirmationResale);
    assert_eq!(confirmations[0].seller_address, Some(seller()));
    assert_eq!(buyer_feed.unread_count().await, 1);

    seller_feed.load().await;
    let feed = seller_feed.notifications().await;
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].kind, NotificationKind::TokenSoldInResale);
    assert_eq!(feed[0].buyer_address, buyer());
    assert_eq!(feed[0].total_cost, "0.05");

    seller_feed.mark_all_as_read().await;
    assert_eq!(seller_feed.unread_count().await, 0);
}

#[tokio::test]
async fn cancelled_listing_returns_tokens() {
    let (_, gateway) = setup();
    submit(&gateway, "1 Main St", "500000").await;
    gateway.with_signer(Some(admin())).approve_property(0).await.unwrap();

    let feed = Arc::new(NotificationStore::new(Arc::new(MemoryStore::new())));
    let as_seller = PropertyDetail::new(0, gateway.with_signer(Some(seller())), feed);
    as_seller.buy_tokens(8).await.unwrap();
    as_seller.create_listing(8, parse_ether("0.02").unwrap()).await.unwrap();
    assert_eq!(as_seller.fetch().await.unwrap().user_balance, 0);

    let as_buyer = gateway.with_signer(Some(buyer()));
    assert!(as_buyer.cancel_listing(0, 0).await.is_err());

    as_seller.cancel_listing(0).await.unwrap();
    let view = as_seller.fetch().await.unwrap();
    assert_eq!(view.user_balance, 8);
    assert!(view.listings.is_empty());
}
