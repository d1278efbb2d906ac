//! Single-property view and the purchase/listing actions taken from it.

use serde::Serialize;
use std::sync::Arc;

use crate::chain::TxHash;
use crate::gateway::{ContractGateway, GatewayError, ListingReceipt, PurchaseReceipt};
use crate::models::{Address, Listing, Notification, NotificationKind, Property, Wei};
use crate::store::NotificationStore;
use crate::units::{format_ether, parse_units, pow10, ETHER_DECIMALS};

pub use crate::units::TOKEN_PRICE_USD;

#[derive(Debug, thiserror::Error)]
pub enum DetailError {
    #[error("Please connect your wallet first")]
    WalletRequired,
    #[error("Please enter a valid token amount")]
    InvalidAmount,
    #[error("Please enter a valid price")]
    InvalidPrice,
    #[error("You don't have enough tokens")]
    InsufficientTokens,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub price_per_token_eth: String,
    pub total_cost_eth: String,
}

impl From<Listing> for ListingView {
    fn from(listing: Listing) -> Self {
        let total = listing.total_cost().map(format_ether).unwrap_or_default();
        Self {
            price_per_token_eth: format_ether(listing.price_per_token),
            total_cost_eth: total,
            listing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetailView {
    pub property: Property,
    pub listings: Vec<ListingView>,
    pub account: Option<Address>,
    /// Whole tokens in the caller's wallet.
    pub user_balance: u64,
    pub total_tokens: u64,
}

fn with_display_defaults(mut property: Property) -> Property {
    let attrs = &mut property.attributes;
    if attrs.title.is_empty() {
        attrs.title = "Not Available".into();
    }
    if attrs.description.is_empty() {
        attrs.description = "No description provided.".into();
    }
    if attrs.property_type.is_empty() {
        attrs.property_type = "Type not specified".into();
    }
    if attrs.apartment_type.is_empty() {
        attrs.apartment_type = "Type not specified".into();
    }
    if attrs.amenities.is_empty() {
        attrs.amenities = vec!["None listed".into()];
    }
    if property.property_address.is_empty() {
        property.property_address = "Address not provided".into();
    }
    property
}

/// Whole tokens minted for a valuation at the fixed USD token price.
pub fn total_tokens(value: &str) -> u64 {
    let scale = pow10(ETHER_DECIMALS).unwrap_or(1);
    let usd = parse_units(value, ETHER_DECIMALS).unwrap_or(0) / scale;
    u64::try_from(usd / TOKEN_PRICE_USD).unwrap_or(u64::MAX)
}

/// Workflow for one property page, acting as the gateway's signer.
pub struct PropertyDetail {
    property_id: u64,
    gateway: ContractGateway,
    notifications: Arc<NotificationStore>,
}

impl PropertyDetail {
    pub fn new(property_id: u64, gateway: ContractGateway, notifications: Arc<NotificationStore>) -> Self {
        Self {
            property_id,
            gateway,
            notifications,
        }
    }

    fn account(&self) -> Result<Address, DetailError> {
        self.gateway.account().cloned().ok_or(DetailError::WalletRequired)
    }

    pub async fn fetch(&self) -> Result<PropertyDetailView, DetailError> {
        let property = with_display_defaults(self.gateway.get_property(self.property_id).await?);
        let listings = self
            .gateway
            .get_active_listings(self.property_id)
            .await?
            .into_iter()
            .map(ListingView::from)
            .collect();
        let account = self.gateway.account().cloned();
        let user_balance = match &account {
            Some(user) => self.balance(user).await?,
            None => 0,
        };
        Ok(PropertyDetailView {
            total_tokens: total_tokens(&property.value),
            property,
            listings,
            account,
            user_balance,
        })
    }

    async fn balance(&self, user: &Address) -> Result<u64, DetailError> {
        Ok(self
            .gateway
            .get_user_token_balance(self.property_id, user)
            .await?
            .whole_tokens())
    }

    async fn property_name(&self) -> String {
        match self.gateway.get_property(self.property_id).await {
            Ok(p) if !p.attributes.title.is_empty() => p.attributes.title,
            _ => format!("Property #{}", self.property_id + 1),
        }
    }

    /// Buys from the initial sale, then notifies the original owner and the buyer.
    pub async fn buy_tokens(&self, amount: u64) -> Result<PurchaseReceipt, DetailError> {
        let buyer = self.account()?;
        if amount == 0 {
            return Err(DetailError::InvalidAmount);
        }
        let property = self.gateway.get_property(self.property_id).await?;
        let receipt = self.gateway.buy_tokens_from_sale(self.property_id, amount).await?;
        log::info!("Purchased {} tokens of property {}", amount, self.property_id);

        let name = self.property_name().await;
        let cost = format_ether(receipt.total_cost);
        if let Some(owner) = property.original_owner.filter(|owner| owner != &buyer) {
            let note = Notification::new(NotificationKind::PropertySold, self.property_id, amount, buyer.clone(), cost.clone())
                .with_property_name(name.clone());
            self.notifications.add_notification(note, &owner).await;
        }
        let note = Notification::new(NotificationKind::PropertyPurchased, self.property_id, amount, buyer.clone(), cost)
            .with_property_name(name)
            .with_transaction(receipt.transaction_hash.clone());
        self.notifications.add_notification(note, &buyer).await;
        Ok(receipt)
    }

    pub async fn create_listing(&self, amount: u64, price_per_token: Wei) -> Result<ListingReceipt, DetailError> {
        let seller = self.account()?;
        if amount == 0 {
            return Err(DetailError::InvalidAmount);
        }
        if price_per_token == 0 {
            return Err(DetailError::InvalidPrice);
        }
        if amount > self.balance(&seller).await? {
            return Err(DetailError::InsufficientTokens);
        }
        Ok(self
            .gateway
            .list_tokens_for_sale(self.property_id, amount, price_per_token)
            .await?)
    }

    /// Buys a resale listing, then notifies the seller and the buyer.
    pub async fn buy_from_listing(&self, listing_index: usize) -> Result<PurchaseReceipt, DetailError> {
        let buyer = self.account()?;
        let receipt = self.gateway.buy_from_listing(self.property_id, listing_index).await?;
        log::info!(
            "Purchased {} tokens from listing #{} of property {}",
            receipt.token_amount,
            listing_index,
            self.property_id
        );

        let name = self.property_name().await;
        let cost = format_ether(receipt.total_cost);
        if let Some(seller) = receipt.seller.clone().filter(|seller| seller != &buyer) {
            let note = Notification::new(
                NotificationKind::TokenSoldInResale,
                self.property_id,
                receipt.token_amount,
                buyer.clone(),
                cost.clone(),
            )
            .with_property_name(name.clone());
            self.notifications.add_notification(note, &seller).await;
        }
        let mut note = Notification::new(
            NotificationKind::PurchaseConfirmationResale,
            self.property_id,
            receipt.token_amount,
            buyer.clone(),
            cost,
        )
        .with_property_name(name)
        .with_transaction(receipt.transaction_hash.clone());
        if let Some(seller) = receipt.seller.clone() {
            note = note.with_seller(seller);
        }
        self.notifications.add_notification(note, &buyer).await;
        Ok(receipt)
    }

    pub async fn cancel_listing(&self, listing_index: usize) -> Result<TxHash, DetailError> {
        self.account()?;
        let hash = self.gateway.cancel_listing(self.property_id, listing_index).await?;
        log::info!("Listing #{} of property {} cancelled", listing_index, self.property_id);
        Ok(hash)
    }
}
