//! Translates marketplace intents into contract calls and reshapes the results.

use serde::Serialize;
use std::sync::Arc;

use crate::chain::{ChainError, MarketplaceContract, PropertyRecord, RevertCode, Submission, TxHash};
use crate::ipfs::{format_with_gateway, DEFAULT_GATEWAY};
use crate::models::{Address, Listing, Property, PropertyAttributes, PropertyStatus, Wei};
use crate::units::{format_units, parse_units, pow10, ETHER_DECIMALS};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Ethereum provider not available")]
    WalletUnavailable,
    #[error("Property #{index} was already approved or rejected")]
    AlreadyHandled { index: u64 },
    #[error("Only the contract owner can review properties")]
    NotAdmin,
    #[error("Invalid listing index")]
    InvalidListing,
    #[error("Invalid property ID")]
    InvalidProperty,
    #[error("No properties found")]
    NoProperties,
    #[error("{0}")]
    InvalidAmount(&'static str),
    #[error("Total cost overflows")]
    Overflow,
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl GatewayError {
    fn from_review(index: u64, err: ChainError) -> Self {
        match err.revert_code() {
            Some(RevertCode::AlreadyHandled) => GatewayError::AlreadyHandled { index },
            Some(RevertCode::NotOwner) => GatewayError::NotAdmin,
            _ => GatewayError::Chain(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub ipfs_gateway: String,
    /// Initial-sale price per whole token, in wei.
    pub sale_price: Wei,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            ipfs_gateway: DEFAULT_GATEWAY.to_string(),
            sale_price: 50 * 10u128.pow(18),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingReceipt {
    pub approval_hash: TxHash,
    pub listing_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub transaction_hash: TxHash,
    pub token_amount: u64,
    #[serde(with = "crate::units::wei_string")]
    pub total_cost: Wei,
    pub seller: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    #[serde(with = "crate::units::wei_string")]
    pub raw: Wei,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn whole_tokens(&self) -> u64 {
        let scale = pow10(self.decimals).unwrap_or(1);
        u64::try_from(self.raw / scale).unwrap_or(u64::MAX)
    }

    pub fn display(&self) -> String {
        format_units(self.raw, self.decimals)
    }
}

/// A listing joined with the property it sells.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketListing {
    pub property_address: String,
    pub token_address: Option<Address>,
    pub value: String,
    #[serde(flatten)]
    pub listing: Listing,
}

#[derive(Clone)]
pub struct ContractGateway {
    contract: Arc<dyn MarketplaceContract>,
    options: GatewayOptions,
    signer: Option<Address>,
}

impl ContractGateway {
    pub fn new(contract: Arc<dyn MarketplaceContract>, options: GatewayOptions) -> Self {
        Self {
            contract,
            options,
            signer: None,
        }
    }

    /// A handle acting on behalf of `account`; `None` models a disconnected wallet.
    pub fn with_signer(&self, account: Option<Address>) -> Self {
        Self {
            contract: Arc::clone(&self.contract),
            options: self.options.clone(),
            signer: account,
        }
    }

    pub fn account(&self) -> Option<&Address> {
        self.signer.as_ref()
    }

    pub fn sale_price(&self) -> Wei {
        self.options.sale_price
    }

    fn signer(&self) -> Result<&Address, GatewayError> {
        self.signer.as_ref().ok_or(GatewayError::WalletUnavailable)
    }

    fn to_property(&self, id: usize, contract_index: u64, record: &PropertyRecord, status: PropertyStatus) -> Property {
        let gateway = &self.options.ipfs_gateway;
        Property {
            id,
            contract_index,
            property_address: record.property_address.clone(),
            value: format_units(record.value, ETHER_DECIMALS),
            token_address: record.token_address.clone(),
            property_image_urls: record.image_urls.iter().map(|u| format_with_gateway(u, gateway)).collect(),
            document_urls: record.document_urls.iter().map(|u| format_with_gateway(u, gateway)).collect(),
            status,
            original_owner: Some(record.original_owner.clone()),
            attributes: record.attributes.clone(),
            pending_confirmation: false,
        }
    }

    pub async fn submit_property(
        &self,
        property_address: &str,
        value_usd: Wei,
        image_urls: Vec<String>,
    ) -> Result<TxHash, GatewayError> {
        self.submit(Submission {
            property_address: property_address.to_string(),
            value: value_usd,
            image_urls,
            document_urls: Vec::new(),
            attributes: PropertyAttributes::default(),
        })
        .await
    }

    pub async fn submit(&self, submission: Submission) -> Result<TxHash, GatewayError> {
        let from = self.signer()?;
        log::info!("Submitting property {:?} for approval from {}", submission.property_address, from);
        let hash = self.contract.submit_property_for_approval(from, submission).await?;
        Ok(hash)
    }

    /// Pending submissions; an unreachable contract yields an empty list.
    pub async fn get_pending_properties(&self) -> Vec<Property> {
        match self.contract.get_pending_properties().await {
            Ok(pending) => pending
                .iter()
                .enumerate()
                .map(|(id, (index, record))| self.to_property(id, *index, record, PropertyStatus::Pending))
                .collect(),
            Err(e) => {
                log::warn!("Failed to fetch pending properties: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn approve_property(&self, index: u64) -> Result<TxHash, GatewayError> {
        let from = self.signer()?;
        log::info!("Approving pending property {}", index);
        self.contract
            .approve_and_tokenize_property(from, index)
            .await
            .map_err(|e| GatewayError::from_review(index, e))
    }

    pub async fn reject_property(&self, index: u64) -> Result<TxHash, GatewayError> {
        let from = self.signer()?;
        log::info!("Rejecting pending property {}", index);
        self.contract
            .disapprove_property(from, index)
            .await
            .map_err(|e| GatewayError::from_review(index, e))
    }

    pub async fn get_all_properties(&self) -> Result<Vec<Property>, GatewayError> {
        let records = self.contract.get_properties().await?;
        Ok(records
            .iter()
            .enumerate()
            .map(|(id, record)| self.to_property(id, id as u64, record, PropertyStatus::Approved))
            .collect())
    }

    pub async fn get_property(&self, property_id: u64) -> Result<Property, GatewayError> {
        let records = self.contract.get_properties().await?;
        let id = usize::try_from(property_id).map_err(|_| GatewayError::InvalidProperty)?;
        records
            .get(id)
            .map(|record| self.to_property(id, property_id, record, PropertyStatus::Approved))
            .ok_or(GatewayError::InvalidProperty)
    }

    pub async fn get_active_listings(&self, property_id: u64) -> Result<Vec<Listing>, GatewayError> {
        let listings = self.contract.get_listings(property_id).await?;
        Ok(listings
            .into_iter()
            .enumerate()
            .map(|(listing_index, l)| Listing {
                property_id,
                listing_index,
                seller: l.seller,
                token_amount: l.token_amount,
                price_per_token: l.price_per_token,
            })
            .collect())
    }

    pub async fn get_all_listings(&self) -> Result<Vec<MarketListing>, GatewayError> {
        let properties = self.get_all_properties().await?;
        let mut all = Vec::new();
        for property in properties {
            for listing in self.get_active_listings(property.contract_index).await? {
                all.push(MarketListing {
                    property_address: property.property_address.clone(),
                    token_address: property.token_address.clone(),
                    value: property.value.clone(),
                    listing,
                });
            }
        }
        Ok(all)
    }

    async fn token_of(&self, property_id: u64) -> Result<Address, GatewayError> {
        let property = self.get_property(property_id).await?;
        property.token_address.ok_or(GatewayError::InvalidProperty)
    }

    pub async fn get_user_token_balance(&self, property_id: u64, user: &Address) -> Result<TokenBalance, GatewayError> {
        let token = self.token_of(property_id).await?;
        let raw = self.contract.balance_of(&token, user).await?;
        let decimals = self.contract.decimals(&token).await?;
        Ok(TokenBalance { raw, decimals })
    }

    /// Escrows `amount` whole tokens: an allowance confirmation followed by the listing itself.
    pub async fn list_tokens_for_sale(
        &self,
        property_id: u64,
        amount: u64,
        price_per_token: Wei,
    ) -> Result<ListingReceipt, GatewayError> {
        if amount == 0 {
            return Err(GatewayError::InvalidAmount("Token amount must be greater than 0"));
        }
        if price_per_token == 0 {
            return Err(GatewayError::InvalidAmount("Price per token must be greater than 0"));
        }
        let from = self.signer()?;
        let token = self.token_of(property_id).await?;
        let decimals = self.contract.decimals(&token).await?;
        let allowance = pow10(decimals)
            .and_then(|scale| Wei::from(amount).checked_mul(scale))
            .ok_or(GatewayError::Overflow)?;

        log::info!("Step 1 of 2: approving {} tokens of property {} for escrow", amount, property_id);
        let approval_hash = self
            .contract
            .approve(from, &token, &self.contract.factory_address(), allowance)
            .await?;
        log::info!("Step 2 of 2: listing {} tokens at {} wei each", amount, price_per_token);
        let listing_hash = self
            .contract
            .list_for_sale(from, property_id, amount, price_per_token)
            .await?;
        Ok(ListingReceipt {
            approval_hash,
            listing_hash,
        })
    }

    /// Buys a whole listing, paying exactly `token_amount * price_per_token` wei.
    pub async fn buy_from_listing(&self, property_id: u64, listing_index: usize) -> Result<PurchaseReceipt, GatewayError> {
        let from = self.signer()?;
        let listings = self.contract.get_listings(property_id).await?;
        let listing = listings.get(listing_index).ok_or(GatewayError::InvalidListing)?;
        let total_cost = Wei::from(listing.token_amount)
            .checked_mul(listing.price_per_token)
            .ok_or(GatewayError::Overflow)?;

        log::info!(
            "Buying {} tokens from listing #{} of property {} for {} wei",
            listing.token_amount,
            listing_index,
            property_id,
            total_cost
        );
        let transaction_hash = self
            .contract
            .buy_from_listing(from, property_id, listing_index, total_cost)
            .await?;
        Ok(PurchaseReceipt {
            transaction_hash,
            token_amount: listing.token_amount,
            total_cost,
            seller: Some(listing.seller.clone()),
        })
    }

    pub async fn buy_tokens_from_sale(&self, property_id: u64, amount: u64) -> Result<PurchaseReceipt, GatewayError> {
        if amount == 0 {
            return Err(GatewayError::InvalidAmount("Token amount must be greater than 0"));
        }
        let from = self.signer()?;
        let total_cost = Wei::from(amount)
            .checked_mul(self.options.sale_price)
            .ok_or(GatewayError::Overflow)?;
        let transaction_hash = self.contract.buy_from_sale(from, property_id, amount, total_cost).await?;
        Ok(PurchaseReceipt {
            transaction_hash,
            token_amount: amount,
            total_cost,
            seller: None,
        })
    }

    pub async fn cancel_listing(&self, property_id: u64, listing_index: usize) -> Result<TxHash, GatewayError> {
        let from = self.signer()?;
        let hash = self.contract.cancel_listing(from, property_id, listing_index).await?;
        Ok(hash)
    }

    /// True when `address` owns the factory contract. Errors count as false.
    pub async fn is_admin(&self, address: &Address) -> bool {
        match self.contract.owner().await {
            Ok(owner) => &owner == address,
            Err(e) => {
                log::warn!("Failed to read contract owner: {}", e);
                false
            }
        }
    }

    /// Pending and approved properties originally submitted by `user`.
    pub async fn get_user_submitted_properties(&self, user: &Address) -> Vec<Property> {
        let mine = |p: &Property| p.original_owner.as_ref() == Some(user);
        let mut submitted: Vec<Property> = self.get_pending_properties().await.into_iter().filter(mine).collect();
        match self.get_all_properties().await {
            Ok(approved) => submitted.extend(approved.into_iter().filter(mine)),
            Err(e) => {
                log::warn!("Failed to fetch submitted properties for {}: {}", user, e);
                return Vec::new();
            }
        }
        submitted
    }

    pub async fn get_featured_properties(&self, limit: usize) -> Result<Vec<Property>, GatewayError> {
        let mut properties = self.get_all_properties().await?;
        properties.sort_by_key(|p| std::cmp::Reverse(parse_units(&p.value, ETHER_DECIMALS).unwrap_or(0)));
        properties.truncate(limit);
        Ok(properties)
    }

    pub async fn get_latest_property(&self) -> Result<Property, GatewayError> {
        self.get_all_properties().await?.pop().ok_or(GatewayError::NoProperties)
    }
}
