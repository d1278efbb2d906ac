//! The factory contract's call surface, and an in-process ledger implementing it.

mod local;
#[cfg(test)]
pub(crate) mod testing;

pub use local::LocalChain;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Address, PropertyAttributes, Wei};

pub type TxHash = String;

/// Structured reason attached to a reverted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevertCode {
    AlreadyHandled,
    NotOwner,
    InvalidProperty,
    InvalidListing,
    InvalidAmount,
    InsufficientAllowance,
    InsufficientBalance,
    IncorrectPayment,
    NotSeller,
}

impl RevertCode {
    pub fn message(&self) -> &'static str {
        match self {
            RevertCode::AlreadyHandled => "Already handled or invalid",
            RevertCode::NotOwner => "Ownable: caller is not the owner",
            RevertCode::InvalidProperty => "Invalid property ID",
            RevertCode::InvalidListing => "Invalid listing index",
            RevertCode::InvalidAmount => "Amount must be greater than 0",
            RevertCode::InsufficientAllowance => "ERC20: insufficient allowance",
            RevertCode::InsufficientBalance => "Insufficient token balance",
            RevertCode::IncorrectPayment => "Incorrect ETH amount sent",
            RevertCode::NotSeller => "Only the seller can cancel this listing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("execution reverted: {}", .0.message())]
    Reverted(RevertCode),
    #[error("Ethereum provider not available: {0}")]
    Unavailable(String),
}

impl ChainError {
    pub fn revert_code(&self) -> Option<RevertCode> {
        match self {
            ChainError::Reverted(code) => Some(*code),
            ChainError::Unavailable(_) => None,
        }
    }
}

/// Arguments of `submitPropertyForApproval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub property_address: String,
    /// USD valuation, 18-decimal fixed point.
    pub value: Wei,
    pub image_urls: Vec<String>,
    pub document_urls: Vec<String>,
    pub attributes: PropertyAttributes,
}

/// A property struct as returned by the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub property_address: String,
    pub value: Wei,
    pub token_address: Option<Address>,
    pub image_urls: Vec<String>,
    pub document_urls: Vec<String>,
    pub original_owner: Address,
    pub attributes: PropertyAttributes,
    pub approved: bool,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub seller: Address,
    pub token_amount: u64,
    pub price_per_token: Wei,
}

/// Calls exposed by the factory contract and its per-property tokens.
///
/// Mutating calls take the sending account; `value` arguments are the ether
/// attached to the transaction.
#[async_trait]
pub trait MarketplaceContract: Send + Sync {
    fn factory_address(&self) -> Address;

    async fn owner(&self) -> Result<Address, ChainError>;

    /// Approved, tokenized properties; position is the property id.
    async fn get_properties(&self) -> Result<Vec<PropertyRecord>, ChainError>;

    /// Submissions awaiting review, paired with their pending index.
    async fn get_pending_properties(&self) -> Result<Vec<(u64, PropertyRecord)>, ChainError>;

    async fn get_listings(&self, property_id: u64) -> Result<Vec<ListingRecord>, ChainError>;

    async fn submit_property_for_approval(
        &self,
        from: &Address,
        submission: Submission,
    ) -> Result<TxHash, ChainError>;

    async fn approve_and_tokenize_property(
        &self,
        from: &Address,
        pending_index: u64,
    ) -> Result<TxHash, ChainError>;

    async fn disapprove_property(&self, from: &Address, pending_index: u64) -> Result<TxHash, ChainError>;

    async fn list_for_sale(
        &self,
        from: &Address,
        property_id: u64,
        token_amount: u64,
        price_per_token: Wei,
    ) -> Result<TxHash, ChainError>;

    async fn buy_from_listing(
        &self,
        from: &Address,
        property_id: u64,
        listing_index: usize,
        value: Wei,
    ) -> Result<TxHash, ChainError>;

    async fn buy_from_sale(
        &self,
        from: &Address,
        property_id: u64,
        token_amount: u64,
        value: Wei,
    ) -> Result<TxHash, ChainError>;

    async fn cancel_listing(
        &self,
        from: &Address,
        property_id: u64,
        listing_index: usize,
    ) -> Result<TxHash, ChainError>;

    async fn balance_of(&self, token: &Address, holder: &Address) -> Result<Wei, ChainError>;

    async fn decimals(&self, token: &Address) -> Result<u8, ChainError>;

    async fn approve(
        &self,
        from: &Address,
        token: &Address,
        spender: &Address,
        amount: Wei,
    ) -> Result<TxHash, ChainError>;
}
