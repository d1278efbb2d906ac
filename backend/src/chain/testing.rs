use async_trait::async_trait;

use super::{ChainError, ListingRecord, MarketplaceContract, PropertyRecord, Submission, TxHash};
use crate::models::{Address, Wei};

/// A contract whose node cannot be reached. Only the pending list can be
/// scripted; every other call fails with `ChainError::Unavailable`.
pub(crate) struct UnreachableContract {
    pending: Result<Vec<(u64, PropertyRecord)>, ChainError>,
}

impl UnreachableContract {
    pub(crate) fn new() -> Self {
        Self {
            pending: Err(down()),
        }
    }

    pub(crate) fn with_pending(pending: Vec<(u64, PropertyRecord)>) -> Self {
        Self { pending: Ok(pending) }
    }
}

fn down() -> ChainError {
    ChainError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl MarketplaceContract for UnreachableContract {
    fn factory_address(&self) -> Address {
        Address::from_index(0xfac7, 0)
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        Err(down())
    }

    async fn get_properties(&self) -> Result<Vec<PropertyRecord>, ChainError> {
        Err(down())
    }

    async fn get_pending_properties(&self) -> Result<Vec<(u64, PropertyRecord)>, ChainError> {
        self.pending.clone()
    }

    async fn get_listings(&self, _property_id: u64) -> Result<Vec<ListingRecord>, ChainError> {
        Err(down())
    }

    async fn submit_property_for_approval(&self, _from: &Address, _submission: Submission) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn approve_and_tokenize_property(&self, _from: &Address, _pending_index: u64) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn disapprove_property(&self, _from: &Address, _pending_index: u64) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn list_for_sale(
        &self,
        _from: &Address,
        _property_id: u64,
        _token_amount: u64,
        _price_per_token: Wei,
    ) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn buy_from_listing(
        &self,
        _from: &Address,
        _property_id: u64,
        _listing_index: usize,
        _value: Wei,
    ) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn buy_from_sale(
        &self,
        _from: &Address,
        _property_id: u64,
        _token_amount: u64,
        _value: Wei,
    ) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn cancel_listing(&self, _from: &Address, _property_id: u64, _listing_index: usize) -> Result<TxHash, ChainError> {
        Err(down())
    }

    async fn balance_of(&self, _token: &Address, _holder: &Address) -> Result<Wei, ChainError> {
        Err(down())
    }

    async fn decimals(&self, _token: &Address) -> Result<u8, ChainError> {
        Err(down())
    }

    async fn approve(&self, _from: &Address, _token: &Address, _spender: &Address, _amount: Wei) -> Result<TxHash, ChainError> {
        Err(down())
    }
}
