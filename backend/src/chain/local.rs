use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{ChainError, ListingRecord, MarketplaceContract, PropertyRecord, RevertCode, Submission, TxHash};
use crate::models::{Address, Wei};
use crate::units::{pow10, ETHER_DECIMALS, TOKEN_PRICE_USD};

const FACTORY_PREFIX: u32 = 0xfac7;
const TOKEN_PREFIX: u32 = 0x70c0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Review {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug)]
struct PendingSubmission {
    submission: Submission,
    owner: Address,
    review: Review,
}

#[derive(Debug)]
struct Tokenized {
    record: PropertyRecord,
    token: Address,
    /// Whole tokens still held by the factory for the initial sale.
    for_sale: u64,
}

#[derive(Debug, Default)]
struct TokenLedger {
    balances: HashMap<Address, Wei>,
    allowances: HashMap<(Address, Address), Wei>,
}

#[derive(Debug)]
struct Ledger {
    owner: Address,
    submissions: Vec<PendingSubmission>,
    properties: Vec<Tokenized>,
    listings: HashMap<u64, Vec<ListingRecord>>,
    tokens: HashMap<Address, TokenLedger>,
    ether: HashMap<Address, Wei>,
    tx_count: u64,
}

impl Ledger {
    fn next_hash(&mut self) -> TxHash {
        self.tx_count += 1;
        format!("0x{:064x}", self.tx_count)
    }

    fn only_owner(&self, from: &Address) -> Result<(), ChainError> {
        if from != &self.owner {
            return Err(ChainError::Reverted(RevertCode::NotOwner));
        }
        Ok(())
    }

    fn pending_mut(&mut self, index: u64) -> Result<&mut PendingSubmission, ChainError> {
        let entry = usize::try_from(index)
            .ok()
            .and_then(|i| self.submissions.get_mut(i))
            .ok_or(ChainError::Reverted(RevertCode::AlreadyHandled))?;
        if entry.review != Review::Pending {
            return Err(ChainError::Reverted(RevertCode::AlreadyHandled));
        }
        Ok(entry)
    }

    fn property(&self, property_id: u64) -> Result<&Tokenized, ChainError> {
        usize::try_from(property_id)
            .ok()
            .and_then(|i| self.properties.get(i))
            .ok_or(ChainError::Reverted(RevertCode::InvalidProperty))
    }

    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: Wei) -> Result<(), ChainError> {
        let ledger = self.tokens.entry(token.clone()).or_default();
        let balance = ledger.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(ChainError::Reverted(RevertCode::InsufficientBalance));
        }
        ledger.balances.insert(from.clone(), balance - amount);
        *ledger.balances.entry(to.clone()).or_insert(0) += amount;
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Wei) {
        *self.ether.entry(account.clone()).or_insert(0) += amount;
    }
}

fn unit_amount(tokens: u64) -> Result<Wei, ChainError> {
    pow10(ETHER_DECIMALS)
        .and_then(|scale| Wei::from(tokens).checked_mul(scale))
        .ok_or(ChainError::Reverted(RevertCode::InvalidAmount))
}

/// In-process factory contract with per-property 18-decimal tokens.
///
/// Approval mints `value / 50 USD` whole tokens to the factory, sold at
/// `sale_price` wei per token. Listings escrow the seller's tokens in the
/// factory until bought or cancelled.
#[derive(Debug)]
pub struct LocalChain {
    factory: Address,
    sale_price: Wei,
    ledger: Mutex<Ledger>,
}

impl LocalChain {
    pub fn new(owner: Address, sale_price: Wei) -> Self {
        Self {
            factory: Address::from_index(FACTORY_PREFIX, 0),
            sale_price,
            ledger: Mutex::new(Ledger {
                owner,
                submissions: Vec::new(),
                properties: Vec::new(),
                listings: HashMap::new(),
                tokens: HashMap::new(),
                ether: HashMap::new(),
                tx_count: 0,
            }),
        }
    }

    pub fn sale_price(&self) -> Wei {
        self.sale_price
    }

    /// Ether credited to an account by sales and refunds.
    pub fn ether_balance(&self, account: &Address) -> Wei {
        self.lock().ether.get(account).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // Mutations validate before writing, so a poisoned ledger is still consistent.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MarketplaceContract for LocalChain {
    fn factory_address(&self) -> Address {
        self.factory.clone()
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        Ok(self.lock().owner.clone())
    }

    async fn get_properties(&self) -> Result<Vec<PropertyRecord>, ChainError> {
        Ok(self.lock().properties.iter().map(|p| p.record.clone()).collect())
    }

    async fn get_pending_properties(&self) -> Result<Vec<(u64, PropertyRecord)>, ChainError> {
        let ledger = self.lock();
        Ok(ledger
            .submissions
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.review == Review::Pending)
            .map(|(index, entry)| {
                let record = PropertyRecord {
                    property_address: entry.submission.property_address.clone(),
                    value: entry.submission.value,
                    token_address: None,
                    image_urls: entry.submission.image_urls.clone(),
                    document_urls: entry.submission.document_urls.clone(),
                    original_owner: entry.owner.clone(),
                    attributes: entry.submission.attributes.clone(),
                    approved: false,
                    exists: true,
                };
                (index as u64, record)
            })
            .collect())
    }

    async fn get_listings(&self, property_id: u64) -> Result<Vec<ListingRecord>, ChainError> {
        let ledger = self.lock();
        ledger.property(property_id)?;
        Ok(ledger.listings.get(&property_id).cloned().unwrap_or_default())
    }

    async fn submit_property_for_approval(
        &self,
        from: &Address,
        submission: Submission,
    ) -> Result<TxHash, ChainError> {
        if submission.value == 0 {
            return Err(ChainError::Reverted(RevertCode::InvalidAmount));
        }
        let mut ledger = self.lock();
        ledger.submissions.push(PendingSubmission {
            submission,
            owner: from.clone(),
            review: Review::Pending,
        });
        Ok(ledger.next_hash())
    }

    async fn approve_and_tokenize_property(
        &self,
        from: &Address,
        pending_index: u64,
    ) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        ledger.only_owner(from)?;
        let entry = ledger.pending_mut(pending_index)?;
        let submission = entry.submission.clone();
        let owner = entry.owner.clone();

        let property_id = ledger.properties.len() as u64;
        let token = Address::from_index(TOKEN_PREFIX, property_id);
        let scale = pow10(ETHER_DECIMALS).ok_or(ChainError::Reverted(RevertCode::InvalidAmount))?;
        let supply = u64::try_from(submission.value / scale / TOKEN_PRICE_USD)
            .map_err(|_| ChainError::Reverted(RevertCode::InvalidAmount))?;
        let minted = unit_amount(supply)?;
        ledger.pending_mut(pending_index)?.review = Review::Approved;

        let factory = self.factory.clone();
        ledger.tokens.entry(token.clone()).or_default().balances.insert(factory, minted);
        ledger.properties.push(Tokenized {
            record: PropertyRecord {
                property_address: submission.property_address,
                value: submission.value,
                token_address: Some(token.clone()),
                image_urls: submission.image_urls,
                document_urls: submission.document_urls,
                original_owner: owner,
                attributes: submission.attributes,
                approved: true,
                exists: true,
            },
            token,
            for_sale: supply,
        });
        Ok(ledger.next_hash())
    }

    async fn disapprove_property(&self, from: &Address, pending_index: u64) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        ledger.only_owner(from)?;
        ledger.pending_mut(pending_index)?.review = Review::Rejected;
        Ok(ledger.next_hash())
    }

    async fn list_for_sale(
        &self,
        from: &Address,
        property_id: u64,
        token_amount: u64,
        price_per_token: Wei,
    ) -> Result<TxHash, ChainError> {
        if token_amount == 0 || price_per_token == 0 {
            return Err(ChainError::Reverted(RevertCode::InvalidAmount));
        }
        let mut ledger = self.lock();
        let token = ledger.property(property_id)?.token.clone();
        let amount = unit_amount(token_amount)?;

        let key = (from.clone(), self.factory.clone());
        let allowance = ledger
            .tokens
            .get(&token)
            .and_then(|t| t.allowances.get(&key))
            .copied()
            .unwrap_or(0);
        if allowance < amount {
            return Err(ChainError::Reverted(RevertCode::InsufficientAllowance));
        }
        ledger.transfer(&token, from, &self.factory, amount)?;
        if let Some(t) = ledger.tokens.get_mut(&token) {
            t.allowances.insert(key, allowance - amount);
        }
        ledger.listings.entry(property_id).or_default().push(ListingRecord {
            seller: from.clone(),
            token_amount,
            price_per_token,
        });
        Ok(ledger.next_hash())
    }

    async fn buy_from_listing(
        &self,
        from: &Address,
        property_id: u64,
        listing_index: usize,
        value: Wei,
    ) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        let token = ledger.property(property_id)?.token.clone();
        let listing = ledger
            .listings
            .get(&property_id)
            .and_then(|l| l.get(listing_index))
            .cloned()
            .ok_or(ChainError::Reverted(RevertCode::InvalidListing))?;
        let cost = Wei::from(listing.token_amount)
            .checked_mul(listing.price_per_token)
            .ok_or(ChainError::Reverted(RevertCode::IncorrectPayment))?;
        if value != cost {
            return Err(ChainError::Reverted(RevertCode::IncorrectPayment));
        }

        ledger.transfer(&token, &self.factory, from, unit_amount(listing.token_amount)?)?;
        if let Some(listings) = ledger.listings.get_mut(&property_id) {
            listings.remove(listing_index);
        }
        ledger.credit(&listing.seller, cost);
        Ok(ledger.next_hash())
    }

    async fn buy_from_sale(
        &self,
        from: &Address,
        property_id: u64,
        token_amount: u64,
        value: Wei,
    ) -> Result<TxHash, ChainError> {
        if token_amount == 0 {
            return Err(ChainError::Reverted(RevertCode::InvalidAmount));
        }
        let mut ledger = self.lock();
        let property = ledger.property(property_id)?;
        if property.for_sale < token_amount {
            return Err(ChainError::Reverted(RevertCode::InsufficientBalance));
        }
        let token = property.token.clone();
        let owner = property.record.original_owner.clone();
        let cost = Wei::from(token_amount)
            .checked_mul(self.sale_price)
            .ok_or(ChainError::Reverted(RevertCode::IncorrectPayment))?;
        if value < cost {
            return Err(ChainError::Reverted(RevertCode::IncorrectPayment));
        }

        ledger.transfer(&token, &self.factory, from, unit_amount(token_amount)?)?;
        if let Some(p) = usize::try_from(property_id).ok().and_then(|i| ledger.properties.get_mut(i)) {
            p.for_sale -= token_amount;
        }
        ledger.credit(&owner, cost);
        if value > cost {
            ledger.credit(from, value - cost);
        }
        Ok(ledger.next_hash())
    }

    async fn cancel_listing(
        &self,
        from: &Address,
        property_id: u64,
        listing_index: usize,
    ) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        let token = ledger.property(property_id)?.token.clone();
        let listing = ledger
            .listings
            .get(&property_id)
            .and_then(|l| l.get(listing_index))
            .cloned()
            .ok_or(ChainError::Reverted(RevertCode::InvalidListing))?;
        if &listing.seller != from {
            return Err(ChainError::Reverted(RevertCode::NotSeller));
        }
        ledger.transfer(&token, &self.factory, from, unit_amount(listing.token_amount)?)?;
        if let Some(listings) = ledger.listings.get_mut(&property_id) {
            listings.remove(listing_index);
        }
        Ok(ledger.next_hash())
    }

    async fn balance_of(&self, token: &Address, holder: &Address) -> Result<Wei, ChainError> {
        let ledger = self.lock();
        let tokens = ledger
            .tokens
            .get(token)
            .ok_or(ChainError::Reverted(RevertCode::InvalidProperty))?;
        Ok(tokens.balances.get(holder).copied().unwrap_or(0))
    }

    async fn decimals(&self, token: &Address) -> Result<u8, ChainError> {
        if !self.lock().tokens.contains_key(token) {
            return Err(ChainError::Reverted(RevertCode::InvalidProperty));
        }
        Ok(ETHER_DECIMALS)
    }

    async fn approve(
        &self,
        from: &Address,
        token: &Address,
        spender: &Address,
        amount: Wei,
    ) -> Result<TxHash, ChainError> {
        let mut ledger = self.lock();
        let tokens = ledger
            .tokens
            .get_mut(token)
            .ok_or(ChainError::Reverted(RevertCode::InvalidProperty))?;
        tokens.allowances.insert((from.clone(), spender.clone()), amount);
        Ok(ledger.next_hash())
    }
}
