use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Amounts of ether (or 18-decimal fixed point values) in their smallest unit.
pub type Wei = u128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address: {0}")]
pub struct AddressError(pub String);

/// A 20-byte account address. Stored lower-cased so equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError(raw.to_string()))?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError(raw.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Deterministic address derived from a numeric id, used for contract-created tokens.
    pub fn from_index(prefix: u32, index: u64) -> Self {
        Self(format!("0x{:08x}{:032x}", prefix, index))
    }

    /// The address whose 20 raw bytes are `bytes`.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Pending,
    Approved,
    Rejected,
}

/// Descriptive fields collected by the submission form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAttributes {
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub apartment_type: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area: Option<u64>,
    pub year_built: Option<u32>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub amenities: Vec<String>,
}

/// Client-side view of a property, in any lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: usize,
    pub contract_index: u64,
    pub property_address: String,
    /// Valuation in USD as a decimal string.
    pub value: String,
    pub token_address: Option<Address>,
    #[serde(rename = "propertyImageURLs")]
    pub property_image_urls: Vec<String>,
    #[serde(rename = "documentURLs")]
    pub document_urls: Vec<String>,
    pub status: PropertyStatus,
    pub original_owner: Option<Address>,
    #[serde(flatten)]
    pub attributes: PropertyAttributes,
    /// Set on optimistic entries until the chain confirms the transition.
    #[serde(default)]
    pub pending_confirmation: bool,
}

impl Property {
    /// Entries with neither a street address nor a valuation carry no usable data.
    pub fn is_malformed(&self) -> bool {
        self.property_address.trim().is_empty() && (self.value.is_empty() || self.value == "0")
    }
}

/// An escrowed resale offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub property_id: u64,
    pub listing_index: usize,
    pub seller: Address,
    pub token_amount: u64,
    #[serde(with = "crate::units::wei_string")]
    pub price_per_token: Wei,
}

impl Listing {
    pub fn total_cost(&self) -> Option<Wei> {
        Wei::from(self.token_amount).checked_mul(self.price_per_token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    PropertySold,
    PropertyPurchased,
    TokenSoldInResale,
    PurchaseConfirmationResale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    /// Per-recipient ordering, assigned when the notification is stored.
    #[serde(default)]
    pub sequence: u64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub property_id: u64,
    pub token_amount: u64,
    pub buyer_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_address: Option<Address>,
    /// Total cost in ETH as a decimal string.
    pub total_cost: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        property_id: u64,
        token_amount: u64,
        buyer_address: Address,
        total_cost: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            kind,
            property_id,
            token_amount,
            buyer_address,
            seller_address: None,
            total_cost,
            timestamp: Utc::now(),
            property_name: None,
            transaction_hash: None,
        }
    }

    pub fn with_property_name(mut self, name: impl Into<String>) -> Self {
        self.property_name = Some(name.into());
        self
    }

    pub fn with_seller(mut self, seller: Address) -> Self {
        self.seller_address = Some(seller);
        self
    }

    pub fn with_transaction(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn read_key(&self) -> String {
        self.id.to_string()
    }
}
