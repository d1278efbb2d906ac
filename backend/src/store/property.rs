use tokio::sync::RwLock;

use crate::gateway::{ContractGateway, GatewayError};
use crate::models::{Address, Property, PropertyStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Property #{0} is not pending")]
    NotFound(usize),
    #[error("Property #{0} might have already been approved or rejected.")]
    AlreadyHandled(usize),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Default)]
struct Collections {
    pending: Vec<Property>,
    approved: Vec<Property>,
    rejected: Vec<Property>,
}

impl Collections {
    fn target(&mut self, status: PropertyStatus) -> &mut Vec<Property> {
        match status {
            PropertyStatus::Pending => &mut self.pending,
            PropertyStatus::Approved => &mut self.approved,
            PropertyStatus::Rejected => &mut self.rejected,
        }
    }
}

/// Client-side mirror of the pending, approved and rejected properties.
///
/// Review actions move a property tentatively, tagged `pending_confirmation`,
/// and the authoritative fetch that follows replaces the pending list wholesale.
pub struct PropertyStore {
    gateway: ContractGateway,
    state: RwLock<Collections>,
}

impl PropertyStore {
    pub fn new(gateway: ContractGateway) -> Self {
        Self {
            gateway,
            state: RwLock::new(Collections::default()),
        }
    }

    /// Builds the store and performs the initial fetch.
    pub async fn load(gateway: ContractGateway) -> Self {
        let store = Self::new(gateway);
        store.refresh().await;
        store
    }

    pub async fn pending(&self) -> Vec<Property> {
        self.state.read().await.pending.clone()
    }

    pub async fn approved(&self) -> Vec<Property> {
        self.state.read().await.approved.clone()
    }

    pub async fn rejected(&self) -> Vec<Property> {
        self.state.read().await.rejected.clone()
    }

    pub async fn refresh(&self) {
        self.refresh_pending().await;
        self.refresh_approved().await;
    }

    pub async fn refresh_pending(&self) {
        let fetched: Vec<Property> = self
            .gateway
            .get_pending_properties()
            .await
            .into_iter()
            .filter(|p| !p.is_malformed())
            .enumerate()
            .map(|(id, p)| Property { id, ..p })
            .collect();
        log::info!("Fetched {} pending properties", fetched.len());
        self.state.write().await.pending = fetched;
    }

    /// Replaces approved entries with the chain's tokenized list; on failure
    /// the local entries, tentative ones included, are kept.
    pub async fn refresh_approved(&self) {
        match self.gateway.get_all_properties().await {
            Ok(approved) => self.state.write().await.approved = approved,
            Err(e) => log::warn!("Failed to fetch approved properties: {}", e),
        }
    }

    /// Inserts into pending unless an entry with the same id and status exists.
    pub async fn add_property(&self, property: Property) -> bool {
        let mut state = self.state.write().await;
        if state
            .pending
            .iter()
            .any(|p| p.id == property.id && p.status == property.status)
        {
            return false;
        }
        state.pending.push(property);
        true
    }

    pub async fn approve_property(&self, id: usize, reviewer: &Address) -> Result<(), StoreError> {
        self.review(id, reviewer, PropertyStatus::Approved).await
    }

    pub async fn reject_property(&self, id: usize, reviewer: &Address) -> Result<(), StoreError> {
        self.review(id, reviewer, PropertyStatus::Rejected).await
    }

    async fn review(&self, id: usize, reviewer: &Address, outcome: PropertyStatus) -> Result<(), StoreError> {
        let contract_index = {
            let mut state = self.state.write().await;
            let position = state
                .pending
                .iter()
                .position(|p| p.id == id)
                .ok_or(StoreError::NotFound(id))?;
            let mut tentative = state.pending.remove(position);
            tentative.status = outcome;
            tentative.pending_confirmation = true;
            let contract_index = tentative.contract_index;
            state.target(outcome).push(tentative);
            contract_index
        };

        let acting = self.gateway.with_signer(Some(reviewer.clone()));
        let result = match outcome {
            PropertyStatus::Approved => acting.approve_property(contract_index).await,
            _ => acting.reject_property(contract_index).await,
        };

        match result {
            Ok(hash) => {
                log::info!("Property #{} marked {:?} in {}", id, outcome, hash);
                {
                    let mut state = self.state.write().await;
                    if let Some(entry) = state
                        .target(outcome)
                        .iter_mut()
                        .find(|p| p.contract_index == contract_index && p.pending_confirmation)
                    {
                        entry.pending_confirmation = false;
                    }
                }
                self.refresh_pending().await;
                if outcome == PropertyStatus::Approved {
                    self.refresh_approved().await;
                }
                Ok(())
            }
            Err(e) => {
                self.discard_tentative(outcome, contract_index).await;
                self.refresh_pending().await;
                match e {
                    GatewayError::AlreadyHandled { .. } => {
                        log::warn!("Property #{} was already handled on chain", id);
                        Err(StoreError::AlreadyHandled(id))
                    }
                    other => {
                        log::error!("Failed to review property #{}: {}", id, other);
                        Err(StoreError::Gateway(other))
                    }
                }
            }
        }
    }

    async fn discard_tentative(&self, outcome: PropertyStatus, contract_index: u64) {
        let mut state = self.state.write().await;
        state
            .target(outcome)
            .retain(|p| !(p.pending_confirmation && p.contract_index == contract_index));
    }
}
