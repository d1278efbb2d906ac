//! Connected wallets and their polled notification feeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::models::Address;
use crate::store::{spawn_poller, KeyValueStore, NotificationStore, PollHandle};

struct Session {
    feed: Arc<NotificationStore>,
    _poll: PollHandle,
}

pub struct WalletSessions {
    storage: Arc<dyn KeyValueStore>,
    poll_period: Duration,
    sessions: RwLock<HashMap<Address, Session>>,
}

impl WalletSessions {
    pub fn new(storage: Arc<dyn KeyValueStore>, poll_period: Duration) -> Self {
        Self {
            storage,
            poll_period,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.storage)
    }

    /// Returns the wallet's feed, starting its poll if it is not connected yet.
    pub async fn connect(&self, wallet: &Address) -> Arc<NotificationStore> {
        if let Some(session) = self.sessions.read().await.get(wallet) {
            return Arc::clone(&session.feed);
        }
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(wallet) {
            return Arc::clone(&session.feed);
        }
        let feed = Arc::new(NotificationStore::for_account(self.storage(), wallet.clone()).await);
        let poll = spawn_poller(Arc::clone(&feed), self.poll_period);
        log::info!("Wallet {} connected", wallet);
        sessions.insert(
            wallet.clone(),
            Session {
                feed: Arc::clone(&feed),
                _poll: poll,
            },
        );
        feed
    }

    /// Stops the wallet's poll and forgets its feed.
    pub async fn disconnect(&self, wallet: &Address) -> bool {
        let removed = self.sessions.write().await.remove(wallet).is_some();
        if removed {
            log::info!("Wallet {} disconnected", wallet);
        }
        removed
    }

    pub async fn connected(&self) -> usize {
        self.sessions.read().await.len()
    }
}
