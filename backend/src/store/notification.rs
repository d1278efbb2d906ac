use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::storage::{KeyValueStore, StorageError};
use crate::models::{Address, Notification};

pub const NOTIFICATIONS_KEY: &str = "propertyNotifications";
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(15);

pub fn read_status_key(account: &Address) -> String {
    format!("notificationsRead_{}", account)
}

type Feeds = BTreeMap<String, Vec<Notification>>;
type ReadStatus = BTreeMap<String, bool>;

#[derive(Debug, Default)]
struct FeedState {
    account: Option<Address>,
    notifications: Vec<Notification>,
    unread_count: usize,
}

fn unread(notifications: &[Notification], status: &ReadStatus) -> usize {
    notifications
        .iter()
        .filter(|n| !status.get(&n.read_key()).copied().unwrap_or(false))
        .count()
}

/// Notification feed of the active wallet, persisted per recipient.
///
/// Storage failures are logged and leave the in-memory feed untouched.
pub struct NotificationStore {
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<FeedState>,
}

impl NotificationStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            state: RwLock::new(FeedState::default()),
        }
    }

    pub async fn for_account(storage: Arc<dyn KeyValueStore>, account: Address) -> Self {
        let store = Self::new(storage);
        store.set_active_account(Some(account)).await;
        store
    }

    fn read_feeds(&self) -> Result<Feeds, StorageError> {
        match self.storage.get(NOTIFICATIONS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Feeds::new()),
        }
    }

    fn read_status(&self, account: &Address) -> Result<ReadStatus, StorageError> {
        match self.storage.get(&read_status_key(account))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(ReadStatus::new()),
        }
    }

    fn write_status(&self, account: &Address, status: &ReadStatus) -> Result<(), StorageError> {
        self.storage.set(&read_status_key(account), &serde_json::to_string(status)?)
    }

    pub async fn set_active_account(&self, account: Option<Address>) {
        {
            let mut state = self.state.write().await;
            state.account = account;
            state.notifications.clear();
            state.unread_count = 0;
        }
        self.load().await;
    }

    /// Re-reads the active account's feed, newest first.
    pub async fn load(&self) {
        let mut state = self.state.write().await;
        let account = match state.account.clone() {
            Some(account) => account,
            None => return,
        };
        let loaded = self.read_feeds().and_then(|mut feeds| {
            let mut mine = feeds.remove(account.as_str()).unwrap_or_default();
            mine.sort_by(|a, b| (b.timestamp, b.sequence).cmp(&(a.timestamp, a.sequence)));
            let status = self.read_status(&account)?;
            Ok((mine, status))
        });
        match loaded {
            Ok((notifications, status)) => {
                state.unread_count = unread(&notifications, &status);
                state.notifications = notifications;
            }
            Err(e) => log::error!("Error loading notifications for {}: {}", account, e),
        }
    }

    pub async fn active_account(&self) -> Option<Address> {
        self.state.read().await.account.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.state.read().await.unread_count
    }

    /// Prepends `note` to `recipient`'s stored feed. The in-memory feed and
    /// unread count only change when `recipient` is the active account.
    pub async fn add_notification(&self, mut note: Notification, recipient: &Address) {
        let mut state = self.state.write().await;
        let mut updated = Vec::new();
        let result = self.storage.update(NOTIFICATIONS_KEY, &mut |current| {
            let mut feeds: Feeds = match current {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Feeds::new(),
            };
            let feed = feeds.entry(recipient.to_string()).or_default();
            note.sequence = feed.iter().map(|n| n.sequence).max().map_or(0, |s| s + 1);
            feed.insert(0, note.clone());
            updated = feed.clone();
            Ok(serde_json::to_string(&feeds)?)
        });
        match result {
            Ok(()) => {
                log::info!("Notification stored for {}", recipient);
                if state.account.as_ref() == Some(recipient) {
                    state.notifications = updated;
                    state.unread_count += 1;
                }
            }
            Err(e) => log::error!("Error adding notification for {}: {}", recipient, e),
        }
    }

    pub async fn mark_as_read(&self, key: &str) {
        let mut state = self.state.write().await;
        let account = match state.account.clone() {
            Some(account) => account,
            None => return,
        };
        let mut status = ReadStatus::new();
        let result = self.storage.update(&read_status_key(&account), &mut |current| {
            status = match current {
                Some(raw) => serde_json::from_str(&raw)?,
                None => ReadStatus::new(),
            };
            status.insert(key.to_string(), true);
            Ok(serde_json::to_string(&status)?)
        });
        match result {
            Ok(()) => state.unread_count = unread(&state.notifications, &status),
            Err(e) => log::error!("Error marking notification as read: {}", e),
        }
    }

    /// Marks every held notification read, replacing the stored read map.
    pub async fn mark_all_as_read(&self) {
        let mut state = self.state.write().await;
        let account = match state.account.clone() {
            Some(account) => account,
            None => return,
        };
        let status: ReadStatus = state.notifications.iter().map(|n| (n.read_key(), true)).collect();
        match self.write_status(&account, &status) {
            Ok(()) => state.unread_count = 0,
            Err(e) => log::error!("Error marking all notifications as read: {}", e),
        }
    }
}

/// Owns a polling task; dropping the handle stops the poll.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn_poller(store: Arc<NotificationStore>, period: Duration) -> PollHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.load().await;
        }
    });
    PollHandle { task }
}
