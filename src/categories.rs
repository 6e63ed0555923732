//! Keeps a view's list of category options current.
//!
//! Two triggers feed the same refresh: a [`RefreshSignal`] on the bus, and a
//! fixed polling interval that catches anything the signal missed. Refreshing
//! twice in a row is harmless.

use crate::client;
use crate::events::{RefreshBus, RefreshSignal, Subscription};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct CategoryWatcher {
    categories: watch::Receiver<Vec<String>>,
    handle: JoinHandle<()>,
}

impl CategoryWatcher {
    /// Starts watching. The first refresh happens immediately.
    pub fn spawn(base_url: impl Into<String>, bus: &RefreshBus, interval: Duration) -> Self {
        let base_url = base_url.into();
        let (sender, categories) = watch::channel(Vec::new());
        // Subscribe before spawning so no signal published after this call is lost.
        let subscription = bus.subscribe();
        let handle = tokio::spawn(run(base_url, subscription, sender, interval));
        Self { categories, handle }
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.borrow().clone()
    }

    /// Waits until the category set differs from the last one seen here.
    pub async fn changed(&mut self) -> Option<Vec<String>> {
        self.categories.changed().await.ok()?;
        Some(self.categories.borrow_and_update().clone())
    }
}

impl Drop for CategoryWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    base_url: String,
    subscription: Subscription,
    sender: watch::Sender<Vec<String>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut subscription = Some(subscription);

    loop {
        let trigger = tokio::select! {
            _ = ticker.tick() => Some("poll"),
            signal = next_signal(&mut subscription) => signal.map(|RefreshSignal::Categories| "signal"),
        };
        let Some(trigger) = trigger else {
            // Bus gone: carry on with polling alone.
            subscription = None;
            continue;
        };
        debug!(trigger, "refreshing categories");
        refresh(&base_url, &sender).await;
    }
}

async fn next_signal(subscription: &mut Option<Subscription>) -> Option<RefreshSignal> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn refresh(base_url: &str, sender: &watch::Sender<Vec<String>>) {
    match client::fetch_categories(base_url).await {
        Ok(categories) => {
            sender.send_if_modified(|current| {
                if *current == categories {
                    false
                } else {
                    *current = categories;
                    true
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to load categories"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::spawn_test_server;
    use crate::client::{create_task, CreateTaskRequest};
    use tokio::time::timeout;

    fn categorized(title: &str, category: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_signal_triggers_refresh() {
        let base_url = spawn_test_server().await;
        let bus = RefreshBus::new();
        let mut watcher = CategoryWatcher::spawn(&base_url, &bus, Duration::from_secs(3600));

        create_task(&base_url, &categorized("Report", "work")).await.unwrap();
        bus.publish(RefreshSignal::Categories);

        let categories = timeout(Duration::from_secs(5), watcher.changed())
            .await
            .expect("no refresh after signal");
        assert_eq!(categories, Some(vec!["work".to_string()]));
        assert_eq!(watcher.categories(), vec!["work".to_string()]);
    }

    #[tokio::test]
    async fn test_polling_catches_missed_signal() {
        let base_url = spawn_test_server().await;
        let bus = RefreshBus::new();
        let mut watcher = CategoryWatcher::spawn(&base_url, &bus, Duration::from_millis(100));

        // No signal is published at all.
        create_task(&base_url, &categorized("Groceries", "home")).await.unwrap();

        let categories = timeout(Duration::from_secs(5), watcher.changed())
            .await
            .expect("polling never refreshed");
        assert_eq!(categories, Some(vec!["home".to_string()]));
    }

    #[tokio::test]
    async fn test_unreachable_backend_keeps_previous_set() {
        let bus = RefreshBus::new();
        let watcher = CategoryWatcher::spawn("http://127.0.0.1:9/api", &bus, Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(watcher.categories().is_empty());
    }
}
