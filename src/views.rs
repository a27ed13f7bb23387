use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// View
///
/// The logical read paths whose cached presentation can go stale after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum View {
    Home,
    Prayer,
    Profile,
    Sermons,
    Events,
    Live,
    Admin,
    AdminUsers,
    AdminSermons,
    AdminEvents,
    AdminLive,
    AdminDonations,
}

impl View {
    pub fn path(self) -> &'static str {
        match self {
            View::Home => "/",
            View::Prayer => "/prayer",
            View::Profile => "/profile",
            View::Sermons => "/sermons",
            View::Events => "/events",
            View::Live => "/live",
            View::Admin => "/admin",
            View::AdminUsers => "/admin/users",
            View::AdminSermons => "/admin/sermons",
            View::AdminEvents => "/admin/events",
            View::AdminLive => "/admin/live",
            View::AdminDonations => "/admin/donations",
        }
    }
}

/// StaleViews
///
/// One notification: the views made stale by a single successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleViews {
    pub views: Vec<View>,
}

/// ViewInvalidator
///
/// The notification channel towards the presentation layer. Called after each
/// successful write; the core never consumes a result from it.
pub trait ViewInvalidator: Send + Sync {
    fn invalidate(&self, views: &[View]);
}

/// ViewState
///
/// The concrete type used to share the invalidation channel across the application state.
pub type ViewState = Arc<dyn ViewInvalidator>;

/// BroadcastInvalidator
///
/// Publishes `StaleViews` events on a tokio broadcast channel. Any number of
/// subscribers (a cache, a push channel to browsers, a test) may listen; with none
/// listening the notification is simply dropped.
#[derive(Clone)]
pub struct BroadcastInvalidator {
    sender: broadcast::Sender<StaleViews>,
}

impl BroadcastInvalidator {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StaleViews> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastInvalidator {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ViewInvalidator for BroadcastInvalidator {
    fn invalidate(&self, views: &[View]) {
        let paths: Vec<&str> = views.iter().map(|view| view.path()).collect();
        tracing::debug!(?paths, "views marked stale");

        let event = StaleViews {
            views: views.to_vec(),
        };
        if self.sender.send(event).is_err() {
            tracing::trace!("no view subscribers; stale notification dropped");
        }
    }
}
