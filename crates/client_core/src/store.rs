//! Application state container: jokes, categories and the loading/error flags
//! a UI renders, driven by four commands over the remote and local sources.

use shared::{
    domain::{Category, Joke, JokeId},
    error::{ErrorKind, JokeError, JokeResult},
};
use storage::{LocalJokeStore, SlotStore};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::remote::JokeSource;

const STATE_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JokeState {
    pub jokes: Vec<Joke>,
    pub categories: Vec<Category>,
    pub loading: bool,
    pub error: bool,
    /// Cause of the most recent failure; `None` whenever `error` is false.
    pub last_error: Option<ErrorKind>,
}

/// Published after every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Jokes { count: usize },
    Categories { count: usize },
    Loading(bool),
    Error(Option<ErrorKind>),
}

pub struct JokeStore<R, S> {
    remote: R,
    local: LocalJokeStore<S>,
    state: RwLock<JokeState>,
    in_flight: Mutex<()>,
    events: broadcast::Sender<StateChange>,
}

impl<R: JokeSource, S: SlotStore> JokeStore<R, S> {
    pub fn new(remote: R, local: LocalJokeStore<S>) -> Self {
        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Self {
            remote,
            local,
            state: RwLock::new(JokeState::default()),
            in_flight: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Replaces the in-memory jokes with the persisted list.
    pub async fn load_jokes(&self) {
        let _in_flight = self.in_flight.lock().await;
        self.begin().await;
        match self.local.list_jokes().await {
            Ok(jokes) => self.set_jokes(jokes).await,
            Err(err) => self.fail("load_jokes", err).await,
        }
        self.set_loading(false).await;
    }

    pub async fn load_categories(&self) {
        let _in_flight = self.in_flight.lock().await;
        self.begin().await;
        match self.remote.fetch_categories().await {
            Ok(categories) => self.set_categories(categories).await,
            Err(err) => self.fail("load_categories", err).await,
        }
        self.set_loading(false).await;
    }

    /// Fetches a random joke for `category`, persists it and appends it to the
    /// in-memory list without re-reading storage.
    pub async fn save_joke(&self, category: &str) {
        let _in_flight = self.in_flight.lock().await;
        self.begin().await;
        match self.fetch_and_persist(category).await {
            Ok(joke) => {
                info!(joke_id = %joke.id, category, "store: joke saved");
                let mut jokes = self.state.read().await.jokes.clone();
                jokes.push(joke);
                self.set_jokes(jokes).await;
            }
            Err(err) => self.fail("save_joke", err).await,
        }
        self.set_loading(false).await;
    }

    /// Deletes by id, then reloads the persisted list.
    pub async fn delete_joke(&self, id: &JokeId) {
        let _in_flight = self.in_flight.lock().await;
        self.begin().await;
        match self.delete_and_reload(id).await {
            Ok(jokes) => {
                info!(joke_id = %id, remaining = jokes.len(), "store: joke deleted");
                self.set_jokes(jokes).await;
            }
            Err(err) => self.fail("delete_joke", err).await,
        }
        self.set_loading(false).await;
    }

    pub async fn jokes(&self) -> Vec<Joke> {
        self.state.read().await.jokes.clone()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.state.read().await.categories.clone()
    }

    pub async fn loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn error(&self) -> bool {
        self.state.read().await.error
    }

    pub async fn last_error(&self) -> Option<ErrorKind> {
        self.state.read().await.last_error
    }

    pub async fn snapshot(&self) -> JokeState {
        self.state.read().await.clone()
    }

    async fn fetch_and_persist(&self, category: &str) -> JokeResult<Joke> {
        let joke = self.remote.fetch_random_joke(category).await?;
        self.local.ensure_slot().await?;
        self.local.save_joke(joke.clone()).await?;
        Ok(joke)
    }

    async fn delete_and_reload(&self, id: &JokeId) -> JokeResult<Vec<Joke>> {
        self.local.ensure_slot().await?;
        self.local.delete_joke(id).await?;
        self.local.list_jokes().await
    }

    async fn begin(&self) {
        self.set_loading(true).await;
        self.set_error(None).await;
    }

    async fn fail(&self, operation: &'static str, err: JokeError) {
        let kind = err.kind();
        warn!(operation, ?kind, error = %err, "store: operation failed");
        self.set_error(Some(kind)).await;
    }

    async fn set_jokes(&self, jokes: Vec<Joke>) {
        let count = jokes.len();
        self.state.write().await.jokes = jokes;
        self.publish(StateChange::Jokes { count });
    }

    async fn set_categories(&self, categories: Vec<Category>) {
        let count = categories.len();
        self.state.write().await.categories = categories;
        self.publish(StateChange::Categories { count });
    }

    async fn set_loading(&self, loading: bool) {
        self.state.write().await.loading = loading;
        self.publish(StateChange::Loading(loading));
    }

    async fn set_error(&self, kind: Option<ErrorKind>) {
        {
            let mut state = self.state.write().await;
            state.error = kind.is_some();
            state.last_error = kind;
        }
        self.publish(StateChange::Error(kind));
    }

    fn publish(&self, change: StateChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
