pub mod remote;
pub mod store;

pub use remote::{JokeSource, JokesApi, DEFAULT_API_BASE_URL};
pub use store::{JokeState, JokeStore, StateChange};
