pub mod feed;
pub mod models;
pub mod pii;

pub use feed::{ChangeFeed, ChangeSignal, ChangeSubscription};
pub use models::events::{ChangeEvent, ChangeKind, Table};
