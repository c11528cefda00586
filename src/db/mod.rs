mod articles;
mod repository;
mod schema;
mod subscriptions;

pub use articles::ArticleCache;
pub use repository::{Repository, StoreChange};
pub use subscriptions::{normalize_topic, SubscriptionStore};
