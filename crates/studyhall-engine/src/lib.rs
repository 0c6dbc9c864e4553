mod convert;
pub mod expiry;
pub mod feed;
pub mod gateway;
pub mod scheduler;
pub mod sweep;
pub mod views;

pub use feed::{ChangeFeed, StoreChange};
pub use gateway::{GatewayError, MutationGateway};
pub use scheduler::Sweeper;
pub use views::{SubscriptionManager, ViewQuery, ViewSubscription, ViewUpdate};
