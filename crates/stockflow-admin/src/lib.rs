pub mod error;
pub mod types;

pub mod cache;
pub mod config;
pub mod entity;
pub mod live;
pub mod notify;
pub mod reactive;
pub mod remote;
pub mod screen;
pub mod store;
pub mod view;

pub use cache::{QueryCache, QueryKey};
pub use config::AdminConfig;
pub use entity::Entity;
pub use error::{AdminError, Result};
pub use screen::{AdminContext, CollectionScreen};
pub use store::CollectionStore;
