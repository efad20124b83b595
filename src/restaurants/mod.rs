pub mod cached_client;
pub mod client;
pub mod types;
pub mod urls;

pub use cached_client::CachedRestaurantClient;
pub use client::{RestaurantApi, RestaurantClient};
pub use types::Restaurant;
