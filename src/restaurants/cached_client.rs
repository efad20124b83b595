//! Restaurant client that picks between the network and the offline store.

use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, RecordStore};
use crate::connectivity::Connectivity;
use crate::error::Result;

use super::client::RestaurantApi;
use super::types::{Restaurant, ALL};

/// Store key of the full restaurant snapshot.
pub const SNAPSHOT_KEY: &str = "restaurants";

/// Restaurant client with offline support.
///
/// Wraps a [`RestaurantApi`] and provides the same data, served from the
/// record store when connectivity is low and written through to it otherwise.
pub struct CachedRestaurantClient<S: RecordStore, C: Connectivity, A: RestaurantApi> {
  inner: A,
  cache: CacheLayer<S, C>,
}

impl<S: RecordStore, C: Connectivity, A: RestaurantApi> CachedRestaurantClient<S, C, A> {
  pub fn new(inner: A, storage: S, connectivity: C, min_downlink_mbps: f64) -> Self {
    let cache =
      CacheLayer::new(storage, connectivity, SNAPSHOT_KEY).with_min_downlink(min_downlink_mbps);
    Self { inner, cache }
  }

  /// Fetch all restaurants, tagged with where they came from.
  pub async fn fetch_restaurants_with_source(&self) -> Result<CacheResult<Vec<Restaurant>>> {
    self
      .cache
      .fetch_all(|| {
        let inner = self.inner.clone();
        async move { inner.fetch_all().await }
      })
      .await
  }

  /// Fetch all restaurants.
  pub async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
    let result = self.fetch_restaurants_with_source().await?;
    debug!(source = ?result.source, count = result.data.len(), "Fetched restaurants");
    Ok(result.data)
  }

  /// Fetch a restaurant by its id.
  pub async fn fetch_restaurant_by_id(&self, id: u64) -> Result<Restaurant> {
    let result = self
      .cache
      .fetch_one(id, || {
        let inner = self.inner.clone();
        async move { inner.fetch_one(id).await }
      })
      .await?;

    Ok(result.data)
  }

  #[allow(dead_code)]
  pub async fn fetch_by_cuisine(&self, cuisine: &str) -> Result<Vec<Restaurant>> {
    self.fetch_by_cuisine_and_neighborhood(cuisine, ALL).await
  }

  #[allow(dead_code)]
  pub async fn fetch_by_neighborhood(&self, neighborhood: &str) -> Result<Vec<Restaurant>> {
    self.fetch_by_cuisine_and_neighborhood(ALL, neighborhood).await
  }

  /// Fetch restaurants matching both filters; `"all"` disables a filter.
  pub async fn fetch_by_cuisine_and_neighborhood(
    &self,
    cuisine: &str,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>> {
    let restaurants = self.fetch_restaurants().await?;
    Ok(filter_restaurants(restaurants, cuisine, neighborhood))
  }

  /// All neighborhoods, in first-seen order.
  pub async fn fetch_neighborhoods(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants().await?;
    Ok(unique(restaurants.iter().filter_map(|r| r.neighborhood.as_deref())))
  }

  /// All cuisines, in first-seen order.
  pub async fn fetch_cuisines(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants().await?;
    Ok(unique(restaurants.iter().filter_map(|r| r.cuisine_type.as_deref())))
  }
}

/// Apply the cuisine and neighborhood equality filters.
pub fn filter_restaurants(
  restaurants: Vec<Restaurant>,
  cuisine: &str,
  neighborhood: &str,
) -> Vec<Restaurant> {
  restaurants
    .into_iter()
    .filter(|r| cuisine == ALL || r.cuisine_type.as_deref() == Some(cuisine))
    .filter(|r| neighborhood == ALL || r.neighborhood.as_deref() == Some(neighborhood))
    .collect()
}

/// De-duplicate, keeping the first occurrence of each value.
fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for v in values {
    if !out.iter().any(|seen| seen == v) {
      out.push(v.to_string());
    }
  }
  out
}
