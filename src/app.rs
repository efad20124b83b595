use crate::cache::RecordStore;
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::restaurants::types::ALL;
use crate::restaurants::urls::detail_id_from_url;
use crate::restaurants::{CachedRestaurantClient, Restaurant, RestaurantApi};

/// Application state shared by the listing and detail views.
///
/// Owns everything the views read; renderers get it by reference.
pub struct App<S: RecordStore, C: Connectivity, A: RestaurantApi> {
  /// Restaurant data source
  client: CachedRestaurantClient<S, C, A>,

  /// Restaurants matching the current filters
  restaurants: Vec<Restaurant>,

  /// Filter choices, in first-seen order
  neighborhoods: Vec<String>,
  cuisines: Vec<String>,

  /// Restaurant shown on the detail page
  restaurant: Option<Restaurant>,
}

impl<S: RecordStore, C: Connectivity, A: RestaurantApi> App<S, C, A> {
  pub fn new(client: CachedRestaurantClient<S, C, A>) -> Self {
    Self {
      client,
      restaurants: Vec::new(),
      neighborhoods: Vec::new(),
      cuisines: Vec::new(),
      restaurant: None,
    }
  }

  #[allow(dead_code)]
  pub fn restaurants(&self) -> &[Restaurant] {
    &self.restaurants
  }

  pub fn neighborhoods(&self) -> &[String] {
    &self.neighborhoods
  }

  pub fn cuisines(&self) -> &[String] {
    &self.cuisines
  }

  #[allow(dead_code)]
  pub fn restaurant(&self) -> Option<&Restaurant> {
    self.restaurant.as_ref()
  }

  /// Load the neighborhood and cuisine filter choices.
  pub async fn load_filters(&mut self) -> Result<()> {
    self.neighborhoods = self.client.fetch_neighborhoods().await?;
    self.cuisines = self.client.fetch_cuisines().await?;
    Ok(())
  }

  /// Replace the listed restaurants with those matching the filters.
  ///
  /// `None` (or `"all"`) leaves a dimension unfiltered. On error the
  /// previous listing is kept.
  pub async fn update_restaurants(
    &mut self,
    cuisine: Option<&str>,
    neighborhood: Option<&str>,
  ) -> Result<&[Restaurant]> {
    self.restaurants = self
      .client
      .fetch_by_cuisine_and_neighborhood(cuisine.unwrap_or(ALL), neighborhood.unwrap_or(ALL))
      .await?;
    Ok(&self.restaurants)
  }

  /// Restaurant for a detail-page URL (`restaurant.html?id=N`).
  ///
  /// Reuses the already loaded restaurant when the id matches.
  pub async fn restaurant_from_url(&mut self, url: &str) -> Result<&Restaurant> {
    let id = detail_id_from_url(url)?;
    self.restaurant_by_id(id).await
  }

  pub async fn restaurant_by_id(&mut self, id: u64) -> Result<&Restaurant> {
    if self.restaurant.as_ref().map(|r| r.id) != Some(id) {
      let fetched = self.client.fetch_restaurant_by_id(id).await?;
      return Ok(self.restaurant.insert(fetched));
    }
    self.restaurant.as_ref().ok_or(Error::NotFound { id })
  }
}
