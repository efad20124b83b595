use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::Cacheable;

/// One directory entry.
///
/// Only the fields the data layer filters on are typed; everything else the
/// API sends (address, latlng, operating hours, reviews, ...) is carried
/// through untouched in `extra`. A typed field that is absent or `null`
/// stays `None` and is not written back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub neighborhood: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cuisine_type: Option<String>,
  // Catch-all for the rest of the payload
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Restaurant {
  /// Base name of the restaurant's photograph, if the payload has one.
  /// Some servers send it as a number, others as a string.
  pub fn photograph(&self) -> Option<String> {
    match self.extra.get("photograph")? {
      Value::String(s) if !s.is_empty() => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }
}

impl Cacheable for Restaurant {
  fn id(&self) -> u64 {
    self.id
  }
}

/// Filter value meaning "no filter" for that dimension.
pub const ALL: &str = "all";

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_payload_survives_round_trip() {
    let raw = json!({
      "id": 1,
      "name": "Mission Chinese Food",
      "neighborhood": "Manhattan",
      "cuisine_type": "Asian",
      "photograph": "1",
      "address": "171 E Broadway, New York, NY 10002",
      "latlng": {"lat": 40.713829, "lng": -73.989667},
      "reviews": [{"name": "Steve", "rating": 4}]
    });

    let restaurant: Restaurant = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(restaurant.id, 1);
    assert_eq!(restaurant.cuisine_type.as_deref(), Some("Asian"));
    assert_eq!(restaurant.photograph().as_deref(), Some("1"));
    assert_eq!(restaurant.extra["latlng"]["lat"], json!(40.713829));
    assert_eq!(serde_json::to_value(&restaurant).unwrap(), raw);
  }

  #[test]
  fn test_minimal_record() {
    let restaurant: Restaurant = serde_json::from_value(json!({"id": 10})).unwrap();
    assert!(restaurant.name.is_none());
    assert!(restaurant.photograph().is_none());
    assert!(restaurant.extra.is_empty());
  }

  #[test]
  fn test_sparse_record_not_padded() {
    let raw = json!({"id": 1, "photograph": "1"});
    let restaurant: Restaurant = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(serde_json::to_value(&restaurant).unwrap(), raw);
  }

  #[test]
  fn test_null_fields_accepted() {
    let raw = json!([
      {"id": 1, "name": null, "neighborhood": "Queens", "cuisine_type": null},
      {"id": 2, "name": "Kang Ho Dong Baekjeong", "neighborhood": "Manhattan", "cuisine_type": "Asian"}
    ]);
    let restaurants: Vec<Restaurant> = serde_json::from_value(raw).unwrap();

    assert_eq!(restaurants.len(), 2);
    assert!(restaurants[0].name.is_none());
    assert!(restaurants[0].cuisine_type.is_none());
    assert_eq!(restaurants[0].neighborhood.as_deref(), Some("Queens"));
    assert_eq!(
      serde_json::to_value(&restaurants[0]).unwrap(),
      json!({"id": 1, "neighborhood": "Queens"})
    );
  }

  #[test]
  fn test_numeric_photograph() {
    let restaurant: Restaurant =
      serde_json::from_value(json!({"id": 3, "photograph": 3})).unwrap();
    assert_eq!(restaurant.photograph().as_deref(), Some("3"));
  }
}
