//! Page and image URLs for restaurants, and the detail-page `id` parameter.

use url::Url;

use crate::error::{Error, Result};
use crate::restaurants::types::Restaurant;

/// Relative link to a restaurant's detail page.
pub fn url_for_restaurant(restaurant: &Restaurant) -> String {
  format!("./restaurant.html?id={}", restaurant.id)
}

fn photo_base(restaurant: &Restaurant) -> String {
  restaurant
    .photograph()
    .unwrap_or_else(|| restaurant.id.to_string())
}

/// Default (800px wide) image for a restaurant.
pub fn image_url_for_restaurant(restaurant: &Restaurant) -> String {
  format!("/img/{}_800w.jpg", photo_base(restaurant))
}

pub fn image_srcset_for_restaurant(restaurant: &Restaurant) -> String {
  let base = photo_base(restaurant);
  [300, 600, 800]
    .iter()
    .map(|w| format!("/img/{}_{}w.jpg {}w", base, w, w))
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn image_sizes_for_restaurant(_restaurant: &Restaurant) -> &'static str {
  "(max-width: 639px) 100vw, 300px"
}

/// Extract the restaurant id from a detail-page URL.
///
/// Accepts absolute URLs and root- or dot-relative ones like
/// `./restaurant.html?id=3`. A missing, empty or non-numeric `id` is a
/// `MissingId` error.
pub fn detail_id_from_url(url: &str) -> Result<u64> {
  let parsed = match Url::parse(url) {
    Ok(u) => u,
    Err(url::ParseError::RelativeUrlWithoutBase) => {
      Url::parse("http://localhost/")?.join(url)?
    }
    Err(e) => return Err(e.into()),
  };

  parsed
    .query_pairs()
    .find(|(k, _)| k == "id")
    .and_then(|(_, v)| v.trim().parse().ok())
    .ok_or_else(|| Error::MissingId {
      url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn restaurant(value: serde_json::Value) -> Restaurant {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_detail_url() {
    let r = restaurant(json!({"id": 4}));
    assert_eq!(url_for_restaurant(&r), "./restaurant.html?id=4");
  }

  #[test]
  fn test_image_falls_back_to_id() {
    let r = restaurant(json!({"id": 10}));
    assert_eq!(image_url_for_restaurant(&r), "/img/10_800w.jpg");

    let r = restaurant(json!({"id": 2, "photograph": "2"}));
    assert_eq!(
      image_srcset_for_restaurant(&r),
      "/img/2_300w.jpg 300w, /img/2_600w.jpg 600w, /img/2_800w.jpg 800w"
    );
  }

  #[test]
  fn test_id_from_relative_and_absolute() {
    assert_eq!(detail_id_from_url("./restaurant.html?id=3").unwrap(), 3);
    assert_eq!(
      detail_id_from_url("http://localhost:8000/restaurant.html?foo=1&id=12").unwrap(),
      12
    );
  }

  #[test]
  fn test_missing_id() {
    for url in [
      "http://localhost:8000/restaurant.html",
      "/restaurant.html?id=",
      "/restaurant.html?id=abc",
    ] {
      assert!(
        matches!(detail_id_from_url(url), Err(Error::MissingId { .. })),
        "{}",
        url
      );
    }
  }
}
