//! Typed views of the v2 API's JSON bodies.
//!
//! The remote schema is informally specified, so everything beyond the
//! resource ids is optional and defaults when absent.

use serde::Deserialize;

/// Envelope every v2 resource endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub struct ResultSet<T> {
    pub count: i64,
    pub results: Vec<T>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

impl<T> ResultSet<T> {
    /// The first result, for single-resource lookups.
    pub fn into_first(self) -> Option<T> {
        self.results.into_iter().next()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub listing_id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Prices arrive as decimal strings, e.g. `"24.00"`.
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub user_id: u64,
    #[serde(default)]
    pub login_name: Option<String>,
    #[serde(default)]
    pub creation_tsz: Option<f64>,
    #[serde(default)]
    pub feedback_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Shop {
    pub shop_id: u64,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub listing_active_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingImage {
    pub listing_image_id: u64,
    #[serde(default)]
    pub listing_id: Option<u64>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub url_75x75: Option<String>,
    #[serde(default)]
    pub url_170x135: Option<String>,
    #[serde(default, rename = "url_570xN")]
    pub url_570xn: Option<String>,
    #[serde(default)]
    pub url_fullxfull: Option<String>,
}
