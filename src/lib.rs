//! Client library for the Etsy v2 listings API.
//!
//! One [`Client`] per credential set; every endpoint method builds a fresh
//! query, optionally attaches an OAuth1 signature, issues one blocking
//! HTTP call, and decodes the response. App-only and user-authorized
//! clients are distinct types, so self-referencing calls are only
//! reachable once a [`UserToken`] has been attached.
//!
//! ```no_run
//! use etsylist::Client;
//!
//! # fn main() -> etsylist::Result<()> {
//! let client = Client::new("consumer-key", "consumer-secret");
//! let listings = client.active_listings(None)?;
//! println!("{} active listings", listings.count);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;

mod oauth;
mod params;

pub use client::{AnyClient, Client, ClientBuilder, ColorFilter, Environment, Selector};
pub use error::{Error, Result};
pub use models::{Listing, ListingImage, ResultSet, Shop, User};
pub use oauth::{PendingAuthorization, UserToken};
