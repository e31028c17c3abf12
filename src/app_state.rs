//! Implements a struct that holds the state of the web server.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{Aggregator, IdentityGateway, PaymentRail, RecordStore, ShareableIdCipher};

/// The state of the web server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The identity service that issues sessions.
    pub identity: Arc<dyn IdentityGateway>,

    /// Where user and bank account records are kept.
    pub record_store: Arc<dyn RecordStore>,

    /// The account aggregator for balances and transactions.
    pub aggregator: Arc<dyn Aggregator>,

    /// The payment rail for customers, funding sources and transfers.
    pub payment_rail: Arc<dyn PaymentRail>,

    /// The cipher for the account IDs that users share to receive money.
    pub shareable_ids: ShareableIdCipher,
}

/// The clients of the services the app depends on.
pub struct Services {
    /// The identity service.
    pub identity: Arc<dyn IdentityGateway>,
    /// The record store.
    pub record_store: Arc<dyn RecordStore>,
    /// The account aggregator.
    pub aggregator: Arc<dyn Aggregator>,
    /// The payment rail.
    pub payment_rail: Arc<dyn PaymentRail>,
}

impl AppState {
    /// Create a new [AppState] from the service clients.
    ///
    /// The cookie key is derived from `cookie_secret`.
    pub fn new(cookie_secret: &str, shareable_ids: ShareableIdCipher, services: Services) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            identity: services.identity,
            record_store: services.record_store,
            aggregator: services.aggregator,
            payment_rail: services.payment_rail,
            shareable_ids,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
