//! The configuration for the server and the clients of the remote services.
//!
//! Everything is read once at start-up and passed explicitly to the client
//! constructors.

use crate::Error;

/// The default base URL of the account aggregator (sandbox environment).
pub const DEFAULT_AGGREGATOR_BASE_URL: &str = "https://sandbox.plaid.com";
/// The default base URL of the payment rail (sandbox environment).
pub const DEFAULT_PAYMENT_RAIL_BASE_URL: &str = "https://api-sandbox.dwolla.com";
/// The name shown to users in the aggregator's link widget.
pub const DEFAULT_CLIENT_NAME: &str = "Horizon";

/// Connection details for the identity service.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConfig {
    /// The base URL of the service's REST API, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    /// The project the users belong to.
    pub project_id: String,
    /// The server API key.
    pub api_key: String,
}

/// The database and collections that hold the app's records in the
/// document store.
///
/// The document store is reached with the same endpoint and credentials as
/// the identity service.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// The database ID.
    pub database_id: String,
    /// The collection of user records.
    pub user_collection_id: String,
    /// The collection of bank account records.
    pub bank_collection_id: String,
}

/// Credentials for the account aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// The base URL of the aggregator's API.
    pub base_url: String,
    /// The client ID issued by the aggregator.
    pub client_id: String,
    /// The secret issued by the aggregator.
    pub secret: String,
    /// The app name shown in the link widget.
    pub client_name: String,
}

/// Credentials for the payment rail.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRailConfig {
    /// The base URL of the payment rail's API.
    pub base_url: String,
    /// The application key.
    pub key: String,
    /// The application secret.
    pub secret: String,
}

/// The full configuration of the app.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The secret used to derive the key for signing and encrypting cookies.
    pub cookie_secret: String,
    /// The secret used to derive the key for shareable account IDs.
    pub shareable_id_secret: String,
    /// The identity service.
    pub identity: IdentityConfig,
    /// The document store collections, if the remote record store is used.
    pub database: Option<DatabaseConfig>,
    /// The account aggregator.
    pub aggregator: AggregatorConfig,
    /// The payment rail.
    pub payment_rail: PaymentRailConfig,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingConfig] naming the first required variable that
    /// is not set.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name to
    /// its value.
    ///
    /// Required variables: `SECRET`, `SHAREABLE_ID_SECRET`,
    /// `IDENTITY_ENDPOINT`, `IDENTITY_PROJECT_ID`, `IDENTITY_API_KEY`,
    /// `AGGREGATOR_CLIENT_ID`, `AGGREGATOR_SECRET`, `PAYMENT_RAIL_KEY` and
    /// `PAYMENT_RAIL_SECRET`.
    ///
    /// Setting `DATABASE_ID` enables the document store, which then also
    /// requires `USER_COLLECTION_ID` and `BANK_COLLECTION_ID`.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingConfig] naming the first required variable that
    /// is missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let require = |name: &str| get(name).ok_or_else(|| Error::MissingConfig(name.to_owned()));

        let database = match get("DATABASE_ID") {
            Some(database_id) => Some(DatabaseConfig {
                database_id,
                user_collection_id: require("USER_COLLECTION_ID")?,
                bank_collection_id: require("BANK_COLLECTION_ID")?,
            }),
            None => None,
        };

        Ok(Self {
            cookie_secret: require("SECRET")?,
            shareable_id_secret: require("SHAREABLE_ID_SECRET")?,
            identity: IdentityConfig {
                endpoint: require("IDENTITY_ENDPOINT")?,
                project_id: require("IDENTITY_PROJECT_ID")?,
                api_key: require("IDENTITY_API_KEY")?,
            },
            database,
            aggregator: AggregatorConfig {
                base_url: get("AGGREGATOR_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_AGGREGATOR_BASE_URL.to_owned()),
                client_id: require("AGGREGATOR_CLIENT_ID")?,
                secret: require("AGGREGATOR_SECRET")?,
                client_name: get("AGGREGATOR_CLIENT_NAME")
                    .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_owned()),
            },
            payment_rail: PaymentRailConfig {
                base_url: get("PAYMENT_RAIL_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_PAYMENT_RAIL_BASE_URL.to_owned()),
                key: require("PAYMENT_RAIL_KEY")?,
                secret: require("PAYMENT_RAIL_SECRET")?,
            },
        })
    }
}
