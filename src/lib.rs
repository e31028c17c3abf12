//! Horizon is a web app for linking bank accounts, viewing balances and
//! transactions, and sending money to other users.
//!
//! This library provides a web server that directly serves HTML pages, along
//! with the clients for the identity, account-aggregation and payment-rail
//! services that it relies on.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_server::Handle;
use tokio::signal;

mod aggregator;
mod alert;
mod app_state;
mod auth;
mod bank_account;
mod config;
mod dashboard;
mod endpoints;
mod html;
mod identity;
mod internal_server_error;
mod link;
mod link_bank;
mod logging;
mod my_banks;
mod navigation;
mod not_found;
mod password;
mod payment_rail;
mod record_store;
mod remote;
mod routing;
mod shareable_id;
mod sign_in;
mod sign_out;
mod sign_up;
mod transaction_history;
mod transfer;
mod transfer_page;
mod user;

#[cfg(test)]
mod test_utils;

pub use aggregator::{AccountMetadata, Aggregator, ExchangedToken, HttpAggregator, Transaction};
pub use app_state::{AppState, Services};
pub use bank_account::{BankAccount, BankAccountId, NewBankAccount};
pub use config::{
    AggregatorConfig, AppConfig, DatabaseConfig, IdentityConfig, PaymentRailConfig,
};
pub use identity::{HttpIdentityGateway, Identity, IdentityGateway, Session};
pub use link::BankLinker;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use payment_rail::{CustomerProfile, HttpPaymentRail, PaymentRail, customer_id_from_url};
pub use record_store::{DocumentRecordStore, RecordStore, SqliteRecordStore};
pub use remote::Service;
pub use routing::build_router;
pub use shareable_id::ShareableIdCipher;
pub use transfer::{FundsTransfer, TransferRequest};
pub use user::{NewUser, User, UserId};

use crate::{
    alert::Alert, internal_server_error::InternalServerError,
    not_found::get_404_not_found_response,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password did not match an account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The session cookie is missing from the cookie jar in the request.
    #[error("no session cookie in the cookie jar")]
    SessionMissing,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The request contained a value that cannot be used, e.g. a negative
    /// transfer amount or an email address that is already registered.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows or a
    /// remote service responds with 404.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A remote service responded with a non-success status code.
    #[error("{service} responded with status {status}: {message}")]
    Upstream {
        /// The service that responded.
        service: Service,
        /// The HTTP status code of the response.
        status: u16,
        /// The response body.
        message: String,
    },

    /// A request to a remote service could not be sent or its response could
    /// not be decoded.
    #[error("request to {service} failed: {message}")]
    Request {
        /// The service that the request was sent to.
        service: Service,
        /// A description of the underlying error.
        message: String,
    },

    /// A remote service accepted a request to create a resource but did not
    /// say where the resource lives.
    #[error("{0} did not return the location of the created resource")]
    MissingResourceLocation(Service),

    /// The aggregator access token is not associated with any accounts.
    #[error("the access token is not associated with any accounts")]
    NoAccounts,

    /// The payment rail did not return a funding source URL when linking a
    /// bank account.
    #[error("the payment rail did not return a funding source URL")]
    MissingFundingSource,

    /// A shareable ID was malformed or was not created with this server's key.
    #[error("the shareable ID is malformed or was not issued by this server")]
    InvalidShareableId,

    /// A required configuration value was not provided.
    #[error("the configuration value {0} is missing")]
    MissingConfig(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::InvalidCredentials | Error::SessionMissing => {
                Redirect::to(endpoints::SIGN_IN_VIEW).into_response()
            }
            Error::Upstream { service, .. } | Error::Request { service, .. } => {
                InternalServerError {
                    description: "A service we depend on is unavailable.",
                    fix: &format!("Could not reach the {service}. Please try again later."),
                }
                .into_response()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    fn into_alert_response(self) -> Response {
        let (status, alert) = match self {
            Error::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid request".to_owned(),
                    details: message,
                },
            ),
            Error::InvalidShareableId => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid shareable ID".to_owned(),
                    details: "Check the receiver's shareable ID and try again.".to_owned(),
                },
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Bank account not found".to_owned(),
                    details: "The bank account could not be found. \
                        Check that it has been linked and try again."
                        .to_owned(),
                },
            ),
            Error::NoAccounts => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "No accounts to link".to_owned(),
                    details: "The bank did not share any accounts. \
                        Select at least one account when connecting your bank."
                        .to_owned(),
                },
            ),
            Error::MissingFundingSource => (
                StatusCode::BAD_GATEWAY,
                Alert::Error {
                    message: "Could not link bank account".to_owned(),
                    details: "The payment provider did not register the account. \
                        Please try connecting your bank again."
                        .to_owned(),
                },
            ),
            Error::Upstream { service, .. }
            | Error::Request { service, .. }
            | Error::MissingResourceLocation(service) => (
                StatusCode::BAD_GATEWAY,
                Alert::Error {
                    message: "Something went wrong".to_owned(),
                    details: format!("Could not complete the request with the {service}."),
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Alert::ErrorSimple {
                    message: "An unexpected error occurred, check the server logs for more details."
                        .to_owned(),
                },
            ),
        };

        (status, alert).into_response()
    }
}
