//! Helpers shared by the HTTP clients for the remote services.

use std::fmt::Display;

use reqwest::{Response, header::LOCATION};

use crate::Error;

/// The remote services the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// The authentication and session service.
    Identity,
    /// The document database that holds user and bank account records.
    RecordStore,
    /// The bank-data aggregation API.
    Aggregator,
    /// The payment-rail API that moves money between funding sources.
    PaymentRail,
}

impl Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Service::Identity => "identity service",
            Service::RecordStore => "record store",
            Service::Aggregator => "account aggregator",
            Service::PaymentRail => "payment rail",
        };

        f.write_str(name)
    }
}

/// Pass through successful responses and turn any other status into
/// [Error::Upstream] carrying the response body.
pub(crate) async fn check_status(service: Service, response: Response) -> Result<Response, Error> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_owned());

    tracing::error!("{service} responded with status {status}: {message}");

    Err(Error::Upstream {
        service,
        status: status.as_u16(),
        message,
    })
}

/// Build a closure that converts a [reqwest::Error] from talking to `service`
/// into an [Error::Request].
pub(crate) fn request_error(service: Service) -> impl Fn(reqwest::Error) -> Error {
    move |error| {
        tracing::error!("request to {service} failed: {error}");

        Error::Request {
            service,
            message: error.to_string(),
        }
    }
}

/// The `Location` header of a response, which the payment rail uses to
/// point at newly created resources.
pub(crate) fn location_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
