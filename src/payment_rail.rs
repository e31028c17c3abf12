//! The client for the payment-rail API that registers customers and funding
//! sources and moves money between them.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};

use crate::{
    Error, HttpAggregator, PaymentRailConfig, Service,
    remote::{check_status, location_header, request_error},
};

const HAL_JSON: &str = "application/vnd.dwolla.v1.hal+json";

/// The aggregator's name for the payment rail when issuing processor tokens.
const PROCESSOR: &str = "dwolla";

/// The personal details needed to register a customer on the payment rail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    /// The customer's first name.
    pub first_name: String,
    /// The customer's last name.
    pub last_name: String,
    /// The customer's email address.
    pub email: String,
    /// The first line of the customer's street address.
    pub address1: String,
    /// The customer's city.
    pub city: String,
    /// The two-letter code of the customer's state.
    pub state: String,
    /// The customer's postal code.
    pub postal_code: String,
    /// The customer's date of birth as `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// The last four digits of the customer's social security number.
    pub ssn: String,
}

/// Registers customers and funding sources and creates transfers.
///
/// Operations that create a resource return `Ok(None)` when the payment rail
/// accepted the request but did not say where the resource lives. Callers
/// decide whether that is an error.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Register a personal customer and return the URL of the customer.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the payment rail rejects the profile.
    async fn create_customer(&self, profile: &CustomerProfile) -> Result<Option<String>, Error>;

    /// Create a token that lets the payment rail access the aggregator
    /// account `account_id` of the item for `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the aggregator rejects the request.
    async fn create_processor_token(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<String, Error>;

    /// Register the account behind `processor_token` as a funding source of
    /// the customer `customer_id` and return the URL of the funding source.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the payment rail rejects the request.
    async fn create_funding_source(
        &self,
        customer_id: &str,
        processor_token: &str,
        bank_name: &str,
    ) -> Result<Option<String>, Error>;

    /// Remove the funding source at `funding_source_url`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the payment rail rejects the request.
    async fn remove_funding_source(&self, funding_source_url: &str) -> Result<(), Error>;

    /// Move `amount` dollars from the funding source at `source_url` to the
    /// one at `destination_url` and return the URL of the transfer.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the payment rail rejects the transfer.
    async fn create_transfer(
        &self,
        source_url: &str,
        destination_url: &str,
        amount: f64,
    ) -> Result<Option<String>, Error>;
}

/// The ID of a customer, which is the last path segment of its URL.
pub fn customer_id_from_url(customer_url: &str) -> &str {
    customer_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct Link<'a> {
    href: &'a str,
}

#[derive(Serialize)]
struct NewCustomer<'a> {
    #[serde(flatten)]
    profile: &'a CustomerProfile,
    #[serde(rename = "type")]
    customer_type: &'a str,
}

#[derive(Deserialize)]
struct SelfLink {
    href: String,
}

#[derive(Deserialize)]
struct AuthorizationLinks {
    #[serde(rename = "self")]
    self_link: SelfLink,
}

#[derive(Deserialize)]
struct OnDemandAuthorization {
    #[serde(rename = "_links")]
    links: AuthorizationLinks,
}

#[derive(Serialize)]
struct FundingSourceLinks<'a> {
    #[serde(rename = "on-demand-authorization")]
    on_demand_authorization: Link<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFundingSource<'a> {
    plaid_token: &'a str,
    name: &'a str,
    #[serde(rename = "_links")]
    links: FundingSourceLinks<'a>,
}

#[derive(Serialize)]
struct RemoveFundingSource {
    removed: bool,
}

#[derive(Serialize)]
struct TransferLinks<'a> {
    source: Link<'a>,
    destination: Link<'a>,
}

#[derive(Serialize)]
struct Amount {
    currency: &'static str,
    value: String,
}

#[derive(Serialize)]
struct NewTransfer<'a> {
    #[serde(rename = "_links")]
    links: TransferLinks<'a>,
    amount: Amount,
}

/// A [PaymentRail] that talks to the payment rail's REST API.
///
/// Processor tokens are issued by the aggregator, so the client holds an
/// [HttpAggregator] for that one call.
#[derive(Debug, Clone)]
pub struct HttpPaymentRail {
    client: Client,
    config: PaymentRailConfig,
    aggregator: HttpAggregator,
}

impl HttpPaymentRail {
    /// Create a client for the payment rail described by `config`.
    pub fn new(config: PaymentRailConfig, aggregator: HttpAggregator) -> Self {
        Self {
            client: Client::new(),
            config,
            aggregator,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetch a bearer token with the client-credentials grant.
    async fn access_token(&self) -> Result<String, Error> {
        let response = self
            .client
            .post(self.url("/token"))
            .basic_auth(&self.config.key, Some(&self.config.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(request_error(Service::PaymentRail))?;

        let token: TokenResponse = check_status(Service::PaymentRail, response)
            .await?
            .json()
            .await
            .map_err(request_error(Service::PaymentRail))?;

        Ok(token.access_token)
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<Response, Error> {
        let token = self.access_token().await?;
        let body = serde_json::to_vec(body)
            .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(header::ACCEPT, HAL_JSON)
            .header(header::CONTENT_TYPE, HAL_JSON)
            .body(body)
            .send()
            .await
            .map_err(request_error(Service::PaymentRail))?;

        check_status(Service::PaymentRail, response).await
    }

    async fn create_on_demand_authorization(&self) -> Result<String, Error> {
        let response = self
            .post(
                &self.url("/on-demand-authorizations"),
                &serde_json::json!({}),
            )
            .await?;

        let authorization: OnDemandAuthorization = response
            .json()
            .await
            .map_err(request_error(Service::PaymentRail))?;

        Ok(authorization.links.self_link.href)
    }
}

#[async_trait]
impl PaymentRail for HttpPaymentRail {
    async fn create_customer(&self, profile: &CustomerProfile) -> Result<Option<String>, Error> {
        let response = self
            .post(
                &self.url("/customers"),
                &NewCustomer {
                    profile,
                    customer_type: "personal",
                },
            )
            .await?;

        Ok(location_header(&response))
    }

    async fn create_processor_token(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<String, Error> {
        self.aggregator
            .create_processor_token(access_token, account_id, PROCESSOR)
            .await
    }

    async fn create_funding_source(
        &self,
        customer_id: &str,
        processor_token: &str,
        bank_name: &str,
    ) -> Result<Option<String>, Error> {
        let authorization_url = self.create_on_demand_authorization().await?;

        let response = self
            .post(
                &self.url(&format!("/customers/{customer_id}/funding-sources")),
                &NewFundingSource {
                    plaid_token: processor_token,
                    name: bank_name,
                    links: FundingSourceLinks {
                        on_demand_authorization: Link {
                            href: &authorization_url,
                        },
                    },
                },
            )
            .await?;

        Ok(location_header(&response))
    }

    async fn remove_funding_source(&self, funding_source_url: &str) -> Result<(), Error> {
        self.post(funding_source_url, &RemoveFundingSource { removed: true })
            .await?;

        Ok(())
    }

    async fn create_transfer(
        &self,
        source_url: &str,
        destination_url: &str,
        amount: f64,
    ) -> Result<Option<String>, Error> {
        let response = self
            .post(
                &self.url("/transfers"),
                &NewTransfer {
                    links: TransferLinks {
                        source: Link { href: source_url },
                        destination: Link {
                            href: destination_url,
                        },
                    },
                    amount: Amount {
                        currency: "USD",
                        value: format!("{amount:.2}"),
                    },
                },
            )
            .await?;

        Ok(location_header(&response))
    }
}
