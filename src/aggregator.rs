//! The client for the bank-data aggregation API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Date, macros::format_description};

use crate::{
    AggregatorConfig, Error, Identity, Service,
    remote::{check_status, request_error},
};

/// The credentials returned when a public token is exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    /// The long-lived token for reading the item's data.
    pub access_token: String,
    /// The aggregator's ID for the institution login.
    pub item_id: String,
}

/// The live details of an account held at a linked institution.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountMetadata {
    /// The aggregator's ID for the account.
    pub account_id: String,
    /// The name of the account, e.g. "Plaid Checking".
    pub name: String,
    /// The official name the institution gives the account.
    pub official_name: Option<String>,
    /// The last few digits of the account number.
    pub mask: Option<String>,
    /// The type of account, e.g. "depository".
    pub account_type: String,
    /// The subtype of account, e.g. "checking".
    pub subtype: Option<String>,
    /// The amount that can be withdrawn right now.
    pub available_balance: Option<f64>,
    /// The total amount of funds in the account.
    pub current_balance: f64,
    /// The aggregator's ID for the institution.
    pub institution_id: Option<String>,
}

/// A transaction posted to, or pending on, an account.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The aggregator's ID for the transaction.
    pub id: String,
    /// The account the transaction belongs to.
    pub account_id: String,
    /// The merchant or description of the transaction.
    pub name: String,
    /// The amount of the transaction. Positive values are money leaving the
    /// account.
    pub amount: f64,
    /// The date the transaction was posted.
    pub date: Date,
    /// The most specific category the aggregator assigned.
    pub category: Option<String>,
    /// How the transaction was made, e.g. "online" or "in store".
    pub payment_channel: String,
    /// Whether the transaction has yet to settle.
    pub pending: bool,
}

/// Reads account data from linked institutions.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Create a short-lived token that starts the link widget for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the aggregator rejects the request.
    async fn create_link_token(&self, identity: &Identity) -> Result<String, Error>;

    /// Trade the public token from the link widget for an access token.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the token is invalid or expired.
    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedToken, Error>;

    /// Get the details of the first account of the item for `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NoAccounts] if the item has no accounts, or an
    /// upstream error if the request fails.
    async fn get_account_metadata(&self, access_token: &str) -> Result<AccountMetadata, Error>;

    /// Get every transaction of the item for `access_token`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the request fails.
    async fn get_transactions(&self, access_token: &str) -> Result<Vec<Transaction>, Error>;

    /// Invalidate `access_token` and remove its item.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the request fails.
    async fn remove_item(&self, access_token: &str) -> Result<(), Error>;
}

#[derive(Serialize)]
struct Credentials<'a, T> {
    client_id: &'a str,
    secret: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct LinkTokenUser<'a> {
    client_user_id: &'a str,
}

#[derive(Serialize)]
struct LinkTokenRequest<'a> {
    user: LinkTokenUser<'a>,
    client_name: &'a str,
    products: [&'a str; 1],
    language: &'a str,
    country_codes: [&'a str; 1],
}

#[derive(Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[derive(Serialize)]
struct PublicTokenRequest<'a> {
    public_token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct Balances {
    available: Option<f64>,
    current: Option<f64>,
}

#[derive(Deserialize)]
struct Account {
    account_id: String,
    balances: Balances,
    mask: Option<String>,
    name: String,
    official_name: Option<String>,
    #[serde(rename = "type")]
    account_type: String,
    subtype: Option<String>,
}

#[derive(Deserialize)]
struct Item {
    institution_id: Option<String>,
}

#[derive(Deserialize)]
struct AccountsResponse {
    accounts: Vec<Account>,
    item: Item,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Deserialize)]
struct SyncedTransaction {
    transaction_id: String,
    account_id: String,
    name: String,
    amount: f64,
    date: String,
    category: Option<Vec<String>>,
    payment_channel: String,
    pending: bool,
}

#[derive(Deserialize)]
struct SyncResponse {
    added: Vec<SyncedTransaction>,
    next_cursor: String,
    has_more: bool,
}

#[derive(Serialize)]
struct ProcessorTokenRequest<'a> {
    access_token: &'a str,
    account_id: &'a str,
    processor: &'a str,
}

#[derive(Deserialize)]
struct ProcessorTokenResponse {
    processor_token: String,
}

impl TryFrom<SyncedTransaction> for Transaction {
    type Error = Error;

    fn try_from(transaction: SyncedTransaction) -> Result<Self, Self::Error> {
        let date = Date::parse(&transaction.date, format_description!("[year]-[month]-[day]"))
            .map_err(|error| Error::Request {
                service: Service::Aggregator,
                message: format!("invalid transaction date {}: {error}", transaction.date),
            })?;

        Ok(Self {
            id: transaction.transaction_id,
            account_id: transaction.account_id,
            name: transaction.name,
            amount: transaction.amount,
            date,
            category: transaction
                .category
                .and_then(|categories| categories.into_iter().last()),
            payment_channel: transaction.payment_channel,
            pending: transaction.pending,
        })
    }
}

/// An [Aggregator] that talks to the aggregator's REST API.
#[derive(Debug, Clone)]
pub struct HttpAggregator {
    client: Client,
    config: AggregatorConfig,
}

impl HttpAggregator {
    /// Create a client for the aggregator described by `config`.
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn post<B, R>(&self, path: &str, body: B) -> Result<R, Error>
    where
        B: Serialize + Send,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(url)
            .json(&Credentials {
                client_id: &self.config.client_id,
                secret: &self.config.secret,
                body,
            })
            .send()
            .await
            .map_err(request_error(Service::Aggregator))?;

        check_status(Service::Aggregator, response)
            .await?
            .json()
            .await
            .map_err(request_error(Service::Aggregator))
    }

    /// Create a token that lets `processor` access the account `account_id`
    /// of the item for `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the aggregator rejects the request.
    pub async fn create_processor_token(
        &self,
        access_token: &str,
        account_id: &str,
        processor: &str,
    ) -> Result<String, Error> {
        let response: ProcessorTokenResponse = self
            .post(
                "/processor/token/create",
                ProcessorTokenRequest {
                    access_token,
                    account_id,
                    processor,
                },
            )
            .await?;

        Ok(response.processor_token)
    }
}

#[async_trait]
impl Aggregator for HttpAggregator {
    async fn create_link_token(&self, identity: &Identity) -> Result<String, Error> {
        let response: LinkTokenResponse = self
            .post(
                "/link/token/create",
                LinkTokenRequest {
                    user: LinkTokenUser {
                        client_user_id: identity.id.as_str(),
                    },
                    client_name: &identity.name,
                    products: ["auth"],
                    language: "en",
                    country_codes: ["US"],
                },
            )
            .await?;

        Ok(response.link_token)
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedToken, Error> {
        let response: ExchangeResponse = self
            .post(
                "/item/public_token/exchange",
                PublicTokenRequest { public_token },
            )
            .await?;

        Ok(ExchangedToken {
            access_token: response.access_token,
            item_id: response.item_id,
        })
    }

    async fn get_account_metadata(&self, access_token: &str) -> Result<AccountMetadata, Error> {
        let response: AccountsResponse = self
            .post("/accounts/get", AccessTokenRequest { access_token })
            .await?;

        let account = response
            .accounts
            .into_iter()
            .next()
            .ok_or(Error::NoAccounts)?;

        Ok(AccountMetadata {
            account_id: account.account_id,
            name: account.name,
            official_name: account.official_name,
            mask: account.mask,
            account_type: account.account_type,
            subtype: account.subtype,
            available_balance: account.balances.available,
            current_balance: account.balances.current.unwrap_or_default(),
            institution_id: response.item.institution_id,
        })
    }

    async fn get_transactions(&self, access_token: &str) -> Result<Vec<Transaction>, Error> {
        let mut transactions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response: SyncResponse = self
                .post(
                    "/transactions/sync",
                    SyncRequest {
                        access_token,
                        cursor: cursor.as_deref(),
                    },
                )
                .await?;

            for transaction in response.added {
                transactions.push(Transaction::try_from(transaction)?);
            }

            if !response.has_more {
                break;
            }

            cursor = Some(response.next_cursor);
        }

        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(transactions)
    }

    async fn remove_item(&self, access_token: &str) -> Result<(), Error> {
        let _: serde_json::Value = self
            .post("/item/remove", AccessTokenRequest { access_token })
            .await?;

        Ok(())
    }
}
