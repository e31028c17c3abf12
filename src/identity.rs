//! The gateway to the remote authentication and session service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Error, IdentityConfig, Service, UserId,
    remote::{check_status, request_error},
};

const PROJECT_HEADER: &str = "X-Appwrite-Project";
const KEY_HEADER: &str = "X-Appwrite-Key";
const SESSION_HEADER: &str = "X-Appwrite-Session";

/// Asks the identity service to generate the ID of a new resource.
pub(crate) const UNIQUE_ID: &str = "unique()";

/// An authenticated user principal as tracked by the identity service.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// The user's ID.
    pub id: UserId,
    /// The user's full name.
    pub name: String,
    /// The user's email address.
    pub email: String,
}

/// A session issued by the identity service.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The session ID.
    pub id: String,
    /// The user the session belongs to.
    pub user_id: UserId,
    /// The opaque secret that authenticates requests made with the session.
    pub secret: String,
    /// When the identity service will stop accepting the session.
    pub expires: OffsetDateTime,
}

/// Creates accounts and sessions and resolves sessions to identities.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidInput] if the email is already registered, or
    /// an upstream error if the request fails.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, Error>;

    /// Start a session for the account with `email` and `password`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCredentials] if the email and password do not
    /// match an account, or an upstream error if the request fails.
    async fn create_session(&self, email: &str, password: &str) -> Result<Session, Error>;

    /// Get the identity that owns the session with `session_secret`.
    ///
    /// Any failure, including an expired or unknown session, is logged and
    /// reported as `None`.
    async fn get_current_identity(&self, session_secret: &str) -> Option<Identity>;

    /// End the session with `session_secret`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the request fails.
    async fn destroy_session(&self, session_secret: &str) -> Result<(), Error>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    user_id: &'a str,
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(rename = "$id")]
    id: String,
    name: String,
    email: String,
}

impl From<AccountResponse> for Identity {
    fn from(account: AccountResponse) -> Self {
        Self {
            id: UserId::new(account.id),
            name: account.name,
            email: account.email,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    #[serde(rename = "$id")]
    id: String,
    user_id: String,
    secret: String,
    expire: String,
}

impl TryFrom<SessionResponse> for Session {
    type Error = Error;

    fn try_from(session: SessionResponse) -> Result<Self, Self::Error> {
        let expires = OffsetDateTime::parse(&session.expire, &Rfc3339).map_err(|error| {
            tracing::error!("could not parse session expiry {}: {error}", session.expire);
            Error::Request {
                service: Service::Identity,
                message: format!("invalid session expiry: {error}"),
            }
        })?;

        Ok(Self {
            id: session.id,
            user_id: UserId::new(session.user_id),
            secret: session.secret,
            expires,
        })
    }
}

/// An [IdentityGateway] that talks to the identity service's REST API.
#[derive(Debug, Clone)]
pub struct HttpIdentityGateway {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityGateway {
    /// Create a gateway for the service described by `config`.
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn fetch_identity(&self, session_secret: &str) -> Result<Identity, Error> {
        let response = self
            .client
            .get(self.url("/account"))
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(SESSION_HEADER, session_secret)
            .send()
            .await
            .map_err(request_error(Service::Identity))?;

        let account: AccountResponse = check_status(Service::Identity, response)
            .await?
            .json()
            .await
            .map_err(request_error(Service::Identity))?;

        Ok(account.into())
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, Error> {
        let response = self
            .client
            .post(self.url("/account"))
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(KEY_HEADER, &self.config.api_key)
            .json(&CreateAccountRequest {
                user_id: UNIQUE_ID,
                email,
                password,
                name: full_name,
            })
            .send()
            .await
            .map_err(request_error(Service::Identity))?;

        let response = match check_status(Service::Identity, response).await {
            Ok(response) => response,
            Err(Error::Upstream { status: 409, .. }) => {
                return Err(Error::InvalidInput(
                    "An account with this email address already exists.".to_owned(),
                ));
            }
            Err(error) => return Err(error),
        };

        let account: AccountResponse = response
            .json()
            .await
            .map_err(request_error(Service::Identity))?;

        tracing::info!("created account {}", account.id);

        Ok(account.into())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, Error> {
        let response = self
            .client
            .post(self.url("/account/sessions/email"))
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(KEY_HEADER, &self.config.api_key)
            .json(&CreateSessionRequest { email, password })
            .send()
            .await
            .map_err(request_error(Service::Identity))?;

        let response = match check_status(Service::Identity, response).await {
            Ok(response) => response,
            Err(Error::Upstream { status: 401, .. }) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        };

        let session: SessionResponse = response
            .json()
            .await
            .map_err(request_error(Service::Identity))?;

        session.try_into()
    }

    async fn get_current_identity(&self, session_secret: &str) -> Option<Identity> {
        self.fetch_identity(session_secret)
            .await
            .inspect_err(|error| tracing::debug!("could not get the current identity: {error}"))
            .ok()
    }

    async fn destroy_session(&self, session_secret: &str) -> Result<(), Error> {
        let response = self
            .client
            .delete(self.url("/account/sessions/current"))
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(SESSION_HEADER, session_secret)
            .send()
            .await
            .map_err(request_error(Service::Identity))?;

        check_status(Service::Identity, response).await?;

        Ok(())
    }
}
