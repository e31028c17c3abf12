//! In-process stand-ins for the remote services.
//!
//! Each fake is cheap to clone and clones share state, so a test can hand one
//! copy to the code under test and inspect the other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::Connection;
use time::{Date, Duration, OffsetDateTime};

use crate::{
    AccountMetadata, Aggregator, CustomerProfile, Error, ExchangedToken, Identity,
    IdentityGateway, PaymentRail, Service, Session, SqliteRecordStore, Transaction, UserId,
};

pub(crate) fn in_memory_record_store() -> SqliteRecordStore {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");

    SqliteRecordStore::new(connection).expect("Could not create record tables")
}

/// Account details for a checking account named "Account {account_id}".
pub(crate) fn account_metadata(account_id: &str, current_balance: f64) -> AccountMetadata {
    AccountMetadata {
        account_id: account_id.to_owned(),
        name: format!("Account {account_id}"),
        official_name: Some(format!("Plaid Checking {account_id}")),
        mask: Some("0000".to_owned()),
        account_type: "depository".to_owned(),
        subtype: Some("checking".to_owned()),
        available_balance: Some(current_balance),
        current_balance,
        institution_id: Some("ins_1".to_owned()),
    }
}

pub(crate) fn transaction(
    id: &str,
    account_id: &str,
    name: &str,
    amount: f64,
    date: Date,
) -> Transaction {
    Transaction {
        id: id.to_owned(),
        account_id: account_id.to_owned(),
        name: name.to_owned(),
        amount,
        date,
        category: Some("Food and Drink".to_owned()),
        payment_channel: "in store".to_owned(),
        pending: false,
    }
}

fn rejected(service: Service, message: &str) -> Error {
    Error::Upstream {
        service,
        status: 400,
        message: message.to_owned(),
    }
}

#[derive(Default)]
struct IdentityState {
    // email -> (password, identity)
    accounts: HashMap<String, (String, Identity)>,
    // session secret -> user ID
    sessions: HashMap<String, UserId>,
    session_count: usize,
    rejecting_sessions: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakeIdentityGateway {
    state: Arc<Mutex<IdentityState>>,
}

impl FakeIdentityGateway {
    /// Start a session for an existing account and return its secret.
    pub(crate) async fn sign_in(&self, email: &str, password: &str) -> String {
        self.create_session(email, password)
            .await
            .expect("Could not create session")
            .secret
    }

    /// Fail every request to start a session.
    pub(crate) fn rejecting_sessions(&self) {
        self.state.lock().unwrap().rejecting_sessions = true;
    }

    pub(crate) fn active_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }
}

#[async_trait]
impl IdentityGateway for FakeIdentityGateway {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Identity, Error> {
        let mut state = self.state.lock().unwrap();

        if state.accounts.contains_key(email) {
            return Err(Error::InvalidInput(
                "An account with this email address already exists.".to_owned(),
            ));
        }

        let identity = Identity {
            id: UserId::new(format!("user-{}", state.accounts.len() + 1)),
            name: full_name.to_owned(),
            email: email.to_owned(),
        };
        state
            .accounts
            .insert(email.to_owned(), (password.to_owned(), identity.clone()));

        Ok(identity)
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, Error> {
        let mut state = self.state.lock().unwrap();

        if state.rejecting_sessions {
            return Err(rejected(Service::Identity, "session limit reached"));
        }

        let user_id = match state.accounts.get(email) {
            Some((want_password, identity)) if want_password == password => identity.id.clone(),
            _ => return Err(Error::InvalidCredentials),
        };

        state.session_count += 1;
        let session = Session {
            id: format!("session-{}", state.session_count),
            user_id: user_id.clone(),
            secret: format!("secret-{}", state.session_count),
            expires: OffsetDateTime::now_utc() + Duration::days(365),
        };
        state.sessions.insert(session.secret.clone(), user_id);

        Ok(session)
    }

    async fn get_current_identity(&self, session_secret: &str) -> Option<Identity> {
        let state = self.state.lock().unwrap();
        let user_id = state.sessions.get(session_secret)?;

        state
            .accounts
            .values()
            .map(|(_, identity)| identity)
            .find(|identity| &identity.id == user_id)
            .cloned()
    }

    async fn destroy_session(&self, session_secret: &str) -> Result<(), Error> {
        self.state.lock().unwrap().sessions.remove(session_secret);

        Ok(())
    }
}

#[derive(Default)]
struct AggregatorState {
    // public token -> exchanged token
    links: HashMap<String, ExchangedToken>,
    // access token -> first account, `None` for an item without accounts
    accounts: HashMap<String, Option<AccountMetadata>>,
    // access token -> transactions
    transactions: HashMap<String, Vec<Transaction>>,
    removed_items: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeAggregator {
    state: Arc<Mutex<AggregatorState>>,
}

impl FakeAggregator {
    /// Make `public_token` exchange to `access_token` for the item `item_id`.
    pub(crate) fn with_link(self, public_token: &str, access_token: &str, item_id: &str) -> Self {
        self.state.lock().unwrap().links.insert(
            public_token.to_owned(),
            ExchangedToken {
                access_token: access_token.to_owned(),
                item_id: item_id.to_owned(),
            },
        );
        self
    }

    pub(crate) fn with_account(self, access_token: &str, account: AccountMetadata) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(access_token.to_owned(), Some(account));
        self
    }

    pub(crate) fn with_item_without_accounts(self, access_token: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(access_token.to_owned(), None);
        self
    }

    pub(crate) fn with_transactions(
        self,
        access_token: &str,
        transactions: Vec<Transaction>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(access_token.to_owned(), transactions);
        self
    }

    /// The access tokens passed to `remove_item`, in call order.
    pub(crate) fn removed_items(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_items.clone()
    }
}

#[async_trait]
impl Aggregator for FakeAggregator {
    async fn create_link_token(&self, identity: &Identity) -> Result<String, Error> {
        Ok(format!("link-token-{}", identity.id))
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ExchangedToken, Error> {
        self.state
            .lock()
            .unwrap()
            .links
            .get(public_token)
            .cloned()
            .ok_or_else(|| rejected(Service::Aggregator, "INVALID_PUBLIC_TOKEN"))
    }

    async fn get_account_metadata(&self, access_token: &str) -> Result<AccountMetadata, Error> {
        match self.state.lock().unwrap().accounts.get(access_token) {
            Some(Some(account)) => Ok(account.clone()),
            Some(None) => Err(Error::NoAccounts),
            None => Err(rejected(Service::Aggregator, "INVALID_ACCESS_TOKEN")),
        }
    }

    async fn get_transactions(&self, access_token: &str) -> Result<Vec<Transaction>, Error> {
        let state = self.state.lock().unwrap();

        if !state.accounts.contains_key(access_token) {
            return Err(rejected(Service::Aggregator, "INVALID_ACCESS_TOKEN"));
        }

        Ok(state
            .transactions
            .get(access_token)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_item(&self, access_token: &str) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .removed_items
            .push(access_token.to_owned());

        Ok(())
    }
}

#[derive(Default)]
struct PaymentRailState {
    customers_created: Vec<CustomerProfile>,
    without_customer_location: bool,
    // (customer ID, processor token, bank name)
    funding_sources_created: Vec<(String, String, String)>,
    funding_source_url: Option<String>,
    without_funding_source_location: bool,
    failing_funding_source: bool,
    removed_funding_sources: Vec<String>,
    // (source URL, destination URL, amount)
    transfers_created: Vec<(String, String, f64)>,
    without_transfer_location: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakePaymentRail {
    state: Arc<Mutex<PaymentRailState>>,
}

impl FakePaymentRail {
    /// Return `url` for every funding source instead of a numbered URL.
    pub(crate) fn with_funding_source(self, url: &str) -> Self {
        self.state.lock().unwrap().funding_source_url = Some(url.to_owned());
        self
    }

    pub(crate) fn without_customer_location(self) -> Self {
        self.state.lock().unwrap().without_customer_location = true;
        self
    }

    /// Return customer URLs again after [Self::without_customer_location].
    pub(crate) fn restore_customer_location(&self) {
        self.state.lock().unwrap().without_customer_location = false;
    }

    pub(crate) fn without_funding_source_location(self) -> Self {
        self.state.lock().unwrap().without_funding_source_location = true;
        self
    }

    pub(crate) fn failing_funding_source(self) -> Self {
        self.state.lock().unwrap().failing_funding_source = true;
        self
    }

    pub(crate) fn without_transfer_location(self) -> Self {
        self.state.lock().unwrap().without_transfer_location = true;
        self
    }

    pub(crate) fn customers_created(&self) -> Vec<CustomerProfile> {
        self.state.lock().unwrap().customers_created.clone()
    }

    pub(crate) fn funding_sources_created(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().funding_sources_created.clone()
    }

    pub(crate) fn removed_funding_sources(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_funding_sources.clone()
    }

    pub(crate) fn transfers_created(&self) -> Vec<(String, String, f64)> {
        self.state.lock().unwrap().transfers_created.clone()
    }
}

#[async_trait]
impl PaymentRail for FakePaymentRail {
    async fn create_customer(&self, profile: &CustomerProfile) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state.customers_created.push(profile.clone());

        if state.without_customer_location {
            return Ok(None);
        }

        Ok(Some(format!(
            "https://rail/customers/c-{}",
            state.customers_created.len()
        )))
    }

    async fn create_processor_token(
        &self,
        _access_token: &str,
        account_id: &str,
    ) -> Result<String, Error> {
        Ok(format!("processor-{account_id}"))
    }

    async fn create_funding_source(
        &self,
        customer_id: &str,
        processor_token: &str,
        bank_name: &str,
    ) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();

        if state.failing_funding_source {
            return Err(rejected(Service::PaymentRail, "ValidationError"));
        }

        state.funding_sources_created.push((
            customer_id.to_owned(),
            processor_token.to_owned(),
            bank_name.to_owned(),
        ));

        if state.without_funding_source_location {
            return Ok(None);
        }

        let url = state.funding_source_url.clone().unwrap_or_else(|| {
            format!(
                "https://rail/funding-sources/{}",
                state.funding_sources_created.len()
            )
        });

        Ok(Some(url))
    }

    async fn remove_funding_source(&self, funding_source_url: &str) -> Result<(), Error> {
        self.state
            .lock()
            .unwrap()
            .removed_funding_sources
            .push(funding_source_url.to_owned());

        Ok(())
    }

    async fn create_transfer(
        &self,
        source_url: &str,
        destination_url: &str,
        amount: f64,
    ) -> Result<Option<String>, Error> {
        let mut state = self.state.lock().unwrap();
        state
            .transfers_created
            .push((source_url.to_owned(), destination_url.to_owned(), amount));

        if state.without_transfer_location {
            return Ok(None);
        }

        Ok(Some(format!(
            "https://rail/transfers/{}",
            state.transfers_created.len()
        )))
    }
}
