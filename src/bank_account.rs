//! The linked bank account record and helpers for summarising a user's banks.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{AccountMetadata, Aggregator, Error, RecordStore, UserId};

/// The ID of a bank account record in the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct BankAccountId(String);

impl BankAccountId {
    /// Create a new bank account record ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The record ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BankAccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An external bank account linked to a user.
///
/// A record only exists once both the aggregator access token and the
/// payment-rail funding source exist for the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    /// The ID of the record.
    pub id: BankAccountId,
    /// The user who linked the account.
    pub user_id: UserId,
    /// The aggregator's item ID for the institution login.
    pub bank_id: String,
    /// The aggregator's ID for the account.
    pub account_id: String,
    /// The long-lived aggregator access token for the item.
    pub access_token: String,
    /// The URL of the funding source registered on the payment rail.
    pub funding_source_url: String,
    /// The encrypted account ID that other users can send money to.
    pub shareable_id: String,
}

/// The fields needed to create a bank account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBankAccount {
    /// The user who linked the account.
    pub user_id: UserId,
    /// The aggregator's item ID for the institution login.
    pub bank_id: String,
    /// The aggregator's ID for the account.
    pub account_id: String,
    /// The long-lived aggregator access token for the item.
    pub access_token: String,
    /// The URL of the funding source registered on the payment rail.
    pub funding_source_url: String,
    /// The encrypted account ID that other users can send money to.
    pub shareable_id: String,
}

impl NewBankAccount {
    /// Attach a record ID to the fields.
    pub fn with_id(self, id: BankAccountId) -> BankAccount {
        BankAccount {
            id,
            user_id: self.user_id,
            bank_id: self.bank_id,
            account_id: self.account_id,
            access_token: self.access_token,
            funding_source_url: self.funding_source_url,
            shareable_id: self.shareable_id,
        }
    }
}

/// A linked bank account together with its live details from the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BankSummary {
    pub record: BankAccount,
    pub account: AccountMetadata,
}

/// Fetch the user's bank account records and the live account details for each.
///
/// Accounts whose details cannot be fetched are logged and left out so that
/// one broken link does not hide the user's other banks.
///
/// # Errors
///
/// Returns an error if the bank account records cannot be listed.
pub(crate) async fn summarize_bank_accounts(
    user_id: &UserId,
    record_store: &dyn RecordStore,
    aggregator: &dyn Aggregator,
) -> Result<Vec<BankSummary>, Error> {
    let records = record_store
        .list_bank_account_records(user_id)
        .await
        .inspect_err(|error| {
            tracing::error!("could not list bank accounts for user {user_id}: {error}")
        })?;

    let mut summaries = Vec::with_capacity(records.len());

    for record in records {
        match aggregator.get_account_metadata(&record.access_token).await {
            Ok(account) => summaries.push(BankSummary { record, account }),
            Err(error) => tracing::error!(
                "could not fetch account details for bank account {}: {error}",
                record.id
            ),
        }
    }

    Ok(summaries)
}

/// The sum of the current balances of `summaries`.
pub(crate) fn total_current_balance(summaries: &[BankSummary]) -> f64 {
    summaries
        .iter()
        .map(|summary| summary.account.current_balance)
        .sum()
}
