//! The pipeline that attaches an external bank account to a user.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    Aggregator, AppState, BankAccount, Error, NewBankAccount, PaymentRail, RecordStore,
    ShareableIdCipher, User,
};

/// Links bank accounts by coordinating the aggregator, the payment rail and
/// the record store.
#[derive(Clone)]
pub struct BankLinker {
    aggregator: Arc<dyn Aggregator>,
    payment_rail: Arc<dyn PaymentRail>,
    record_store: Arc<dyn RecordStore>,
    shareable_ids: ShareableIdCipher,
}

impl FromRef<AppState> for BankLinker {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.aggregator.clone(),
            state.payment_rail.clone(),
            state.record_store.clone(),
            state.shareable_ids.clone(),
        )
    }
}

impl BankLinker {
    /// Create a linker from the clients it coordinates.
    pub fn new(
        aggregator: Arc<dyn Aggregator>,
        payment_rail: Arc<dyn PaymentRail>,
        record_store: Arc<dyn RecordStore>,
        shareable_ids: ShareableIdCipher,
    ) -> Self {
        Self {
            aggregator,
            payment_rail,
            record_store,
            shareable_ids,
        }
    }

    /// Link the account behind `public_token`, which the aggregator's link
    /// widget issued to `user`, and return the new bank account record.
    ///
    /// The steps run in order and stop at the first failure. A record is
    /// only written once both the access token and the funding source exist.
    /// If a later step fails, the access token is invalidated and any funding
    /// source that was created is removed. Failures while undoing are logged
    /// and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns [Error::NoAccounts] if the institution shared no accounts,
    /// [Error::MissingFundingSource] if the payment rail did not return a
    /// funding source, or the error of whichever client call failed.
    pub async fn link_bank_account(
        &self,
        public_token: &str,
        user: &User,
    ) -> Result<BankAccount, Error> {
        let exchanged = self
            .aggregator
            .exchange_public_token(public_token)
            .await
            .inspect_err(|error| {
                tracing::error!(
                    "could not exchange public token for user {}: {error}",
                    user.user_id
                )
            })?;

        let account = match self
            .aggregator
            .get_account_metadata(&exchanged.access_token)
            .await
        {
            Ok(account) => account,
            Err(error) => {
                tracing::error!(
                    "could not fetch accounts for item {}: {error}",
                    exchanged.item_id
                );
                self.remove_item(&exchanged.access_token).await;
                return Err(error);
            }
        };

        let funding_source_url = match self
            .create_funding_source(
                &exchanged.access_token,
                &account.account_id,
                &account.name,
                user,
            )
            .await
        {
            Ok(url) => url,
            Err(error) => {
                self.remove_item(&exchanged.access_token).await;
                return Err(error);
            }
        };

        let new_bank_account = NewBankAccount {
            user_id: user.user_id.clone(),
            bank_id: exchanged.item_id,
            shareable_id: self.shareable_ids.encrypt(&account.account_id),
            account_id: account.account_id,
            access_token: exchanged.access_token,
            funding_source_url,
        };

        match self
            .record_store
            .create_bank_account_record(new_bank_account.clone())
            .await
        {
            Ok(bank_account) => {
                tracing::info!(
                    "linked bank account {} for user {}",
                    bank_account.id,
                    user.user_id
                );
                Ok(bank_account)
            }
            Err(error) => {
                tracing::error!(
                    "could not save bank account record for user {}: {error}",
                    user.user_id
                );
                self.remove_funding_source(&new_bank_account.funding_source_url)
                    .await;
                self.remove_item(&new_bank_account.access_token).await;
                Err(error)
            }
        }
    }

    async fn create_funding_source(
        &self,
        access_token: &str,
        account_id: &str,
        bank_name: &str,
        user: &User,
    ) -> Result<String, Error> {
        let processor_token = self
            .payment_rail
            .create_processor_token(access_token, account_id)
            .await
            .inspect_err(|error| {
                tracing::error!(
                    "could not create processor token for account {account_id}: {error}"
                )
            })?;

        let funding_source_url = self
            .payment_rail
            .create_funding_source(&user.customer_id, &processor_token, bank_name)
            .await
            .inspect_err(|error| {
                tracing::error!(
                    "could not create funding source for customer {}: {error}",
                    user.customer_id
                )
            })?;

        funding_source_url.ok_or_else(|| {
            tracing::error!(
                "payment rail did not return a funding source for customer {}",
                user.customer_id
            );
            Error::MissingFundingSource
        })
    }

    async fn remove_item(&self, access_token: &str) {
        if let Err(error) = self.aggregator.remove_item(access_token).await {
            tracing::error!("could not invalidate access token after failed link: {error}");
        }
    }

    async fn remove_funding_source(&self, funding_source_url: &str) {
        if let Err(error) = self
            .payment_rail
            .remove_funding_source(funding_source_url)
            .await
        {
            tracing::error!(
                "could not remove funding source {funding_source_url} after failed link: {error}"
            );
        }
    }
}
