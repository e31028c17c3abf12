//! Sending money from one of the user's linked banks to another user's bank.

use std::sync::Arc;

use axum::extract::FromRef;
use serde::Deserialize;

use crate::{
    AppState, BankAccountId, Error, PaymentRail, RecordStore, Service, ShareableIdCipher, UserId,
};

/// A request to move money to the bank account behind a shareable ID.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferRequest {
    /// The ID of the sender's bank account record.
    pub source_bank_id: BankAccountId,
    /// The shareable ID the receiver gave the sender.
    pub receiver_shareable_id: String,
    /// The number of dollars to send.
    pub amount: f64,
}

/// Round `amount` to whole cents, the precision the payment rail accepts.
///
/// # Errors
///
/// Returns [Error::InvalidInput] if `amount` is not a number or rounds to
/// less than one cent.
fn whole_cents(amount: f64) -> Result<f64, Error> {
    let cents = (amount * 100.0).round();

    if !cents.is_finite() || cents < 1.0 {
        return Err(Error::InvalidInput(
            "The amount must be at least $0.01.".to_owned(),
        ));
    }

    Ok(cents / 100.0)
}

/// Resolves the two ends of a transfer and asks the payment rail to move the
/// money.
#[derive(Clone)]
pub struct FundsTransfer {
    record_store: Arc<dyn RecordStore>,
    payment_rail: Arc<dyn PaymentRail>,
    shareable_ids: ShareableIdCipher,
}

impl FromRef<AppState> for FundsTransfer {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.record_store.clone(),
            state.payment_rail.clone(),
            state.shareable_ids.clone(),
        )
    }
}

impl FundsTransfer {
    /// Create a transfer service from the clients it coordinates.
    pub fn new(
        record_store: Arc<dyn RecordStore>,
        payment_rail: Arc<dyn PaymentRail>,
        shareable_ids: ShareableIdCipher,
    ) -> Self {
        Self {
            record_store,
            payment_rail,
            shareable_ids,
        }
    }

    /// Send `request.amount` dollars from the bank account of `user_id`
    /// named in `request` to the receiver's bank and return the URL of the
    /// transfer.
    ///
    /// # Errors
    ///
    /// - [Error::InvalidInput] if the amount is less than one cent, the
    ///   receiver cannot be found, or both ends are the same account.
    /// - [Error::NotFound] if the source bank account does not exist or
    ///   belongs to another user.
    /// - [Error::InvalidShareableId] if the shareable ID was altered or was
    ///   not issued by this server.
    /// - [Error::MissingResourceLocation] if the payment rail did not return
    ///   the transfer's URL.
    pub async fn transfer_funds(
        &self,
        user_id: &UserId,
        request: &TransferRequest,
    ) -> Result<String, Error> {
        let amount = whole_cents(request.amount)?;

        let source = self
            .record_store
            .get_bank_account_record(&request.source_bank_id)
            .await?;

        if source.user_id != *user_id {
            tracing::warn!(
                "user {user_id} tried to send money from bank account {} owned by another user",
                source.id
            );
            return Err(Error::NotFound);
        }

        let receiver_account_id = self
            .shareable_ids
            .decrypt(&request.receiver_shareable_id)?;

        let receiver = match self
            .record_store
            .get_bank_account_record_by_account_id(&receiver_account_id)
            .await
        {
            Ok(receiver) => receiver,
            Err(Error::NotFound) => {
                return Err(Error::InvalidInput(
                    "No linked bank account matches the receiver's shareable ID.".to_owned(),
                ));
            }
            Err(error) => return Err(error),
        };

        if receiver.funding_source_url == source.funding_source_url {
            return Err(Error::InvalidInput(
                "The sending and receiving bank accounts must be different.".to_owned(),
            ));
        }

        let transfer_url = self
            .payment_rail
            .create_transfer(
                &source.funding_source_url,
                &receiver.funding_source_url,
                amount,
            )
            .await?
            .ok_or(Error::MissingResourceLocation(Service::PaymentRail))?;

        tracing::info!(
            "user {user_id} sent {:.2} from bank account {} to bank account {}: {transfer_url}",
            amount,
            source.id,
            receiver.id
        );

        Ok(transfer_url)
    }
}
