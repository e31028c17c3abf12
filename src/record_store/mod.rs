//! Persistence for user profiles and linked bank account records.
//!
//! Two backends are provided: [DocumentRecordStore] keeps records in the
//! remote document database next to the identity service and
//! [SqliteRecordStore] keeps them in a local SQLite database.

mod document;
mod sqlite;

pub use document::DocumentRecordStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;

use crate::{BankAccount, BankAccountId, Error, NewBankAccount, NewUser, User, UserId};

/// Stores user records and bank account records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    async fn create_user_record(&self, user: NewUser) -> Result<User, Error>;

    /// Get the user record for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no record for the user.
    async fn get_user_record(&self, user_id: &UserId) -> Result<User, Error>;

    /// Persist a bank account record and return it with its generated ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    async fn create_bank_account_record(
        &self,
        bank_account: NewBankAccount,
    ) -> Result<BankAccount, Error>;

    /// Get all bank account records owned by `user_id` in the order they were
    /// created.
    ///
    /// # Errors
    ///
    /// Returns an error if the records could not be read.
    async fn list_bank_account_records(&self, user_id: &UserId)
    -> Result<Vec<BankAccount>, Error>;

    /// Get the bank account record with `id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no such record.
    async fn get_bank_account_record(&self, id: &BankAccountId) -> Result<BankAccount, Error>;

    /// Get the bank account record for the aggregator account `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if there is no such record.
    async fn get_bank_account_record_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<BankAccount, Error>;
}
