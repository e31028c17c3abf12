//! A record store backed by a local SQLite database.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, Row};

use crate::{
    BankAccount, BankAccountId, Error, NewBankAccount, NewUser, RecordStore, User, UserId,
};

/// A [RecordStore] that keeps records in SQLite.
///
/// The record ID of a bank account is the row ID of its record.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Wrap `connection` and create the record tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables could not be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        create_tables(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }
}

fn create_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            user_id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            customer_url TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bank_account (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            bank_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            access_token TEXT NOT NULL,
            funding_source_url TEXT NOT NULL,
            shareable_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_bank_account_user_id ON bank_account(user_id);
        CREATE INDEX IF NOT EXISTS idx_bank_account_account_id ON bank_account(account_id);",
    )
}

const BANK_ACCOUNT_COLUMNS: &str =
    "id, user_id, bank_id, account_id, access_token, funding_source_url, shareable_id";

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let user_id: String = row.get(0)?;

    Ok(User {
        user_id: UserId::new(user_id),
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        customer_id: row.get(4)?,
        customer_url: row.get(5)?,
    })
}

fn map_bank_account_row(row: &Row) -> Result<BankAccount, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let user_id: String = row.get(1)?;

    Ok(BankAccount {
        id: BankAccountId::new(id.to_string()),
        user_id: UserId::new(user_id),
        bank_id: row.get(2)?,
        account_id: row.get(3)?,
        access_token: row.get(4)?,
        funding_source_url: row.get(5)?,
        shareable_id: row.get(6)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create_user_record(&self, user: NewUser) -> Result<User, Error> {
        self.connection()?.execute(
            "INSERT INTO user (user_id, email, first_name, last_name, customer_id, customer_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            (
                user.user_id.as_str(),
                &user.email,
                &user.first_name,
                &user.last_name,
                &user.customer_id,
                &user.customer_url,
            ),
        )?;

        Ok(user)
    }

    async fn get_user_record(&self, user_id: &UserId) -> Result<User, Error> {
        self.connection()?
            .prepare(
                "SELECT user_id, email, first_name, last_name, customer_id, customer_url
                FROM user WHERE user_id = :user_id;",
            )?
            .query_row(&[(":user_id", user_id.as_str())], map_user_row)
            .map_err(|error| error.into())
    }

    async fn create_bank_account_record(
        &self,
        bank_account: NewBankAccount,
    ) -> Result<BankAccount, Error> {
        let connection = self.connection()?;

        connection.execute(
            "INSERT INTO bank_account
            (user_id, bank_id, account_id, access_token, funding_source_url, shareable_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            (
                bank_account.user_id.as_str(),
                &bank_account.bank_id,
                &bank_account.account_id,
                &bank_account.access_token,
                &bank_account.funding_source_url,
                &bank_account.shareable_id,
            ),
        )?;

        let id = connection.last_insert_rowid();

        Ok(bank_account.with_id(BankAccountId::new(id.to_string())))
    }

    async fn list_bank_account_records(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BankAccount>, Error> {
        self.connection()?
            .prepare(&format!(
                "SELECT {BANK_ACCOUNT_COLUMNS} FROM bank_account
                WHERE user_id = :user_id ORDER BY id ASC;"
            ))?
            .query_map(&[(":user_id", user_id.as_str())], map_bank_account_row)?
            .map(|maybe_account| maybe_account.map_err(|error| error.into()))
            .collect()
    }

    async fn get_bank_account_record(&self, id: &BankAccountId) -> Result<BankAccount, Error> {
        // IDs from other backends are not row IDs and cannot match.
        let Ok(row_id) = id.as_str().parse::<i64>() else {
            return Err(Error::NotFound);
        };

        self.connection()?
            .prepare(&format!(
                "SELECT {BANK_ACCOUNT_COLUMNS} FROM bank_account WHERE id = :id;"
            ))?
            .query_row(&[(":id", &row_id)], map_bank_account_row)
            .map_err(|error| error.into())
    }

    async fn get_bank_account_record_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<BankAccount, Error> {
        self.connection()?
            .prepare(&format!(
                "SELECT {BANK_ACCOUNT_COLUMNS} FROM bank_account
                WHERE account_id = :account_id ORDER BY id ASC LIMIT 1;"
            ))?
            .query_row(&[(":account_id", account_id)], map_bank_account_row)
            .map_err(|error| error.into())
    }
}
