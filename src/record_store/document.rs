//! A record store backed by the remote document database that sits next to
//! the identity service.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    BankAccount, BankAccountId, DatabaseConfig, Error, IdentityConfig, NewBankAccount, NewUser,
    RecordStore, Service, User, UserId,
    identity::UNIQUE_ID,
    remote::{check_status, request_error},
};

/// A [RecordStore] that keeps records as documents in two collections of
/// the remote document database.
#[derive(Debug, Clone)]
pub struct DocumentRecordStore {
    client: Client,
    identity: IdentityConfig,
    database: DatabaseConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentRequest<'a, T> {
    document_id: &'a str,
    data: T,
}

#[derive(Deserialize)]
struct Document<T> {
    #[serde(rename = "$id")]
    id: String,
    #[serde(flatten)]
    fields: T,
}

#[derive(Deserialize)]
struct DocumentList<T> {
    documents: Vec<Document<T>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserFields {
    user_id: String,
    email: String,
    first_name: String,
    last_name: String,
    customer_id: String,
    customer_url: String,
}

impl From<NewUser> for UserFields {
    fn from(user: NewUser) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            customer_id: user.customer_id,
            customer_url: user.customer_url,
        }
    }
}

impl From<UserFields> for User {
    fn from(fields: UserFields) -> Self {
        Self {
            user_id: UserId::new(fields.user_id),
            email: fields.email,
            first_name: fields.first_name,
            last_name: fields.last_name,
            customer_id: fields.customer_id,
            customer_url: fields.customer_url,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankAccountFields {
    user_id: String,
    bank_id: String,
    account_id: String,
    access_token: String,
    funding_source_url: String,
    shareable_id: String,
}

impl From<NewBankAccount> for BankAccountFields {
    fn from(bank_account: NewBankAccount) -> Self {
        Self {
            user_id: bank_account.user_id.to_string(),
            bank_id: bank_account.bank_id,
            account_id: bank_account.account_id,
            access_token: bank_account.access_token,
            funding_source_url: bank_account.funding_source_url,
            shareable_id: bank_account.shareable_id,
        }
    }
}

impl From<Document<BankAccountFields>> for BankAccount {
    fn from(document: Document<BankAccountFields>) -> Self {
        let fields = document.fields;

        Self {
            id: BankAccountId::new(document.id),
            user_id: UserId::new(fields.user_id),
            bank_id: fields.bank_id,
            account_id: fields.account_id,
            access_token: fields.access_token,
            funding_source_url: fields.funding_source_url,
            shareable_id: fields.shareable_id,
        }
    }
}

/// The most documents returned by one list request. The database returns
/// only 25 when no limit is given.
const LIST_LIMIT: u32 = 100;

/// The longest document ID the database issues.
const MAX_DOCUMENT_ID_LENGTH: usize = 36;

#[derive(Serialize)]
struct Query<'a> {
    method: &'a str,
    attribute: &'a str,
    values: [&'a str; 1],
}

#[derive(Serialize)]
struct LimitQuery {
    method: &'static str,
    values: [u32; 1],
}

/// Whether `id` has the shape of a document ID: up to 36 ASCII letters,
/// digits, periods, hyphens and underscores, starting with a letter or digit.
fn is_document_id(id: &str) -> bool {
    let mut chars = id.chars();

    id.len() <= MAX_DOCUMENT_ID_LENGTH
        && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// A query that matches documents whose `attribute` equals `value`.
fn equal_query(attribute: &str, value: &str) -> Result<String, Error> {
    serde_json::to_string(&Query {
        method: "equal",
        attribute,
        values: [value],
    })
    .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

fn limit_query(limit: u32) -> Result<String, Error> {
    serde_json::to_string(&LimitQuery {
        method: "limit",
        values: [limit],
    })
    .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

impl DocumentRecordStore {
    /// Create a store for the collections in `database`, reached with the
    /// endpoint and server key in `identity`.
    pub fn new(identity: IdentityConfig, database: DatabaseConfig) -> Self {
        Self {
            client: Client::new(),
            identity,
            database,
        }
    }

    fn documents_url(&self, collection_id: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.identity.endpoint.trim_end_matches('/'),
            self.database.database_id,
            collection_id
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.identity.project_id)
            .header("X-Appwrite-Key", &self.identity.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(request_error(Service::RecordStore))?;

        let response = match check_status(Service::RecordStore, response).await {
            Ok(response) => response,
            Err(Error::Upstream { status: 404, .. }) => return Err(Error::NotFound),
            Err(error) => return Err(error),
        };

        response
            .json()
            .await
            .map_err(request_error(Service::RecordStore))
    }

    async fn create_document<T, F>(
        &self,
        collection_id: &str,
        fields: F,
    ) -> Result<Document<T>, Error>
    where
        T: DeserializeOwned,
        F: Serialize + Send,
    {
        let request = self
            .client
            .post(self.documents_url(collection_id))
            .json(&CreateDocumentRequest {
                document_id: UNIQUE_ID,
                data: fields,
            });

        self.send(request).await
    }

    async fn list_documents<T: DeserializeOwned>(
        &self,
        collection_id: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Document<T>>, Error> {
        let request = self
            .client
            .get(self.documents_url(collection_id))
            .query(&[
                ("queries[]", equal_query(attribute, value)?),
                ("queries[]", limit_query(LIST_LIMIT)?),
            ]);

        let list: DocumentList<T> = self.send(request).await?;

        Ok(list.documents)
    }
}

#[async_trait]
impl RecordStore for DocumentRecordStore {
    async fn create_user_record(&self, user: NewUser) -> Result<User, Error> {
        let document: Document<UserFields> = self
            .create_document(&self.database.user_collection_id, UserFields::from(user))
            .await
            .inspect_err(|error| tracing::error!("could not create user record: {error}"))?;

        Ok(document.fields.into())
    }

    async fn get_user_record(&self, user_id: &UserId) -> Result<User, Error> {
        self.list_documents::<UserFields>(
            &self.database.user_collection_id,
            "userId",
            user_id.as_str(),
        )
        .await?
        .into_iter()
        .next()
        .map(|document| document.fields.into())
        .ok_or(Error::NotFound)
    }

    async fn create_bank_account_record(
        &self,
        bank_account: NewBankAccount,
    ) -> Result<BankAccount, Error> {
        let document: Document<BankAccountFields> = self
            .create_document(
                &self.database.bank_collection_id,
                BankAccountFields::from(bank_account),
            )
            .await
            .inspect_err(|error| tracing::error!("could not create bank account record: {error}"))?;

        Ok(document.into())
    }

    async fn list_bank_account_records(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BankAccount>, Error> {
        let documents = self
            .list_documents::<BankAccountFields>(
                &self.database.bank_collection_id,
                "userId",
                user_id.as_str(),
            )
            .await?;

        Ok(documents.into_iter().map(BankAccount::from).collect())
    }

    async fn get_bank_account_record(&self, id: &BankAccountId) -> Result<BankAccount, Error> {
        if !is_document_id(id.as_str()) {
            tracing::warn!("refusing to look up bank account with malformed ID {id:?}");
            return Err(Error::NotFound);
        }

        let url = format!(
            "{}/{}",
            self.documents_url(&self.database.bank_collection_id),
            id
        );

        let document: Document<BankAccountFields> = self.send(self.client.get(url)).await?;

        Ok(document.into())
    }

    async fn get_bank_account_record_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<BankAccount, Error> {
        self.list_documents::<BankAccountFields>(
            &self.database.bank_collection_id,
            "accountId",
            account_id,
        )
        .await?
        .into_iter()
        .next()
        .map(BankAccount::from)
        .ok_or(Error::NotFound)
    }
}
