// Firestore REST client authenticated with a service-account JWT

pub mod codec;
pub mod query;

use std::future::Future;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AyumiError, Result};
use crate::utils::config::FirebaseCredentials;
use codec::{decode_fields, document_id, encode_fields};
pub use query::{Direction, Op, StructuredQuery};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const PAGE_SIZE: u32 = 300;
const TRANSACTION_ATTEMPTS: u32 = 5;
const DOCUMENT_ID_LEN: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
}

impl ServiceAccount {
    pub fn load(source: &FirebaseCredentials) -> Result<Self> {
        let raw = match source {
            FirebaseCredentials::Base64(encoded) => {
                let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                    AyumiError::Config(format!("FIREBASE_SERVICE_ACCOUNT_BASE64 is not base64: {e}"))
                })?;
                String::from_utf8(bytes).map_err(|e| {
                    AyumiError::Config(format!("service account is not UTF-8: {e}"))
                })?
            }
            FirebaseCredentials::File(path) => std::fs::read_to_string(path).map_err(|e| {
                AyumiError::Config(format!("cannot read {}: {e}", path.display()))
            })?,
        };
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    scope: &'a str,
    iat: i64,
    exp: i64,
}

struct AccessToken {
    value: String,
    expires_at: i64,
}

/// A document id with its decoded fields
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    fn from_raw(raw: &Value) -> Option<Self> {
        let name = raw.get("name")?.as_str()?;
        Some(Self {
            id: document_id(name).to_string(),
            data: decode_fields(raw.get("fields")),
        })
    }

    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// One write inside a commit
#[derive(Debug, Clone)]
pub enum Write {
    /// Writes a new document; the commit fails if `path` already exists
    Create { path: String, fields: Value },
    /// Merge the top-level fields of `fields` into `path`
    Update { path: String, fields: Value },
    Delete { path: String },
}

impl Write {
    fn to_json(&self, documents_root: &str) -> Value {
        let name = |path: &str| format!("{documents_root}/{path}");
        match self {
            Write::Create { path, fields } => {
                let map = fields.as_object().cloned().unwrap_or_default();
                json!({
                    "update": { "name": name(path), "fields": encode_fields(&map) },
                    "currentDocument": { "exists": false },
                })
            }
            Write::Update { path, fields } => {
                let map = fields.as_object().cloned().unwrap_or_default();
                let mask: Vec<&String> = map.keys().collect();
                json!({
                    "update": { "name": name(path), "fields": encode_fields(&map) },
                    "updateMask": { "fieldPaths": mask },
                })
            }
            Write::Delete { path } => json!({ "delete": name(path) }),
        }
    }
}

/// A random id in the style of Firestore's auto-generated ones
pub fn new_document_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

fn should_retry(err: &AyumiError, attempt: u32) -> bool {
    matches!(err, AyumiError::Aborted(_)) && attempt < TRANSACTION_ATTEMPTS
}

pub struct Firestore {
    http: Client,
    account: ServiceAccount,
    token: RwLock<Option<AccessToken>>,
}

impl Firestore {
    pub fn new(http: Client, account: ServiceAccount) -> Self {
        Self {
            http,
            account,
            token: RwLock::new(None),
        }
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.account.project_id)
    }

    fn documents_root(&self) -> String {
        format!("{}/documents", self.database())
    }

    fn url(&self, path: &str) -> String {
        format!("https://firestore.googleapis.com/v1/{}/{}", self.documents_root(), path)
    }

    fn full_name(&self, path: &str) -> String {
        format!("{}/{}", self.documents_root(), path)
    }

    async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > now + 60 {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if token.expires_at > now + 60 {
                return Ok(token.value.clone());
            }
        }

        let claims = Claims {
            iss: &self.account.client_email,
            sub: &self.account.client_email,
            aud: TOKEN_URL,
            scope: DATASTORE_SCOPE,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token exchange rejected: {}", body);
            return Err(AyumiError::Authentication("token exchange rejected".into()));
        }

        let body: Value = response.json().await?;
        let value = body["access_token"]
            .as_str()
            .ok_or_else(|| AyumiError::Authentication("no access_token in response".into()))?
            .to_string();
        let expires_in = body["expires_in"].as_i64().unwrap_or(TOKEN_LIFETIME_SECS);

        *slot = Some(AccessToken {
            value: value.clone(),
            expires_at: now + expires_in,
        });
        debug!("Refreshed Firestore access token");
        Ok(value)
    }

    async fn ensure_ok(response: Response, op: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!("Firestore {} failed ({}): {}", op, status, body);
        if status == StatusCode::CONFLICT {
            return Err(AyumiError::Aborted(op.to_string()));
        }
        Err(AyumiError::Database(format!("{op} failed with {status}")))
    }

    pub async fn get_document(&self, path: &str) -> Result<Option<Value>> {
        self.fetch(path, None).await
    }

    pub async fn get_in_transaction(&self, path: &str, transaction: &str) -> Result<Option<Value>> {
        self.fetch(path, Some(transaction)).await
    }

    async fn fetch(&self, path: &str, transaction: Option<&str>) -> Result<Option<Value>> {
        let token = self.access_token().await?;
        let mut request = self.http.get(self.url(path)).bearer_auth(&token);
        if let Some(tx) = transaction {
            request = request.query(&[("transaction", tx)]);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: Value = Self::ensure_ok(response, "get").await?.json().await?;
        Ok(Some(decode_fields(raw.get("fields"))))
    }

    /// Creates or merges a document. Only the top-level keys of `data` are touched.
    pub async fn set_document(&self, path: &str, data: &Value) -> Result<()> {
        let fields = data
            .as_object()
            .ok_or_else(|| AyumiError::Database("document body must be an object".into()))?;
        let token = self.access_token().await?;

        let mask: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();

        let response = self
            .http
            .patch(self.url(path))
            .bearer_auth(&token)
            .query(&mask)
            .json(&json!({ "fields": encode_fields(fields) }))
            .send()
            .await?;
        Self::ensure_ok(response, "patch").await?;
        Ok(())
    }

    /// Every document in a collection, following page tokens
    pub async fn list_documents(&self, collection_path: &str) -> Result<Vec<Document>> {
        let token = self.access_token().await?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url(collection_path))
                .bearer_auth(&token)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(ref t) = page_token {
                request = request.query(&[("pageToken", t)]);
            }

            let page: Value = Self::ensure_ok(request.send().await?, "list")
                .await?
                .json()
                .await?;

            if let Some(raw_docs) = page["documents"].as_array() {
                documents.extend(raw_docs.iter().filter_map(Document::from_raw));
            }

            match page["nextPageToken"].as_str() {
                Some(next) if !next.is_empty() => page_token = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(documents)
    }

    /// Runs a query under `parent_path` (e.g. `users/123`), or the root when empty
    pub async fn run_query(&self, parent_path: &str, query: &StructuredQuery) -> Result<Vec<Document>> {
        let token = self.access_token().await?;
        let parent = if parent_path.is_empty() {
            self.documents_root()
        } else {
            self.full_name(parent_path)
        };
        let url = format!("https://firestore.googleapis.com/v1/{parent}:runQuery");

        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(&query.to_json())
            .send()
            .await?;
        let rows: Vec<Value> = Self::ensure_ok(response, "runQuery").await?.json().await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(Document::from_raw)
            .collect())
    }

    pub async fn begin_transaction(&self) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!(
            "https://firestore.googleapis.com/v1/{}:beginTransaction",
            self.documents_root()
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await?;
        let body: Value = Self::ensure_ok(response, "beginTransaction").await?.json().await?;

        body["transaction"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AyumiError::Database("beginTransaction returned no id".into()))
    }

    /// Applies `writes` atomically; inside `transaction` when one is given
    pub async fn commit(&self, transaction: Option<&str>, writes: Vec<Write>) -> Result<()> {
        let token = self.access_token().await?;
        let url = format!("https://firestore.googleapis.com/v1/{}:commit", self.documents_root());

        let root = self.documents_root();
        let writes: Vec<Value> = writes.iter().map(|w| w.to_json(&root)).collect();

        let mut body = json!({ "writes": writes });
        if let Some(tx) = transaction {
            body["transaction"] = json!(tx);
        }

        let response = self.http.post(url).bearer_auth(&token).json(&body).send().await?;
        Self::ensure_ok(response, "commit").await?;
        Ok(())
    }

    /// Runs `body` inside a read-write transaction and commits the writes it returns.
    ///
    /// `body` gets the transaction id for its reads and may run more than once:
    /// when Firestore aborts the transaction on contention it is retried from a
    /// fresh transaction, up to `TRANSACTION_ATTEMPTS` times. Nothing is written
    /// unless the commit succeeds.
    pub async fn run_transaction<T, F, Fut>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(Vec<Write>, T)>>,
    {
        let mut attempt = 1;
        loop {
            let tx = self.begin_transaction().await?;
            let outcome = match body(tx.clone()).await {
                Ok((writes, value)) => self.commit(Some(&tx), writes).await.map(|()| value),
                Err(e) => {
                    if !matches!(e, AyumiError::Aborted(_)) {
                        self.rollback(&tx).await;
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(e) if should_retry(&e, attempt) => {
                    debug!("Transaction attempt {} aborted, retrying", attempt);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Releases a transaction that will not be committed
    pub async fn rollback(&self, transaction: &str) {
        let result: Result<()> = async {
            let token = self.access_token().await?;
            let url = format!("https://firestore.googleapis.com/v1/{}:rollback", self.documents_root());
            let response = self
                .http
                .post(url)
                .bearer_auth(&token)
                .json(&json!({ "transaction": transaction }))
                .send()
                .await?;
            Self::ensure_ok(response, "rollback").await.map(|_| ())
        }
        .await;

        if let Err(e) = result {
            warn!("Rollback failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "projects/p/databases/(default)/documents";

    #[test]
    fn test_create_requires_missing_document() {
        let write = Write::Create {
            path: "users/1/immersion_logs/abc".into(),
            fields: json!({ "activity": { "amount": 3 } }),
        };
        let body = write.to_json(ROOT);
        assert_eq!(body["update"]["name"], format!("{ROOT}/users/1/immersion_logs/abc"));
        assert_eq!(body["currentDocument"]["exists"], false);
        assert!(body.get("updateMask").is_none());
    }

    #[test]
    fn test_update_masks_top_level_fields() {
        let write = Write::Update {
            path: "users/1".into(),
            fields: json!({ "stats": {}, "summary": {} }),
        };
        let body = write.to_json(ROOT);
        assert_eq!(body["updateMask"]["fieldPaths"], json!(["stats", "summary"]));
        assert!(body.get("currentDocument").is_none());
        assert_eq!(Write::Delete { path: "users/1".into() }.to_json(ROOT)["delete"], format!("{ROOT}/users/1"));
    }

    #[test]
    fn test_only_aborted_transactions_retry() {
        let aborted = AyumiError::Aborted("commit".into());
        assert!(should_retry(&aborted, 1));
        assert!(should_retry(&aborted, TRANSACTION_ATTEMPTS - 1));
        assert!(!should_retry(&aborted, TRANSACTION_ATTEMPTS));
        assert!(!should_retry(&AyumiError::Database("commit failed with 500".into()), 1));
    }

    #[test]
    fn test_generated_ids() {
        let a = new_document_id();
        assert_eq!(a.len(), DOCUMENT_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, new_document_id());
    }
}
