//! services/api/src/adapters/elastic.rs
//!
//! The `SearchIndex` port over the Elasticsearch REST API, using `reqwest`.
//!
//! Status codes are classified into the port's failure kinds: 404 is
//! `NotFound`, 408/429/5xx and transport errors are `TransientIo`, any other
//! rejection is `Permanent`.

use async_trait::async_trait;
use lingo_core::domain::BulkInstruction;
use lingo_core::ports::{IndexError, IndexResult, SearchIndex};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

pub struct ElasticsearchAdapter {
    client: Client,
    base_url: String,
}

impl ElasticsearchAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn doc_url(&self, index: &str, id: i64) -> String {
        format!("{}/{}/_doc/{}", self.base_url, index, id)
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    version: VersionInfo,
}

#[derive(Deserialize)]
struct VersionInfo {
    number: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

fn transport(e: reqwest::Error) -> IndexError {
    IndexError::TransientIo(e.to_string())
}

/// Passes successful responses through and classifies the rest.
async fn check(response: Response) -> IndexResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(IndexError::NotFound);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{}: {}", status, body);
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Err(IndexError::TransientIo(message))
    } else {
        Err(IndexError::Permanent(message))
    }
}

/// Renders bulk instructions as the newline-delimited body `_bulk` expects.
pub fn bulk_body(instructions: &[BulkInstruction]) -> IndexResult<String> {
    let mut body = String::new();
    for instruction in instructions {
        let mut action = serde_json::Map::new();
        action.insert(
            instruction.operation.as_str().to_string(),
            json!({ "_index": instruction.index, "_id": instruction.id.to_string() }),
        );
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&instruction.payload)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl SearchIndex for ElasticsearchAdapter {
    async fn server_version(&self) -> IndexResult<String> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(transport)?;
        let info: InfoResponse = check(response).await?.json().await.map_err(transport)?;
        Ok(info.version.number)
    }

    async fn exists(&self, index: &str, id: i64) -> IndexResult<bool> {
        let response = self
            .client
            .head(self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        match check(response).await {
            Ok(_) => Ok(true),
            Err(IndexError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, index: &str, id: i64) -> IndexResult<Option<serde_json::Value>> {
        let response = self
            .client
            .get(self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        let response = match check(response).await {
            Ok(response) => response,
            Err(IndexError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let doc: GetResponse = response.json().await.map_err(transport)?;
        Ok(if doc.found { doc.source } else { None })
    }

    async fn index(&self, index: &str, id: i64, document: serde_json::Value) -> IndexResult<()> {
        let response = self
            .client
            .put(self.doc_url(index, id))
            .json(&document)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn delete(&self, index: &str, id: i64) -> IndexResult<()> {
        let response = self
            .client
            .delete(self.doc_url(index, id))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn bulk(&self, instructions: &[BulkInstruction]) -> IndexResult<()> {
        let body = bulk_body(instructions)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let result: BulkResponse = check(response).await?.json().await.map_err(transport)?;
        if result.errors {
            let first = result
                .items
                .iter()
                .filter_map(|item| item.as_object()?.values().next()?.get("error"))
                .next()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown bulk error".to_string());
            return Err(IndexError::Permanent(first));
        }
        Ok(())
    }
}
