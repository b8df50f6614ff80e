//! IPFS HTTP API client (`/api/v0/add` and `/api/v0/cat`)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::content::ContentStore;
use crate::error::{BountyError, Result};

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

pub struct IpfsContentStore {
    client: Client,
    endpoint: String,
    project_id: Option<String>,
    project_secret: Option<String>,
}

impl IpfsContentStore {
    pub fn new(
        endpoint: &str,
        project_id: Option<String>,
        project_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("bounty-ledger/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| BountyError::Content(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            project_secret,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.project_id {
            Some(id) => request.basic_auth(id, self.project_secret.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String> {
        let size = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name("content"));
        let request = self
            .client
            .post(format!("{}/add", self.endpoint))
            .multipart(form);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BountyError::Content(format!("IPFS upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "IPFS upload rejected");
            return Err(BountyError::Content(format!(
                "IPFS upload failed with status: {status}"
            )));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| BountyError::Content(format!("Failed to decode IPFS response: {e}")))?;
        debug!(hash = %added.hash, size, "Uploaded content to IPFS");
        Ok(added.hash)
    }

    async fn get(&self, handle: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .post(format!("{}/cat", self.endpoint))
            .query(&[("arg", handle)]);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| BountyError::Content(format!("IPFS fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BountyError::Content(format!(
                "IPFS get failed with status: {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BountyError::Content(format!("Failed to read IPFS response: {e}")))?;
        Ok(body.to_vec())
    }

    fn uri(&self, handle: &str) -> String {
        format!("ipfs://{handle}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let store = IpfsContentStore::new(
            "https://ipfs.infura.io:5001/api/v0/",
            None,
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(store.endpoint, "https://ipfs.infura.io:5001/api/v0");
    }

    #[test]
    fn test_add_response_shape() {
        let parsed: AddResponse = serde_json::from_str(
            r#"{"Name":"content","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"12"}"#,
        )
        .unwrap();
        assert_eq!(parsed.hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    }

    #[test]
    fn test_uri_scheme() {
        let store =
            IpfsContentStore::new("http://127.0.0.1:5001/api/v0", None, None, Duration::from_secs(2))
                .unwrap();
        assert_eq!(store.uri("QmHash"), "ipfs://QmHash");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_content_error() {
        let store =
            IpfsContentStore::new("http://127.0.0.1:9/api/v0", None, None, Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            store.put(b"body".to_vec()).await,
            Err(BountyError::Content(_))
        ));
    }
}
