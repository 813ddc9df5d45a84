//! HTTP transport for the farmer storage-proof RPC.
//!
//! `POST http://{address}:{port}/proofs` with `{"data_hash", "challenge"}`;
//! the farmer answers `{"proof": <nested proof>}`.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::domain::errors::RpcError;
use crate::domain::models::{Contact, StorageProof};
use crate::domain::ports::FarmerClient;

#[derive(Debug, Serialize)]
struct ProofRequest<'a> {
    data_hash: &'a str,
    challenge: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProofResponse {
    proof: StorageProof,
}

pub struct HttpFarmerClient {
    http_client: ReqwestClient,
    timeout: Duration,
}

impl HttpFarmerClient {
    /// Build a client whose requests are abandoned after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let http_client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self {
            http_client,
            timeout,
        })
    }
}

#[async_trait]
impl FarmerClient for HttpFarmerClient {
    #[instrument(skip(self, contact), fields(farmer = %contact.id))]
    async fn get_storage_proof(
        &self,
        contact: &Contact,
        data_hash: &str,
        challenge: &str,
    ) -> Result<StorageProof, RpcError> {
        let request = self
            .http_client
            .post(format!("{}/proofs", contact.base_url()))
            .json(&ProofRequest {
                data_hash,
                challenge,
            })
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RpcError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: ProofResponse = tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))??;
        Ok(body.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ProofElement;
    use mockito::{Matcher, Server};

    fn contact_for(server: &Server) -> Contact {
        let host = server.host_with_port();
        let (address, port) = host.rsplit_once(':').unwrap();
        Contact::new("farmer-1", address, port.parse().unwrap())
    }

    #[tokio::test]
    async fn test_fetches_proof() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/proofs")
            .match_body(Matcher::Json(serde_json::json!({
                "data_hash": "abcd",
                "challenge": "ff00"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"proof": [["aa"], "bb"]}"#)
            .create_async()
            .await;

        let client = HttpFarmerClient::new(Duration::from_secs(5)).unwrap();
        let proof = client
            .get_storage_proof(&contact_for(&server), "abcd", "ff00")
            .await
            .unwrap();

        assert_eq!(
            proof.root(),
            &ProofElement::Branch(vec![
                ProofElement::Branch(vec![ProofElement::Hash("aa".to_string())]),
                ProofElement::Hash("bb".to_string()),
            ])
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/proofs")
            .with_status(404)
            .with_body("shard not found")
            .create_async()
            .await;

        let client = HttpFarmerClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .get_storage_proof(&contact_for(&server), "abcd", "ff00")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RpcError::Rejected { status: 404, ref body } if body == "shard not found"
        ));
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/proofs")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = HttpFarmerClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .get_storage_proof(&contact_for(&server), "abcd", "ff00")
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_farmer_is_transport_error() {
        let client = HttpFarmerClient::new(Duration::from_secs(2)).unwrap();
        let err = client
            .get_storage_proof(&Contact::new("gone", "127.0.0.1", 1), "abcd", "ff00")
            .await
            .unwrap_err();

        assert!(matches!(err, RpcError::Transport(_) | RpcError::Timeout(_)));
    }
}
