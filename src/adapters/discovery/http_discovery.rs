//! Contact discovery over HTTP seed nodes.
//!
//! Each seed is asked `GET {seed}/contacts/{id}` in configured order; the
//! first seed that knows the contact wins. A 404 means "unknown here".

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::ContactError;
use crate::domain::models::Contact;
use crate::domain::ports::NetworkDiscovery;

pub struct HttpDiscovery {
    http_client: ReqwestClient,
    seeds: Vec<String>,
}

impl HttpDiscovery {
    pub fn new(seeds: Vec<String>, timeout: Duration) -> Result<Self, ContactError> {
        let http_client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContactError::Discovery(e.to_string()))?;
        let seeds = seeds
            .into_iter()
            .map(|s| s.trim_end_matches('/').to_string())
            .collect();
        Ok(Self { http_client, seeds })
    }

    async fn ask_seed(&self, seed: &str, id: &str) -> Result<Option<Contact>, ContactError> {
        let response = self
            .http_client
            .get(format!("{seed}/contacts/{id}"))
            .send()
            .await
            .map_err(|e| ContactError::Discovery(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let contact: Contact = response
                    .json()
                    .await
                    .map_err(|e| ContactError::InvalidRecord(e.to_string()))?;
                if contact.id != id {
                    return Err(ContactError::InvalidRecord(format!(
                        "seed returned {} for {id}",
                        contact.id
                    )));
                }
                Ok(Some(contact))
            }
            status => Err(ContactError::Discovery(format!("{seed} answered {status}"))),
        }
    }
}

#[async_trait]
impl NetworkDiscovery for HttpDiscovery {
    async fn find_contact(&self, id: &str) -> Result<Option<Contact>, ContactError> {
        let mut last_error = None;
        let mut answered = false;

        for seed in &self.seeds {
            match self.ask_seed(seed, id).await {
                Ok(Some(contact)) => {
                    debug!(node_id = id, seed = %seed, "Contact discovered");
                    return Ok(Some(contact));
                }
                Ok(None) => answered = true,
                Err(e) => {
                    warn!(node_id = id, seed = %seed, error = %e, "Discovery seed failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}
