// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NATS-backed Bus adapter.

use super::{Bus, BusEnvelope};
use async_trait::async_trait;
use cp_core::AdapterError;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self, AdapterError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| AdapterError::unavailable(format!("nats connect to {url}: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Bus for NatsBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), AdapterError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| AdapterError::unavailable(format!("publish {subject}: {e}")))
    }

    async fn subscribe(&self, subject_pattern: &str) -> Result<mpsc::Receiver<BusEnvelope>, AdapterError> {
        let mut subscriber = self
            .client
            .subscribe(subject_pattern.to_string())
            .await
            .map_err(|e| AdapterError::unavailable(format!("subscribe {subject_pattern}: {e}")))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let envelope = BusEnvelope {
                    subject: message.subject.to_string(),
                    payload: message.payload.to_vec(),
                    reply_to: message.reply.map(|s| s.to_string()),
                };
                if tx.send(envelope).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, AdapterError> {
        match tokio::time::timeout(timeout, self.client.request(subject.to_string(), payload.into())).await {
            Ok(Ok(message)) => Ok(message.payload.to_vec()),
            Ok(Err(e)) => Err(AdapterError::unavailable(format!("request {subject}: {e}"))),
            Err(_) => Err(AdapterError::timeout(format!("request {subject} timed out"))),
        }
    }

    async fn reply(&self, reply_to: &str, payload: Vec<u8>) -> Result<(), AdapterError> {
        self.client
            .publish(reply_to.to_string(), payload.into())
            .await
            .map_err(|e| AdapterError::unavailable(format!("reply {reply_to}: {e}")))
    }
}
