//! Web Push delivery.
//!
//! The [`PushGateway`] trait isolates the RFC 8030/8291/8292 plumbing
//! (VAPID signing, aes128gcm payload encryption, the POST to the push
//! service) behind a single call that reports one of three outcomes, so the
//! fan-out pipeline can prune dead subscriptions and tests can stub the
//! transport.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessage, WebPushMessageBuilder, URL_SAFE_NO_PAD,
};

use velonet_store::PushSubscription;

/// Result of one delivery attempt to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The push service reported the endpoint gone (HTTP 404/410); the
    /// subscription must be deleted.
    Gone,
    /// Any other failure; logged and otherwise ignored.
    Failed(String),
}

/// The payload handed to the browser's service worker, serialized as an
/// opaque JSON blob.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    pub data: PushPayloadData,
    /// Collapse key: the browser replaces an undisplayed notification
    /// carrying the same tag.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayloadData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One delivery attempt to one subscription.  Implementations must not
/// retry; a missed push is simply lost.
pub trait PushGateway: Send + Sync {
    fn deliver(
        &self,
        subscription: PushSubscription,
        payload: String,
        ttl_secs: u32,
    ) -> BoxFuture<'static, PushOutcome>;
}

/// Production gateway speaking the Web Push protocol with VAPID
/// authentication.
pub struct WebPushGateway {
    client: Arc<HyperWebPushClient>,
    vapid_private_key: String,
}

impl WebPushGateway {
    /// `vapid_private_key` is the URL-safe base64 encoding of the server's
    /// VAPID private key.
    pub fn new(vapid_private_key: String) -> Self {
        Self {
            client: Arc::new(HyperWebPushClient::new()),
            vapid_private_key,
        }
    }

    fn build_message(
        &self,
        info: &SubscriptionInfo,
        payload: &str,
        ttl_secs: u32,
    ) -> Result<WebPushMessage, WebPushError> {
        let signature =
            VapidSignatureBuilder::from_base64(&self.vapid_private_key, URL_SAFE_NO_PAD, info)?
                .build()?;

        let mut builder = WebPushMessageBuilder::new(info);
        builder.set_vapid_signature(signature);
        builder.set_ttl(ttl_secs);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_bytes());
        builder.build()
    }
}

impl PushGateway for WebPushGateway {
    fn deliver(
        &self,
        subscription: PushSubscription,
        payload: String,
        ttl_secs: u32,
    ) -> BoxFuture<'static, PushOutcome> {
        let info = SubscriptionInfo::new(
            subscription.endpoint,
            subscription.p256dh,
            subscription.auth,
        );
        let message = self.build_message(&info, &payload, ttl_secs);
        let client = Arc::clone(&self.client);

        Box::pin(async move {
            let message = match message {
                Ok(m) => m,
                Err(e) => return PushOutcome::Failed(format!("building push message: {e}")),
            };

            match client.send(message).await {
                Ok(()) => PushOutcome::Delivered,
                Err(WebPushError::EndpointNotValid) | Err(WebPushError::EndpointNotFound) => {
                    PushOutcome::Gone
                }
                Err(e) => PushOutcome::Failed(e.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_wire_format_matches_service_worker_contract() {
        let payload = PushPayload {
            title: "New message".to_string(),
            body: "Ada: see you at the bridge".to_string(),
            icon: None,
            badge: None,
            data: PushPayloadData {
                url: Some("/chat".to_string()),
                kind: "message".to_string(),
            },
            tag: "0b5c1e9e".to_string(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""data":{"url":"/chat","type":"message"}"#));
        assert!(json.contains(r#""tag":"0b5c1e9e""#));
        assert!(!json.contains("icon"));
    }
}
