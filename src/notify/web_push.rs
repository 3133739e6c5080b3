use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tracing::warn;

use crate::config::VapidConfig;
use crate::models::notification::{ChannelKind, NotificationKind, NotificationPayload, PushRegistration};
use crate::notify::{classify_status, PushChannel, PushError};

const TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;
const MESSAGE_TTL_SECS: &str = "86400";

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

struct Credentials {
    key: EncodingKey,
    public_key: String,
    subject: String,
}

/// Web Push with VAPID authentication. Messages are sent without a body; the
/// service worker wakes up and fetches the in-app notification list.
pub struct WebPushChannel {
    credentials: Option<Credentials>,
    client: reqwest::Client,
}

impl WebPushChannel {
    pub fn from_config(config: Option<&VapidConfig>, timeout: Duration) -> Self {
        let credentials = config.and_then(|config| {
            match EncodingKey::from_ec_pem(config.private_key_pem.as_bytes()) {
                Ok(key) => Some(Credentials {
                    key,
                    public_key: config.public_key.clone(),
                    subject: config.subject.clone(),
                }),
                Err(err) => {
                    warn!(error = %err, "invalid VAPID private key; web push disabled");
                    None
                }
            }
        });

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            credentials,
            client,
        }
    }

    fn authorization(&self, credentials: &Credentials, endpoint: &str) -> Result<String, PushError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|err| PushError::Rejected(format!("invalid endpoint: {err}")))?;

        let claims = VapidClaims {
            aud: url.origin().ascii_serialization(),
            exp: chrono::Utc::now().timestamp() + TOKEN_LIFETIME_SECS,
            sub: &credentials.subject,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &credentials.key)
            .map_err(|err| PushError::Rejected(format!("failed to sign VAPID token: {err}")))?;

        Ok(format!("vapid t={token}, k={}", credentials.public_key))
    }
}

#[async_trait]
impl PushChannel for WebPushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WebPush
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(
        &self,
        registration: &PushRegistration,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| PushError::Rejected("web push is not configured".to_string()))?;

        let authorization = self.authorization(credentials, &registration.endpoint)?;
        let urgency = match payload.kind {
            NotificationKind::DeliveryOffer | NotificationKind::DeliveryAssigned => "high",
            NotificationKind::StatusUpdate | NotificationKind::OfferWithdrawn => "normal",
        };

        let response = self
            .client
            .post(&registration.endpoint)
            .header("Authorization", authorization)
            .header("TTL", MESSAGE_TTL_SECS)
            .header("Urgency", urgency)
            .header("Content-Length", "0")
            .send()
            .await?;

        classify_status(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::WebPushChannel;
    use crate::config::VapidConfig;
    use crate::notify::PushChannel;

    #[test]
    fn missing_credentials_leave_channel_unconfigured() {
        let channel = WebPushChannel::from_config(None, Duration::from_secs(1));
        assert!(!channel.is_configured());
    }

    #[test]
    fn unparseable_key_disables_channel() {
        let config = VapidConfig {
            private_key_pem: "not a pem".to_string(),
            public_key: "BPublic".to_string(),
            subject: "mailto:ops@example.com".to_string(),
        };
        let channel = WebPushChannel::from_config(Some(&config), Duration::from_secs(1));
        assert!(!channel.is_configured());
    }
}
