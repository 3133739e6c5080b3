use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::FcmConfig;
use crate::models::notification::{ChannelKind, NotificationPayload, PushRegistration};
use crate::notify::{classify_status, PushChannel, PushError};

/// Mobile push over the FCM HTTP v1 API. The registration endpoint is the
/// device token.
pub struct MobilePushChannel {
    config: Option<FcmConfig>,
    client: reqwest::Client,
}

impl MobilePushChannel {
    pub fn from_config(config: Option<&FcmConfig>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: config.cloned(),
            client,
        }
    }
}

fn message_body(token: &str, payload: &NotificationPayload) -> serde_json::Value {
    json!({
        "message": {
            "token": token,
            "notification": {
                "title": payload.title,
                "body": payload.body,
            },
            // FCM data values must be strings.
            "data": {
                "kind": serde_json::to_value(payload.kind)
                    .ok()
                    .and_then(|value| value.as_str().map(str::to_string))
                    .unwrap_or_default(),
                "delivery_id": payload.delivery_id.to_string(),
                "order_id": payload.order_id.to_string(),
            },
            "android": { "priority": "high" },
        }
    })
}

#[async_trait]
impl PushChannel for MobilePushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::MobilePush
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn send(
        &self,
        registration: &PushRegistration,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PushError::Rejected("mobile push is not configured".to_string()))?;

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            config.base_url.trim_end_matches('/'),
            config.project_id
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.access_token)
            .json(&message_body(&registration.endpoint, payload))
            .send()
            .await?;

        classify_status(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::message_body;
    use crate::models::notification::{NotificationKind, NotificationPayload};

    #[test]
    fn data_fields_are_strings() {
        let payload = NotificationPayload {
            kind: NotificationKind::DeliveryAssigned,
            title: "Assigned".to_string(),
            body: "You got the delivery".to_string(),
            delivery_id: Uuid::nil(),
            order_id: Uuid::nil(),
            data: serde_json::Value::Null,
        };

        let body = message_body("token-1", &payload);
        let data = &body["message"]["data"];

        assert_eq!(body["message"]["token"], "token-1");
        assert_eq!(data["kind"], "delivery_assigned");
        assert_eq!(data["delivery_id"], Uuid::nil().to_string());
    }
}
