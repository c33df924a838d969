//! Feishu bot delivery for decision cards.
//!
//! Sends the suspend-point digest as an interactive card whose buttons carry
//! `{run_id, decision}` action values; the webhook layer feeds those back
//! into [`WorkflowEngine::resume`](crate::engine::WorkflowEngine::resume).
//! Tenant access tokens are cached until shortly before expiry.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::state::DecisionPayload;
use crate::types::Decision;

use super::{DecisionDelivery, DeliveryError};

const DEFAULT_API_BASE: &str = "https://open.feishu.cn";

/// Refresh the cached token this long before it would expire.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: u64,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Decision-card sender over the Feishu open API.
pub struct FeishuDelivery {
    http: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    verification_token: String,
    receive_id: String,
    receive_id_type: String,
    cached: Mutex<Option<CachedToken>>,
}

impl FeishuDelivery {
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        verification_token: impl Into<String>,
        receive_id: impl Into<String>,
        receive_id_type: impl Into<String>,
    ) -> Self {
        Self::with_api_base(
            DEFAULT_API_BASE,
            app_id,
            app_secret,
            verification_token,
            receive_id,
            receive_id_type,
        )
    }

    /// Point the client at a different API base (tests use a local mock).
    #[must_use]
    pub fn with_api_base(
        api_base: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        verification_token: impl Into<String>,
        receive_id: impl Into<String>,
        receive_id_type: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            verification_token: verification_token.into(),
            receive_id: receive_id.into(),
            receive_id_type: receive_id_type.into(),
            cached: Mutex::new(None),
        }
    }

    /// Compare a webhook's token against the configured verification token.
    #[must_use]
    pub fn verify_request(&self, token: &str) -> bool {
        !self.verification_token.is_empty() && token == self.verification_token
    }

    fn transport(e: reqwest::Error) -> DeliveryError {
        DeliveryError::Transport {
            message: e.to_string(),
        }
    }

    async fn access_token(&self) -> Result<String, DeliveryError> {
        if let Some(cached) = self.cached.lock().as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let response: TokenResponse = self
            .http
            .post(format!(
                "{}/open-apis/auth/v3/tenant_access_token/internal",
                self.api_base
            ))
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(Self::transport)?;

        if response.code != 0 {
            return Err(DeliveryError::Rejected {
                code: response.code,
                message: response.msg,
            });
        }
        let token = response.tenant_access_token.ok_or(DeliveryError::Rejected {
            code: -1,
            message: "token missing in response".to_string(),
        })?;

        let ttl = Duration::from_secs(response.expire).saturating_sub(TOKEN_SLACK);
        *self.cached.lock() = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(token)
    }

    async fn send_message(&self, msg_type: &str, content: &Value) -> Result<(), DeliveryError> {
        let token = self.access_token().await?;
        let content_text =
            serde_json::to_string(content).map_err(|e| DeliveryError::Transport {
                message: e.to_string(),
            })?;

        let response: ApiResponse = self
            .http
            .post(format!(
                "{}/open-apis/im/v1/messages?receive_id_type={}",
                self.api_base, self.receive_id_type
            ))
            .bearer_auth(&token)
            .json(&json!({
                "receive_id": self.receive_id,
                "msg_type": msg_type,
                "content": content_text,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(Self::transport)?;

        if response.code != 0 {
            return Err(DeliveryError::Rejected {
                code: response.code,
                message: response.msg,
            });
        }
        Ok(())
    }

    /// Plain-text message to the configured chat.
    pub async fn send_text_message(&self, text: &str) -> Result<(), DeliveryError> {
        self.send_message("text", &json!({ "text": text })).await
    }

    fn decision_button(payload: &DecisionPayload, decision: Decision, label: &str) -> Value {
        json!({
            "tag": "button",
            "text": { "tag": "plain_text", "content": label },
            "type": if payload.suggested_action == Some(decision) { "primary" } else { "default" },
            "value": {
                "run_id": payload.run_id.as_str(),
                "decision": decision.as_str(),
            }
        })
    }

    fn build_card(payload: &DecisionPayload) -> Value {
        let mut facts = vec![format!("**Summary**\n{}", payload.summary)];
        if !payload.contributions.is_empty() {
            facts.push(format!("**Contributions**\n{}", payload.contributions));
        }
        if let Some(relevance) = payload.relevance {
            facts.push(format!("**Relevance** {relevance}/5"));
        }
        if !payload.suggested_tags.is_empty() {
            facts.push(format!("**Tags** {}", payload.suggested_tags.join(", ")));
        }

        let mut elements: Vec<Value> = facts
            .iter()
            .map(|text| json!({ "tag": "div", "text": { "tag": "lark_md", "content": text } }))
            .collect();
        elements.push(json!({
            "tag": "action",
            "actions": [
                Self::decision_button(payload, Decision::DeepRead, "Deep read"),
                Self::decision_button(payload, Decision::Skim, "Skim"),
                Self::decision_button(payload, Decision::Drop, "Drop"),
            ]
        }));

        json!({
            "config": { "wide_screen_mode": true },
            "header": {
                "title": { "tag": "plain_text", "content": payload.title },
                "template": "blue"
            },
            "elements": elements,
        })
    }
}

#[async_trait]
impl DecisionDelivery for FeishuDelivery {
    async fn send_decision_card(&self, payload: &DecisionPayload) -> Result<(), DeliveryError> {
        let card = Self::build_card(payload);
        self.send_message("interactive", &card).await?;
        tracing::info!(run = %payload.run_id, "decision card sent");
        Ok(())
    }
}
