//! The GitHub push-event webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};
use zeusci_core::PushEvent;

use crate::error::WebhookError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/github", post(github_webhook))
}

async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok());

    if !verify_signature(&state.webhook_secret, &body, signature) {
        warn!("rejected webhook with invalid signature");
        return Ok(StatusCode::UNAUTHORIZED);
    }

    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    if event_type == "ping" {
        info!("received ping, webhook is configured correctly");
        return Ok(StatusCode::OK);
    }
    if event_type != "push" {
        info!(event = event_type, "ignoring non-push event");
        return Ok(StatusCode::OK);
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::BadRequest(format!("invalid JSON: {e}")))?;

    let Some(push_event) = PushEvent::from_github_payload(&payload) else {
        info!("tag event masquerading as push, ignoring");
        return Ok(StatusCode::OK);
    };

    let repo = state
        .repo_repo
        .get_by_name(&push_event.repository_full_name)
        .await?;

    let commit = push_event
        .head_commit
        .as_ref()
        .map(|c| c.sha.clone())
        .unwrap_or_else(|| push_event.after.clone());

    let build = state
        .build_repo
        .create(&repo.name, &push_event.r#ref, &commit, payload)
        .await
        .map_err(|e| WebhookError::Internal(e.to_string()))?;

    info!(
        build_id = build.id,
        repo = %repo.name,
        r#ref = %build.r#ref,
        "queued build from push event"
    );

    Ok(StatusCode::CREATED)
}

fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_signature() {
        assert!(!verify_signature("secret", b"body", None));
    }

    #[test]
    fn rejects_malformed_signature() {
        assert!(!verify_signature("secret", b"body", Some("not-sha256")));
    }

    #[test]
    fn accepts_correctly_signed_body() {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(b"body");
        let expected = hex::encode(mac.finalize().into_bytes());
        let header = format!("sha256={expected}");
        assert!(verify_signature("secret", b"body", Some(&header)));
    }
}
