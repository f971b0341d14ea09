use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::payloads::{
    parse_form, BlockAction, EventEnvelope, InteractionPayload, SlackEvent, SlashCommandPayload,
};
use super::AppState;
use crate::slack::signature::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slash_command::registry::CommandRegistry;
use crate::slash_command::{CommandInvocation, CommandOutcome};

/// Reject requests that were not signed with our signing secret
fn verify_request(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let (Some(timestamp), Some(signature)) = (header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER))
    else {
        warn!("Rejecting Slack request without signature headers");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if verify_signature(&state.signing_secret, timestamp, body, signature) {
        Ok(())
    } else {
        warn!("Rejecting Slack request with invalid signature");
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Dispatch one command and log instead of propagating any failure
pub async fn run_command(
    registry: &CommandRegistry,
    invocation: CommandInvocation,
) -> Option<CommandOutcome> {
    match registry.dispatch(&invocation).await {
        Ok(outcome) => {
            debug!(?outcome, "Command finished");
            Some(outcome)
        }
        Err(e) => {
            error!(
                command = %invocation.command_name,
                user_id = %invocation.invoking_user_id,
                channel_id = %invocation.channel_id,
                "Error in command handler: {:#}",
                e
            );
            None
        }
    }
}

/// `POST /slack/commands`
pub async fn slash_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = verify_request(&state, &headers, &body) {
        return status.into_response();
    }

    let form = parse_form(&String::from_utf8_lossy(&body));
    let Some(payload) = SlashCommandPayload::from_form(&form) else {
        return (StatusCode::BAD_REQUEST, "missing command, user_id or channel_id").into_response();
    };

    info!(
        command = %payload.command,
        user_id = %payload.user_id,
        channel_id = %payload.channel_id,
        "Received slash command"
    );

    // Slack wants an answer within three seconds; the work continues after we reply
    let registry = state.registry.clone();
    let invocation = payload.into_invocation();
    state.tasks.spawn(async move {
        run_command(&registry, invocation).await;
    });

    StatusCode::OK.into_response()
}

/// `POST /slack/events`
pub async fn events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(status) = verify_request(&state, &headers, &body) {
        return status.into_response();
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Failed to parse event payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        }
        EventEnvelope::EventCallback { team_id, event } => {
            match event {
                SlackEvent::TeamJoin { user } => {
                    debug!(team_id = ?team_id, user = %user, "team_join received");
                }
                SlackEvent::Other => {
                    debug!(team_id = ?team_id, "Ignoring unhandled event type");
                }
            }
            StatusCode::OK.into_response()
        }
        EventEnvelope::Unsupported => StatusCode::OK.into_response(),
    }
}

/// `POST /slack/actions`
pub async fn actions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(status) = verify_request(&state, &headers, &body) {
        return status.into_response();
    }

    let form = parse_form(&String::from_utf8_lossy(&body));
    let Some(raw) = form.get("payload") else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let payload: InteractionPayload = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to parse interaction payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let InteractionPayload::BlockActions { user, actions } = payload {
        for action in actions {
            match action {
                BlockAction::Initial => debug!(user_id = %user.id, "initial action received"),
                BlockAction::Other => debug!(user_id = %user.id, "Ignoring unhandled action"),
            }
        }
    }

    StatusCode::OK.into_response()
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Redirect {
    info!("Index endpoint hit");
    Redirect::temporary(&state.homepage)
}

/// `GET /ping` and `GET /up`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": &*state.environment,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use crate::slack::signature::compute_signature;
    use crate::slash_command::SlashCommand;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const SECRET: &str = "test-signing-secret";

    struct RecordingCommand {
        seen: Mutex<Vec<CommandInvocation>>,
        fail: bool,
    }

    #[async_trait]
    impl SlashCommand for RecordingCommand {
        fn name(&self) -> &str {
            "/toggle-visibility"
        }

        fn description(&self) -> &str {
            "records invocations"
        }

        async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
            self.seen.lock().unwrap().push(invocation.clone());
            if self.fail {
                anyhow::bail!("upstream unavailable");
            }
            Ok(CommandOutcome::Unrecognized {
                command: "recorded".to_string(),
            })
        }
    }

    async fn state_with(fail: bool) -> (AppState, Arc<RecordingCommand>) {
        let command = Arc::new(RecordingCommand {
            seen: Mutex::new(Vec::new()),
            fail,
        });
        let registry = CommandRegistry::new();
        registry.register(command.clone()).await;
        let state = AppState::new(
            Arc::new(registry),
            SECRET,
            "test",
            "https://example.com/slacky",
        );
        (state, command)
    }

    fn signed(uri: &str, body: &str) -> Request<Body> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = compute_signature(SECRET, &timestamp, body.as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_command_is_acknowledged_and_dispatched() {
        let (state, command) = state_with(false).await;
        let app = build_router(state.clone());

        let response = app
            .oneshot(signed(
                "/slack/commands",
                "command=%2Ftoggle-visibility&user_id=U1&channel_id=C1&text=",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");

        state.tasks.close();
        state.tasks.wait().await;
        assert_eq!(
            command.seen.lock().unwrap().clone(),
            vec![CommandInvocation::new("/toggle-visibility", "U1", "C1")]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_acknowledged_without_action() {
        let (state, command) = state_with(false).await;
        let app = build_router(state.clone());

        let response = app
            .oneshot(signed(
                "/slack/commands",
                "command=%2Fsomething-else&user_id=U1&channel_id=C1",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        state.tasks.close();
        state.tasks.wait().await;
        assert!(command.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_request_is_rejected() {
        let (state, command) = state_with(false).await;
        let app = build_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/slack/commands")
            .body(Body::from("command=%2Ftoggle-visibility&user_id=U1&channel_id=C1"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        state.tasks.close();
        state.tasks.wait().await;
        assert!(command.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_body_is_rejected() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let mut request = signed("/slack/commands", "command=%2Ftoggle-visibility&user_id=U1&channel_id=C1");
        *request.body_mut() = Body::from("command=%2Ftoggle-visibility&user_id=U2&channel_id=C1");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_command_missing_fields_is_bad_request() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let response = app
            .oneshot(signed("/slack/commands", "command=%2Ftoggle-visibility"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handler_errors_are_swallowed() {
        let (state, command) = state_with(true).await;

        let outcome = run_command(
            &state.registry,
            CommandInvocation::new("/toggle-visibility", "U1", "C1"),
        )
        .await;

        assert!(outcome.is_none());
        assert_eq!(command.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let response = app
            .oneshot(signed(
                "/slack/events",
                r#"{"token":"t","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P","type":"url_verification"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(
            body["challenge"],
            "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        );
    }

    #[tokio::test]
    async fn test_event_callback_is_acknowledged() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let response = app
            .oneshot(signed(
                "/slack/events",
                r#"{"type":"event_callback","team_id":"T1","event":{"type":"team_join","user":{"id":"U1"}}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let response = app
            .oneshot(signed("/slack/events", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_block_action_is_acknowledged() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let payload = r#"{"type":"block_actions","user":{"id":"U1"},"actions":[{"action_id":"initial"}]}"#;
        let body = format!("payload={}", urlencoding::encode(payload));
        let response = app
            .oneshot(signed("/slack/actions", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_redirects_to_homepage() {
        let (state, _) = state_with(false).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()["location"],
            "https://example.com/slacky"
        );
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (state, _) = state_with(false).await;

        for path in ["/ping", "/up"] {
            let response = build_router(state.clone())
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["status"], "ok");
            assert_eq!(body["environment"], "test");
        }
    }
}
