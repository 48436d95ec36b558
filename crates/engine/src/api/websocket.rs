//! WebSocket handling for live generation sessions.
//!
//! The credential is checked before the upgrade, so a refused client never
//! gets a session. Each admitted socket gets three tasks: the reader (this
//! handler), a writer draining the session's outbound channel, and a request
//! worker that runs the session's generation requests one at a time.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use quillcast_domain::UserId;
use quillcast_shared::{ClientMessage, GenerateContent as GeneratePayload, ServerMessage};

use super::bearer_token;
use super::connections::SessionInfo;
use crate::app::App;

/// Buffer size for per-session outbound messages.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Generation requests a session may queue behind the one running.
const PENDING_REQUEST_LIMIT: usize = 8;

pub const READY_MESSAGE: &str = "Ready to generate content";

pub fn routes() -> Router<Arc<App>> {
    Router::new().route("/ws/content/generate", get(ws_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// WebSocket upgrade handler - entry point for new connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<Arc<App>>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Response {
    let token = params
        .token
        .or_else(|| bearer_token(&headers))
        .unwrap_or_default();

    match app.auth.verify(&token).await {
        Ok(user_id) => ws.on_upgrade(move |socket| handle_socket(socket, app, user_id)),
        Err(e) => {
            tracing::info!(error = %e, "Refusing session");
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, app: Arc<App>, user_id: UserId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);
    let session = app.sessions.admit(tx, user_id);
    let session_id = session.session_id;

    tracing::info!(session_id = %session_id, user_id = %user_id, "Session connected");

    // The registry holds the only sender, so this ends once the session is
    // removed or evicted.
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode server message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    app.sessions.send(
        session_id,
        ServerMessage::Connected {
            message: READY_MESSAGE.to_string(),
        },
    );

    // Never aborted: a request already running finishes after disconnect.
    let (requests_tx, requests_rx) = mpsc::channel::<GeneratePayload>(PENDING_REQUEST_LIMIT);
    tokio::spawn(run_requests(app.clone(), session, requests_rx));

    while let Some(result) = ws_receiver.next().await {
        if !app.sessions.contains(session_id) {
            tracing::debug!(session_id = %session_id, "Session evicted");
            break;
        }
        match result {
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                Ok(ClientMessage::Ping) => {
                    app.sessions.send(session_id, ServerMessage::Pong);
                }
                Ok(ClientMessage::Generate(payload)) => {
                    if requests_tx.try_send(payload).is_err() {
                        app.sessions
                            .send(session_id, ServerMessage::error("Too many pending requests"));
                    }
                }
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "Malformed frame");
                    app.sessions
                        .send(session_id, ServerMessage::error(e.to_string()));
                }
            },
            Ok(Message::Binary(_)) => {
                app.sessions.send(
                    session_id,
                    ServerMessage::error("Binary frames are not supported"),
                );
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, "Session closed by client");
                break;
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    app.sessions.remove(session_id);
    tracing::info!(session_id = %session_id, "Session disconnected");
}

/// Run a session's generation requests serially.
///
/// Requests still queued when the session goes away are dropped.
async fn run_requests(
    app: Arc<App>,
    session: SessionInfo,
    mut requests: mpsc::Receiver<GeneratePayload>,
) {
    while let Some(payload) = requests.recv().await {
        if !app.sessions.contains(session.session_id) {
            tracing::debug!(
                session_id = %session.session_id,
                "Dropping request from closed session"
            );
            continue;
        }
        if let Err(e) = app
            .use_cases
            .generate
            .execute(session.session_id, session.user_id, payload)
            .await
        {
            tracing::debug!(
                session_id = %session.session_id,
                error = %e,
                "Request ended with error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::infrastructure::platforms::test_server;
    use crate::infrastructure::ports::{GenerationError, MockGenerationPort, TokenStream};
    use futures_util::stream;
    use quillcast_domain::{ContentId, ContentStatus};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn tokens(parts: &'static [&'static str], gap: Duration) -> TokenStream {
        Box::pin(stream::iter(parts.iter()).then(move |part| async move {
            tokio::time::sleep(gap).await;
            Ok::<_, GenerationError>(part.to_string())
        }))
    }

    async fn serve(generator: MockGenerationPort) -> (Arc<App>, String) {
        let app = test_app(Arc::new(generator), vec![], UserId::new());
        let base = test_server::spawn(routes().with_state(app.clone())).await;
        (app, base.replacen("http://", "ws://", 1))
    }

    async fn connect(base: &str) -> Client {
        let url = format!("{base}/ws/content/generate?token=secret");
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    async fn next_message(client: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let tungstenite::Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn send(client: &mut Client, text: &str) {
        client
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_refused_before_upgrade() {
        let (app, base) = serve(MockGenerationPort::new()).await;

        for url in [
            format!("{base}/ws/content/generate"),
            format!("{base}/ws/content/generate?token=guess"),
        ] {
            let err = tokio_tungstenite::connect_async(url).await.unwrap_err();
            match err {
                tungstenite::Error::Http(response) => assert_eq!(response.status().as_u16(), 401),
                other => panic!("expected HTTP refusal, got {other:?}"),
            }
        }
        assert!(app.sessions.is_empty());
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let (_app, base) = serve(MockGenerationPort::new()).await;
        let mut request = format!("{base}/ws/content/generate")
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("authorization", "Bearer secret".parse().unwrap());

        let (mut client, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        assert_eq!(
            next_message(&mut client).await,
            ServerMessage::Connected {
                message: READY_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn generation_session_end_to_end() {
        let mut generator = MockGenerationPort::new();
        generator
            .expect_stream_tokens()
            .times(1)
            .returning(|_, _| Ok(tokens(&["Hello", " world"], Duration::ZERO)));
        let (app, base) = serve(generator).await;
        let mut client = connect(&base).await;

        assert!(matches!(next_message(&mut client).await, ServerMessage::Connected { .. }));

        send(&mut client, r#"{"type":"ping"}"#).await;
        assert_eq!(next_message(&mut client).await, ServerMessage::Pong);

        send(&mut client, "not json").await;
        assert!(matches!(next_message(&mut client).await, ServerMessage::Error { .. }));

        send(&mut client, r#"{"type":"blog_post"}"#).await;
        assert!(matches!(next_message(&mut client).await, ServerMessage::Error { .. }));

        send(&mut client, r#"{"type":"blog_post","prompt":"Spring sale","title":"Sale"}"#).await;
        let ServerMessage::Started { content_id } = next_message(&mut client).await else {
            panic!("expected started");
        };
        assert_eq!(
            next_message(&mut client).await,
            ServerMessage::Chunk { content: "Hello".into() }
        );
        assert_eq!(
            next_message(&mut client).await,
            ServerMessage::Chunk { content: " world".into() }
        );
        assert_eq!(next_message(&mut client).await, ServerMessage::Complete { content_id });

        let content = app.lifecycle.get(ContentId::from_uuid(content_id)).await.unwrap();
        assert_eq!(content.status, ContentStatus::Draft);
        assert_eq!(content.body, "Hello world");
    }

    #[tokio::test]
    async fn disconnect_does_not_cancel_generation() {
        let mut generator = MockGenerationPort::new();
        generator
            .expect_stream_tokens()
            .times(1)
            .returning(|_, _| Ok(tokens(&["one", " two", " three"], Duration::from_millis(50))));
        let (app, base) = serve(generator).await;
        let mut client = connect(&base).await;
        next_message(&mut client).await;

        send(&mut client, r#"{"type":"email","prompt":"Newsletter"}"#).await;
        let ServerMessage::Started { content_id } = next_message(&mut client).await else {
            panic!("expected started");
        };
        client.close(None).await.unwrap();
        drop(client);

        let content_id = ContentId::from_uuid(content_id);
        let content = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let content = app.lifecycle.get(content_id).await.unwrap();
                if content.status != ContentStatus::Generating {
                    return content;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(content.status, ContentStatus::Draft);
        assert_eq!(content.body, "one two three");
        assert!(app.sessions.is_empty());
    }
}
