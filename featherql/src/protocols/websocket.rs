//! Implements the WebSocket _server_ protocol for GraphQL subscriptions.
//!
//! Speaks the graphql-transport-ws subprotocol: connection initialisation,
//! per-connection subscription registration keyed by client-chosen id, value
//! forwarding as `next` messages and explicit or implicit cancellation.
//!
//! Spec URL: https://github.com/enisdenjo/graphql-ws/blob/0c0eb499c3a0278c6d9cc799064f22c5d24d2f60/PROTOCOL.md

use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use futures::Sink;
use futures::SinkExt;
use futures::Stream;
use futures::future;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use futures::StreamExt;
use tokio_stream::StreamMap;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

use crate::descriptor::ResolverContext;
use crate::engine::GraphqlEngine;
use crate::engine::StreamingHandle;
use crate::error::FieldError;
use crate::graphql;

/// The WebSocket subprotocol name negotiated during the upgrade handshake.
pub const GRAPHQL_WS_SUBPROTOCOL: &str = "graphql-transport-ws";

/// Close code for a message the server could not parse.
pub const CLOSE_INVALID_MESSAGE: u16 = 4400;
/// Close code for a `subscribe` received before `connection_init`.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;
/// Close code for a `subscribe` whose id is already active.
pub const CLOSE_SUBSCRIBER_EXISTS: u16 = 4409;
/// Close code for a second `connection_init` on the same connection.
pub const CLOSE_TOO_MANY_INITS: u16 = 4429;

/// WebSocket messages received from the client.
#[derive(Deserialize, Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A new connection
    ConnectionInit {
        /// Optional init payload from the client
        #[serde(default)]
        payload: Option<Value>,
    },
    /// The start of a subscription keyed by a client-chosen id
    Subscribe {
        /// Message ID
        id: String,
        /// The GraphQL request to open a stream for
        payload: graphql::Request,
    },
    /// The client stops a subscription it previously started
    Complete {
        /// Message ID
        id: String,
    },
    /// Useful for detecting failed connections, displaying latency metrics or
    /// other types of network probing.
    Ping {
        /// Additional details about the ping.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// The response to the Ping message.
    Pong {
        /// Additional details about the pong.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// The underlying socket closed. This is a transport-internal message,
    /// not part of the protocol.
    ConnectionClosed,
}

/// WebSocket messages sent to the client.
#[derive(Deserialize, Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    /// One value produced by an active subscription
    Next {
        id: String,
        payload: graphql::Response,
    },
    /// A subscription failed; the id is deregistered after this message
    Error {
        id: String,
        payload: Vec<graphql::Error>,
    },
    /// The subscription's value sequence ended naturally
    Complete {
        id: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Close the websocket connection with a protocol close code. This is a
    /// transport-internal message, not part of the protocol.
    CloseConnection {
        code: u16,
        reason: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("websocket error")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("deserialization/serialization error")]
    SerdeError(#[from] serde_json::Error),
}

/// Convert a bidirectional stream of untyped websocket packets to a [Stream] + [Sink] that speaks the
/// GraphQL WebSocket protocol ([`ClientMessage`] and [`ServerMessage`]).
pub fn convert_websocket_stream<T>(
    stream: WebSocketStream<T>,
) -> impl Stream<Item = serde_json::Result<ClientMessage>> + Sink<ServerMessage, Error = Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    stream
        // Serialize messages being written into the `Sink`
        .with(|server_message: ServerMessage| match server_message {
            ServerMessage::CloseConnection { code, reason } => {
                future::ready(Ok(Message::Close(Some(CloseFrame {
                    code: code.into(),
                    reason: reason.into(),
                }))))
            }
            message => future::ready(match serde_json::to_string(&message) {
                Ok(server_message_str) => Ok(Message::text(server_message_str)),
                Err(err) => Err(Error::SerdeError(err)),
            }),
        })
        // Parse messages received from the `Stream`
        .map(|msg| match msg {
            Ok(Message::Text(text)) => serde_json::from_str(&text),
            Ok(Message::Binary(bin)) => serde_json::from_slice(&bin),
            Ok(Message::Ping(payload)) => Ok(ClientMessage::Ping {
                payload: serde_json::from_slice(&payload).ok(),
            }),
            Ok(Message::Pong(payload)) => Ok(ClientMessage::Pong {
                payload: serde_json::from_slice(&payload).ok(),
            }),
            Ok(Message::Close(_)) => Ok(ClientMessage::ConnectionClosed),
            Ok(Message::Frame(frame)) => serde_json::from_slice(frame.payload()),
            Err(err) => {
                tracing::trace!("cannot consume more message on websocket stream: {err:?}");
                Ok(ClientMessage::ConnectionClosed)
            }
        })
}

/// One value pulled from an active subscription, as observed by the
/// connection loop.
enum SubscriptionEvent {
    Next(Value),
    Failed(FieldError),
    Completed,
}

/// Wraps a [`StreamingHandle`] so natural exhaustion surfaces as an explicit
/// [`SubscriptionEvent::Completed`] before the stream ends.
///
/// The multiplexer silently discards streams the moment they yield `None`;
/// without the sentinel the connection loop could never tell a finished
/// subscription apart from one that was cancelled.
struct SubscriptionEvents {
    handle: StreamingHandle,
    done: bool,
}

impl SubscriptionEvents {
    fn new(handle: StreamingHandle) -> Self {
        Self {
            handle,
            done: false,
        }
    }

    fn close(&mut self) {
        self.handle.close();
    }
}

impl Stream for SubscriptionEvents {
    type Item = SubscriptionEvent;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.handle).poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(SubscriptionEvent::Next(value))),
            Poll::Ready(Some(Err(err))) => {
                this.done = true;
                Poll::Ready(Some(SubscriptionEvent::Failed(err)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(Some(SubscriptionEvent::Completed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Per-connection protocol state. Owned by the single connection task, so no
/// locking is involved anywhere in the message-handling sequence.
struct ConnectionState {
    initialized: bool,
    active: StreamMap<String, SubscriptionEvents>,
}

/// Drives one client connection until the socket closes or a protocol
/// violation forces a close.
///
/// Connection teardown force-terminates every still-active streaming handle.
/// Outbound send failures are swallowed: a client that went away mid-send
/// must never crash the pulling loop.
pub async fn serve_connection<S>(engine: Arc<dyn GraphqlEngine>, context: ResolverContext, stream: S)
where
    S: Stream<Item = serde_json::Result<ClientMessage>> + Sink<ServerMessage> + Unpin,
{
    let mut stream = stream;
    let mut state = ConnectionState {
        initialized: false,
        active: StreamMap::new(),
    };

    loop {
        tokio::select! {
            message = StreamExt::next(&mut stream) => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        tracing::trace!("cannot deserialize client message: {err:?}");
                        send_message(&mut stream, ServerMessage::CloseConnection {
                            code: CLOSE_INVALID_MESSAGE,
                            reason: "invalid message received".to_string(),
                        })
                        .await;
                        break;
                    }
                    None => break,
                };
                if handle_client_message(&engine, &context, &mut stream, &mut state, message)
                    .await
                    .is_break()
                {
                    break;
                }
            }
            Some((id, event)) = state.active.next(), if !state.active.is_empty() => {
                match event {
                    SubscriptionEvent::Next(value) => {
                        send_message(&mut stream, ServerMessage::Next {
                            id,
                            payload: graphql::Response::builder().data(value).build(),
                        })
                        .await;
                    }
                    SubscriptionEvent::Failed(err) => {
                        let error = err.to_graphql_error(None);
                        if let Some(mut events) = state.active.remove(&id) {
                            events.close();
                        }
                        send_message(&mut stream, ServerMessage::Error {
                            id,
                            payload: vec![error],
                        })
                        .await;
                    }
                    SubscriptionEvent::Completed => {
                        state.active.remove(&id);
                        send_message(&mut stream, ServerMessage::Complete { id }).await;
                    }
                }
            }
        }
    }

    for (id, events) in state.active.iter_mut() {
        tracing::trace!(subscription = %id, "closing subscription on connection teardown");
        events.close();
    }
}

enum Control {
    Continue,
    Break,
}

impl Control {
    fn is_break(&self) -> bool {
        matches!(self, Control::Break)
    }
}

async fn handle_client_message<S>(
    engine: &Arc<dyn GraphqlEngine>,
    context: &ResolverContext,
    stream: &mut S,
    state: &mut ConnectionState,
    message: ClientMessage,
) -> Control
where
    S: Stream<Item = serde_json::Result<ClientMessage>> + Sink<ServerMessage> + Unpin,
{
    match message {
        ClientMessage::ConnectionInit { payload: _ } => {
            if state.initialized {
                send_message(
                    stream,
                    ServerMessage::CloseConnection {
                        code: CLOSE_TOO_MANY_INITS,
                        reason: "too many initialisation requests".to_string(),
                    },
                )
                .await;
                return Control::Break;
            }
            state.initialized = true;
            send_message(stream, ServerMessage::ConnectionAck).await;
        }
        ClientMessage::Subscribe { id, payload } => {
            if !state.initialized {
                send_message(
                    stream,
                    ServerMessage::CloseConnection {
                        code: CLOSE_UNAUTHORIZED,
                        reason: "unauthorized".to_string(),
                    },
                )
                .await;
                return Control::Break;
            }
            if state.active.contains_key(&id) {
                send_message(
                    stream,
                    ServerMessage::CloseConnection {
                        code: CLOSE_SUBSCRIBER_EXISTS,
                        reason: format!("subscriber for {id} already exists"),
                    },
                )
                .await;
                return Control::Break;
            }
            match engine.subscribe(&payload, context).await {
                Ok(handle) => {
                    state.active.insert(id, SubscriptionEvents::new(handle));
                }
                Err(err) => {
                    send_message(
                        stream,
                        ServerMessage::Error {
                            id,
                            payload: vec![err],
                        },
                    )
                    .await;
                }
            }
        }
        ClientMessage::Complete { id } => {
            // Unknown ids are a silent no-op, which also makes a repeated
            // complete for the same id idempotent.
            if let Some(mut events) = state.active.remove(&id) {
                events.close();
            }
        }
        ClientMessage::Ping { payload } => {
            send_message(stream, ServerMessage::Pong { payload }).await;
        }
        ClientMessage::Pong { .. } => {}
        ClientMessage::ConnectionClosed => return Control::Break,
    }
    Control::Continue
}

async fn send_message<S>(stream: &mut S, message: ServerMessage)
where
    S: Sink<ServerMessage> + Unpin,
{
    if stream.send(message).await.is_err() {
        tracing::trace!("cannot send message to websocket connection");
    }
}
