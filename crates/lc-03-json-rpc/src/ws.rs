//! `NotificationSource` over a websocket `eth_subscribe("logs")`.
//!
//! One websocket connection per subscription. `subscribe` returns after the
//! node confirms the subscription id, so the stream is live on return. The
//! connection task sends `eth_unsubscribe` and closes once the stream is
//! dropped; if the node closes first the stream ends.

use crate::abi::EventSignature;
use crate::events::EventBook;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lc_02_event_correlator::{NotificationSource, NotificationStream, SourceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{Address, Notification};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Buffered notifications per subscription before the reader waits.
const SUBSCRIPTION_BUFFER: usize = 256;

/// How long the node has to confirm `eth_subscribe`.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC request for WebSocket.
#[derive(Debug, Serialize)]
struct WsRequest<T: Serialize> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// Any frame the node sends: a response to our request or a subscription
/// notification.
#[derive(Debug, Deserialize)]
struct WsResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<WsRpcError>,
    method: Option<String>,
    params: Option<SubscriptionParams>,
}

#[derive(Debug, Deserialize)]
struct WsRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    subscription: String,
    result: Value,
}

/// Log object from a `logs` subscription.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    log_index: Option<String>,
    #[serde(default)]
    removed: bool,
}

/// Event logs of a node as notification channels.
pub struct WsNotificationSource {
    ws_url: String,
    book: EventBook,
    contract: Option<Address>,
    request_id: AtomicU64,
}

impl WsNotificationSource {
    pub fn new(ws_url: impl Into<String>, book: EventBook) -> Self {
        Self {
            ws_url: ws_url.into(),
            book,
            contract: None,
            request_id: AtomicU64::new(1),
        }
    }

    /// Only deliver logs emitted by `contract`.
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn book(&self) -> &EventBook {
        &self.book
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSource for WsNotificationSource {
    async fn subscribe(&self, channel: &str) -> Result<NotificationStream, SourceError> {
        let signature = self
            .book
            .get(channel)
            .cloned()
            .ok_or_else(|| SourceError::UnknownChannel(channel.to_string()))?;

        let (ws_stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let mut filter = json!({ "topics": [signature.topic0_hex()] });
        if let Some(contract) = self.contract {
            filter["address"] = json!(contract.to_string());
        }
        let id = self.next_id();
        let request = WsRequest {
            jsonrpc: "2.0",
            method: "eth_subscribe",
            params: json!(["logs", filter]),
            id,
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| SourceError::Refused(e.to_string()))?;
        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        let subscription =
            tokio::time::timeout(SUBSCRIBE_TIMEOUT, confirm_subscription(&mut read, id))
                .await
                .map_err(|_| {
                    SourceError::Unreachable("eth_subscribe not confirmed in time".into())
                })??;
        info!(
            channel = channel,
            subscription = %subscription,
            topic0 = %signature.topic0_hex(),
            "Log subscription established"
        );

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let forwarder = LogForwarder {
            channel: channel.to_string(),
            signature,
            subscription,
            unsubscribe_id: self.next_id(),
            sequence: 0,
        };
        tokio::spawn(forwarder.run(write, read, tx));

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Read frames until the reply to request `id` arrives.
async fn confirm_subscription(read: &mut WsRead, id: u64) -> Result<String, SourceError> {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let Ok(response) = serde_json::from_str::<WsResponse>(text.as_str()) else {
                    continue;
                };
                if response.id != Some(id) {
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(SourceError::Refused(error.message));
                }
                return response
                    .result
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| SourceError::Refused("subscription id missing".into()));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(SourceError::Unreachable(e.to_string())),
        }
    }
    Err(SourceError::Unreachable(
        "websocket closed before the subscription was confirmed".into(),
    ))
}

struct LogForwarder {
    channel: String,
    signature: EventSignature,
    subscription: String,
    unsubscribe_id: u64,
    sequence: u64,
}

impl LogForwarder {
    async fn run(mut self, mut write: WsWrite, mut read: WsRead, tx: mpsc::Sender<Notification>) {
        loop {
            tokio::select! {
                _ = tx.closed() => {
                    self.unsubscribe(&mut write).await;
                    return;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(notification) = self.handle_text(text.as_str()) {
                            if tx.send(notification).await.is_err() {
                                self.unsubscribe(&mut write).await;
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!(channel = %self.channel, "Node closed the log subscription");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(channel = %self.channel, error = %e, "Log subscription failed");
                        return;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn handle_text(&mut self, text: &str) -> Option<Notification> {
        let response = serde_json::from_str::<WsResponse>(text).ok()?;
        if response.method.as_deref() != Some("eth_subscription") {
            return None;
        }
        let params = response.params?;
        if params.subscription != self.subscription {
            return None;
        }

        let log: LogEntry = match serde_json::from_value(params.result) {
            Ok(log) => log,
            Err(e) => {
                debug!(channel = %self.channel, error = %e, "Skipping malformed log");
                return None;
            }
        };
        if log.removed {
            debug!(channel = %self.channel, "Skipping log removed by reorg");
            return None;
        }

        match log_to_notification(&self.channel, &self.signature, log, self.sequence + 1) {
            Ok(notification) => {
                self.sequence += 1;
                Some(notification)
            }
            Err(e) => {
                debug!(channel = %self.channel, error = %e, "Skipping undecodable log");
                None
            }
        }
    }

    async fn unsubscribe(&self, write: &mut WsWrite) {
        let request = WsRequest {
            jsonrpc: "2.0",
            method: "eth_unsubscribe",
            params: [self.subscription.as_str()],
            id: self.unsubscribe_id,
        };
        if let Ok(text) = serde_json::to_string(&request) {
            let _ = write.send(Message::Text(text.into())).await;
        }
        let _ = write.close().await;
        debug!(channel = %self.channel, subscription = %self.subscription, "Log subscription closed");
    }
}

fn log_to_notification(
    channel: &str,
    signature: &EventSignature,
    log: LogEntry,
    sequence: u64,
) -> Result<Notification, crate::abi::AbiError> {
    let decoded = signature.decode_log(&log.topics, &log.data)?;

    let mut payload = shared_types::Payload::new();
    payload.insert("address".into(), json!(log.address));
    payload.insert("data".into(), json!(log.data));
    payload.insert("topics".into(), json!(log.topics));
    payload.insert("blockNumber".into(), json!(log.block_number));
    payload.insert("transactionHash".into(), json!(log.transaction_hash));
    payload.insert("logIndex".into(), json!(log.log_index));
    payload.extend(decoded);

    Ok(Notification::new(channel, payload).with_sequence(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn word(hex_tail: &str) -> String {
        format!("0x{:0>64}", hex_tail)
    }

    fn winner_log(book: &EventBook, request_id: &str) -> Value {
        let sig = book.get("WinnerPicked").unwrap();
        json!({
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [sig.topic0_hex(), word(&"ab".repeat(20)), word(request_id)],
            "data": "0x",
            "blockNumber": "0xc",
            "transactionHash": "0x01",
            "logIndex": "0x0",
            "removed": false
        })
    }

    /// Accepts one connection, confirms the subscription, pushes `logs`,
    /// then either holds the connection open or closes it.
    async fn spawn_ws_node(logs: Vec<Value>, close_after: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                return;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(request["method"], "eth_subscribe");
            assert_eq!(request["params"][0], "logs");

            let reply = json!({"jsonrpc": "2.0", "id": request["id"], "result": "0xsub"});
            ws.send(Message::Text(reply.to_string().into())).await.unwrap();
            for log in logs {
                let frame = json!({
                    "jsonrpc": "2.0",
                    "method": "eth_subscription",
                    "params": {"subscription": "0xsub", "result": log}
                });
                ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            }
            if close_after {
                let _ = ws.close(None).await;
                return;
            }
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_logs_become_notifications() {
        let book = EventBook::with_builtin();
        let foreign = json!({
            "address": "0x00", "topics": ["0xdeadbeef"], "data": "0x", "removed": false
        });
        let url = spawn_ws_node(vec![foreign, winner_log(&book, "2a")], false).await;
        let source = WsNotificationSource::new(url, book);

        let mut stream = source.subscribe("WinnerPicked").await.unwrap();
        let notification = stream.next().await.unwrap();

        assert_eq!(notification.channel, "WinnerPicked");
        assert_eq!(notification.sequence, 1);
        assert_eq!(notification.get_str("requestId"), Some("0x2a"));
        assert_eq!(
            notification.get_str("winner"),
            Some(format!("0x{}", "ab".repeat(20)).as_str())
        );
        assert_eq!(notification.get_str("blockNumber"), Some("0xc"));
    }

    #[tokio::test]
    async fn test_stream_ends_when_node_closes() {
        let book = EventBook::with_builtin();
        let url = spawn_ws_node(vec![winner_log(&book, "01")], true).await;
        let source = WsNotificationSource::new(url, book);

        let mut stream = source.subscribe("WinnerPicked").await.unwrap();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let source = WsNotificationSource::new("ws://127.0.0.1:1", EventBook::new());
        let err = source.subscribe("WinnerPicked").await.err().unwrap();
        assert_eq!(err, SourceError::UnknownChannel("WinnerPicked".into()));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let source = WsNotificationSource::new("ws://127.0.0.1:1", EventBook::with_builtin());
        let err = source.subscribe("WinnerPicked").await.err().unwrap();
        assert!(matches!(err, SourceError::Unreachable(_)));
    }
}
