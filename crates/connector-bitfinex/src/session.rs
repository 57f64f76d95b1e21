//! Bitfinex 인증 WebSocket 세션.
//!
//! 연결 → 인증 → 읽기/쓰기 루프의 생명주기를 관리합니다. 연결 시도는
//! 연결 전용 토큰 버킷을 거치고, 인증 완료 전에는 커맨드를 보낼 수
//! 없습니다. 하트비트가 끊기면 연결을 죽은 것으로 판정합니다.

use crate::config::BitfinexConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::messages::{parse_frame, StreamMessage};
use crate::rate_limit::TokenBucket;
use crate::signing::{sign_hmac_sha384, NonceFactory};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

/// 인증 응답 대기 한도.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
/// 하트비트 감시 한도. Bitfinex는 15초 간격으로 hb를 보냅니다.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
/// 재연결 백오프 상한.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 세션이 호스트 쪽으로 흘려보내는 이벤트.
#[derive(Debug)]
pub enum SessionEvent {
    /// 디코딩된 스트림 메시지
    Message(StreamMessage),
    /// 연결 종료 (사유 포함)
    Disconnected { reason: String },
}

/// 인증된 스트림 세션.
///
/// [`connect`](Self::connect)로 인증까지 마친 뒤 [`run`](Self::run)으로
/// 읽기/쓰기 태스크를 띄웁니다. 이벤트는 [`take_events`](Self::take_events)
/// 로 가져간 수신기에서 하나씩 꺼냅니다.
pub struct BitfinexSession {
    config: BitfinexConfig,
    connect_bucket: Arc<TokenBucket>,
    nonce: NonceFactory,
    ws: Option<WsStream>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    command_tx: Option<mpsc::Sender<String>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl BitfinexSession {
    pub fn new(config: BitfinexConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);
        Self {
            config,
            connect_bucket: Arc::new(TokenBucket::connections()),
            nonce: NonceFactory::new(),
            ws: None,
            event_tx,
            event_rx: Some(event_rx),
            command_tx: None,
            reader_task: None,
        }
    }

    /// 인증 메시지를 만듭니다. 서명 대상은 `AUTH{nonce}`입니다.
    fn auth_message(&self, nonce: i64) -> ConnectorResult<String> {
        let payload = format!("AUTH{}", nonce);
        let signature = sign_hmac_sha384(self.config.credentials.expose_secret(), &payload);

        Ok(serde_json::json!({
            "event": "auth",
            "apiKey": self.config.credentials.api_key,
            "authSig": signature,
            "authNonce": nonce,
            "authPayload": payload,
            "filter": ["trading", "wallet"],
        })
        .to_string())
    }

    /// 연결하고 인증을 마칩니다.
    ///
    /// 연결 버킷에서 토큰을 얻은 뒤 접속하므로 재연결 폭주가
    /// 막힙니다. 인증 거부는 치명적 에러로 돌려주어 재연결 루프가
    /// 멈추도록 합니다.
    pub async fn connect(&mut self) -> ConnectorResult<()> {
        self.connect_bucket.acquire().await;

        let url = &self.config.ws_url;
        info!("Connecting to Bitfinex WebSocket: {}", url);

        let (mut ws, _) = connect_async(url.as_str()).await?;

        let nonce = self.nonce.next();
        ws.send(Message::Text(self.auth_message(nonce)?.into()))
            .await?;

        // 인증 응답까지 수신 프레임을 소비
        let deadline = tokio::time::Instant::now() + AUTH_TIMEOUT;
        loop {
            let frame = tokio::time::timeout_at(deadline, ws.next())
                .await
                .map_err(|_| ConnectorError::Timeout("auth response".to_string()))?
                .ok_or_else(|| {
                    ConnectorError::Disconnected("Closed during auth".to_string())
                })?;

            match frame? {
                Message::Text(text) => match parse_frame(&text)? {
                    StreamMessage::AuthAck { success: true, .. } => {
                        info!("Bitfinex WebSocket authenticated");
                        break;
                    }
                    StreamMessage::AuthAck {
                        success: false,
                        code,
                        message,
                    } => {
                        return Err(ConnectorError::Unauthorized(format!(
                            "Auth rejected (code {:?}): {}",
                            code,
                            message.unwrap_or_default()
                        )));
                    }
                    // info 이벤트 등은 건너뜀
                    _ => continue,
                },
                Message::Close(_) => {
                    return Err(ConnectorError::Disconnected(
                        "Closed during auth".to_string(),
                    ));
                }
                _ => continue,
            }
        }

        self.ws = Some(ws);
        Ok(())
    }

    /// 읽기/쓰기 태스크를 띄웁니다.
    ///
    /// 읽기 태스크는 프레임을 디코딩해 이벤트 채널로 보내고, 하트비트가
    /// [`HEARTBEAT_TIMEOUT`] 동안 없으면 연결을 끊긴 것으로 처리합니다.
    pub fn run(&mut self) -> ConnectorResult<()> {
        let ws = self
            .ws
            .take()
            .ok_or_else(|| ConnectorError::Disconnected("Not connected".to_string()))?;
        let (mut write, mut read) = ws.split();

        let (command_tx, mut command_rx) = mpsc::channel::<String>(100);
        self.command_tx = Some(command_tx);

        // 쓰기 태스크. 커맨드 채널이 닫히면 Close 프레임을 보내 소켓을
        // 우리 쪽에서 정리합니다.
        tokio::spawn(async move {
            while let Some(text) = command_rx.recv().await {
                debug!(frame = %text, "Sending command frame");
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    error!("WebSocket send failed: {}", e);
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        // 읽기 태스크 (하트비트 감시 포함)
        let tx = self.event_tx.clone();
        let reader = tokio::spawn(async move {
            loop {
                let frame = match tokio::time::timeout(HEARTBEAT_TIMEOUT, read.next()).await {
                    Err(_) => {
                        warn!("No heartbeat for {:?}, dropping connection", HEARTBEAT_TIMEOUT);
                        let _ = tx
                            .send(SessionEvent::Disconnected {
                                reason: "heartbeat timeout".to_string(),
                            })
                            .await;
                        break;
                    }
                    Ok(None) => {
                        let _ = tx
                            .send(SessionEvent::Disconnected {
                                reason: "stream ended".to_string(),
                            })
                            .await;
                        break;
                    }
                    Ok(Some(frame)) => frame,
                };

                match frame {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Ok(StreamMessage::Ignored) => {}
                        Ok(message) => {
                            if tx.send(SessionEvent::Message(message)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(frame = %text, "Failed to parse frame: {}", e);
                        }
                    },
                    Ok(Message::Ping(_)) => {
                        // Pong은 tungstenite에서 자동으로 처리됨
                        debug!("Received ping");
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket closed by server");
                        let _ = tx
                            .send(SessionEvent::Disconnected {
                                reason: "closed by server".to_string(),
                            })
                            .await;
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        let _ = tx
                            .send(SessionEvent::Disconnected {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                    _ => {}
                }
            }
        });
        self.reader_task = Some(reader);

        Ok(())
    }

    /// 커맨드 프레임을 전송 큐에 넣습니다.
    pub async fn send_command(&self, frame: String) -> ConnectorResult<()> {
        let tx = self
            .command_tx
            .as_ref()
            .ok_or_else(|| ConnectorError::Disconnected("Not connected".to_string()))?;
        tx.send(frame)
            .await
            .map_err(|_| ConnectorError::Disconnected("Writer task gone".to_string()))
    }

    /// 이벤트 수신기를 가져갑니다. 세션 생애 동안 한 번만 가능하며,
    /// 재연결을 거쳐도 같은 수신기로 이벤트가 이어집니다.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// 연결 여부 (커맨드 전송 가능 여부).
    pub fn is_connected(&self) -> bool {
        self.command_tx.is_some()
    }

    /// 연결 상태를 정리합니다 (재연결 전 또는 해제 시).
    ///
    /// 읽기 태스크를 중단시키고 커맨드 채널을 끊어 쓰기 태스크가 Close
    /// 프레임을 보내고 종료되게 합니다. 중단된 읽기 태스크 대신 여기서
    /// Disconnected 이벤트를 밀어 넣어 이벤트 소비자가 멈추지 않습니다.
    pub fn reset(&mut self) {
        self.ws = None;
        self.command_tx = None;
        if let Some(task) = self.reader_task.take() {
            if !task.is_finished() {
                task.abort();
                let _ = self.event_tx.try_send(SessionEvent::Disconnected {
                    reason: "session reset".to_string(),
                });
            }
        }
    }
}

/// n번째 재연결 시도 전 대기 시간 (지수 백오프).
pub fn reconnect_delay(attempt: u32) -> Duration {
    let base = Duration::from_secs(1);
    let delay = base.saturating_mul(2u32.saturating_pow(attempt.min(6)));
    delay.min(MAX_RECONNECT_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::Credentials;

    #[test]
    fn test_auth_message_shape() {
        let config = BitfinexConfig::new(
            Credentials::new("my-key", "my-secret"),
            connector_core::AccountType::Cash,
        );
        let session = BitfinexSession::new(config);
        let text = session.auth_message(1700000000000).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["event"], "auth");
        assert_eq!(value["apiKey"], "my-key");
        assert_eq!(value["authNonce"], 1700000000000i64);
        assert_eq!(value["authPayload"], "AUTH1700000000000");
        // HMAC-SHA384 16진수 서명
        let sig = value["authSig"].as_str().unwrap();
        assert_eq!(sig.len(), 96);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reconnect_delay_backoff() {
        assert_eq!(reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(reconnect_delay(4), Duration::from_secs(16));
        // 상한에서 멈춤
        assert_eq!(reconnect_delay(10), Duration::from_secs(60));
        assert_eq!(reconnect_delay(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_reset_stops_reader_and_closes_socket() {
        use tokio::io::AsyncReadExt;
        use tokio_tungstenite::tungstenite::protocol::Role;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        let ws = tokio_tungstenite::WebSocketStream::from_raw_socket(
            MaybeTlsStream::Plain(client),
            Role::Client,
            None,
        )
        .await;

        let config =
            BitfinexConfig::new(Credentials::new("k", "s"), connector_core::AccountType::Cash);
        let mut session = BitfinexSession::new(config);
        session.ws = Some(ws);
        session.run().unwrap();
        let mut events = session.take_events().unwrap();
        let reader = session.reader_task.as_ref().unwrap().abort_handle();

        session.reset();
        assert!(!session.is_connected());

        // 중단된 읽기 태스크 대신 Disconnected 이벤트가 도착
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
            Ok(Some(SessionEvent::Disconnected { .. })) => {}
            other => panic!("expected disconnect event, got {:?}", other),
        }

        // 읽기 태스크가 실제로 종료됨
        for _ in 0..200 {
            if reader.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reader.is_finished());

        // 쓰기 태스크가 Close 프레임(0x88)을 보내고 소켓을 닫음
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), server.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n >= 2);
        assert_eq!(buf[0], 0x88);
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let config =
            BitfinexConfig::new(Credentials::new("k", "s"), connector_core::AccountType::Cash);
        let session = BitfinexSession::new(config);
        assert!(!session.is_connected());
        assert!(matches!(
            session.send_command("[0,\"oc\",null,{}]".to_string()).await,
            Err(ConnectorError::Disconnected(_))
        ));
    }
}
