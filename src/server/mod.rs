pub mod protocol;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::simulation::{CurrentConditions, SimulationState};
use protocol::{ClientCommand, ForecastSnapshot, HealthStatus, PlaybackFrame};

/// Shared server state accessible from all connection handlers and the tick loop.
pub struct ServerState {
    /// Current forecast snapshot message (JSON string, ready to send).
    pub snapshot_json: RwLock<String>,
    /// Broadcast channel for snapshots and playback frames.
    pub update_sender: broadcast::Sender<String>,
    /// Health data updated each tick.
    pub health: RwLock<HealthData>,
    /// Manual regeneration requests, drained by the tick loop.
    regenerate_sender: mpsc::Sender<()>,
    location: String,
}

/// Data needed for the health endpoint.
#[derive(Debug, Default)]
pub struct HealthData {
    pub version: u64,
    pub ticks: u64,
    pub regenerations: u64,
    pub last_update: Option<NaiveDateTime>,
    pub playing: bool,
}

/// What the tick loop reports after each tick.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub version: u64,
    pub regenerations: u64,
    pub now: NaiveDateTime,
    pub playing: bool,
    /// The interpolated values were refreshed this tick
    pub updated: bool,
}

impl ServerState {
    pub fn new(
        initial_snapshot_json: String,
        location: impl Into<String>,
        regenerate_sender: mpsc::Sender<()>,
    ) -> Self {
        let (tx, _) = broadcast::channel(64);
        ServerState {
            snapshot_json: RwLock::new(initial_snapshot_json),
            update_sender: tx,
            health: RwLock::new(HealthData::default()),
            regenerate_sender,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Update server state after a tick completes.
    ///
    /// A new snapshot replaces the one handed to new connections and is
    /// broadcast; otherwise the frame (if any) is broadcast.
    pub async fn on_tick(
        &self,
        new_snapshot_json: Option<String>,
        frame_json: Option<String>,
        report: TickReport,
    ) {
        if let Some(json) = new_snapshot_json {
            *self.snapshot_json.write().await = json.clone();
            // No receivers is fine
            let _ = self.update_sender.send(json);
        } else if let Some(json) = frame_json {
            let _ = self.update_sender.send(json);
        }

        let mut health = self.health.write().await;
        health.ticks += 1;
        health.version = report.version;
        health.regenerations = report.regenerations;
        health.playing = report.playing;
        if report.updated {
            health.last_update = Some(report.now);
        }
    }

    /// Queue a manual regeneration. Returns false when the tick loop is gone.
    ///
    /// A request already waiting in the queue absorbs the new one.
    pub fn request_regenerate(&self) -> bool {
        match self.regenerate_sender.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub async fn health_status(&self) -> HealthStatus {
        let health = self.health.read().await;
        HealthStatus {
            version: health.version,
            ticks: health.ticks,
            regenerations: health.regenerations,
            last_update: health.last_update,
            location: self.location.clone(),
            playing: health.playing,
        }
    }
}

/// Build the JSON snapshot message for a simulation state.
pub fn build_snapshot_json(
    state: &SimulationState,
    current: Option<&CurrentConditions>,
    location: &str,
) -> String {
    let snapshot = ForecastSnapshot::from_state(state, current, location);
    serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string())
}

/// Build the JSON frame message carrying the interpolated values.
pub fn build_frame_json(state: &SimulationState, current: &CurrentConditions) -> String {
    let frame = PlaybackFrame::new(state, current);
    serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string())
}

/// Start the WebSocket + HTTP server on the given address.
pub async fn start_server(
    state: Arc<ServerState>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, state).await {
                error!(%peer, "Connection error: {}", e);
            }
        });
    }
}

/// Route an incoming TCP connection to WebSocket or one of the HTTP endpoints.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buf = [0u8; 512];
    let n = stream.peek(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]).to_lowercase();

    if request.contains("upgrade: websocket") {
        handle_websocket(stream, peer, state).await
    } else if request.starts_with("get /health") {
        handle_health_request(stream, state).await
    } else if request.starts_with("get /forecast") {
        handle_forecast_request(stream, state).await
    } else if request.starts_with("post /regenerate") {
        handle_regenerate_request(stream, state).await
    } else {
        debug!(%peer, "Unknown HTTP request");
        let mut stream = stream;
        discard_request(&mut stream).await?;
        respond(stream, "404 Not Found", r#"{"error":"not found"}"#).await
    }
}

/// Send the current snapshot, then stream updates and accept commands.
async fn handle_websocket(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!(%peer, "WebSocket connected");

    let (mut write, mut read) = futures_util::StreamExt::split(ws_stream);

    // Subscribe first so nothing published after the snapshot is missed
    let mut rx = state.update_sender.subscribe();
    let snapshot = state.snapshot_json.read().await.clone();
    futures_util::SinkExt::send(&mut write, Message::Text(snapshot.into())).await?;

    loop {
        tokio::select! {
            update = rx.recv() => {
                match update {
                    Ok(json) => {
                        if futures_util::SinkExt::send(&mut write, Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%peer, lagged = n, "Client lagged behind on updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = futures_util::StreamExt::next(&mut read) => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ClientCommand::parse(text.as_str()) {
                        Some(ClientCommand::Regenerate) => {
                            info!(%peer, "Manual regeneration requested");
                            if !state.request_regenerate() {
                                warn!(%peer, "Tick loop stopped, regeneration dropped");
                            }
                        }
                        None => debug!(%peer, "Ignoring unknown client message"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    info!(%peer, "WebSocket disconnected");
    Ok(())
}

async fn handle_health_request(
    mut stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    discard_request(&mut stream).await?;
    let body = serde_json::to_string(&state.health_status().await)?;
    respond(stream, "200 OK", &body).await
}

async fn handle_forecast_request(
    mut stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    discard_request(&mut stream).await?;
    let body = state.snapshot_json.read().await.clone();
    respond(stream, "200 OK", &body).await
}

async fn handle_regenerate_request(
    mut stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    discard_request(&mut stream).await?;
    if state.request_regenerate() {
        info!("Manual regeneration requested over HTTP");
        respond(stream, "202 Accepted", r#"{"queued":true}"#).await
    } else {
        respond(stream, "503 Service Unavailable", r#"{"queued":false}"#).await
    }
}

async fn discard_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = vec![0u8; 4096];
    let _ = stream.read(&mut buf).await?;
    Ok(())
}

async fn respond(
    mut stream: TcpStream,
    status: &str,
    body: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{generate_state, ForecastSettings};
    use crate::weather::Catalog;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::time::Duration;

    fn make_state() -> SimulationState {
        generate_state(
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            1,
            &Catalog::standard(),
            &ForecastSettings::default(),
            &mut ChaCha8Rng::seed_from_u64(42),
        )
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn make_current(state: &SimulationState) -> CurrentConditions {
        let sample = state.forecast.sample(12).unwrap();
        CurrentConditions::between(sample, sample, 0.0, noon())
    }

    fn report(version: u64) -> TickReport {
        TickReport {
            version,
            regenerations: 1,
            now: noon(),
            playing: true,
            updated: true,
        }
    }

    fn make_server_state(snapshot: &str) -> (ServerState, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(4);
        (ServerState::new(snapshot.to_string(), "Sim City, UK", tx), rx)
    }

    async fn http_request(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn serve_once(state: Arc<ServerState>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            if let Ok((stream, peer)) = listener.accept().await {
                let _ = handle_connection(stream, peer, state).await;
            }
        });
        (addr, handle)
    }

    #[test]
    fn build_snapshot_json_is_valid() {
        let state = make_state();
        let current = make_current(&state);
        let json = build_snapshot_json(&state, Some(&current), "Sim City, UK");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed["message_type"], "ForecastSnapshot");
        assert_eq!(parsed["hourly"].as_array().unwrap().len(), 24);
        assert_eq!(parsed["hourly"][0]["label"], "Now");
        assert_eq!(parsed["hourly"][0]["hour"], 12);
    }

    #[test]
    fn build_frame_json_is_valid() {
        let state = make_state();
        let json = build_frame_json(&state, &make_current(&state));
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(parsed["message_type"], "PlaybackFrame");
        assert_eq!(parsed["state_id"], state.id.to_string());
        assert!(parsed.get("hourly").is_none());
    }

    #[tokio::test]
    async fn on_tick_updates_health() {
        let (state, _rx) = make_server_state("{}");
        state.on_tick(None, Some("frame".to_string()), report(4)).await;
        state.on_tick(None, None, TickReport { updated: false, ..report(5) }).await;

        let health = state.health.read().await;
        assert_eq!(health.ticks, 2);
        assert_eq!(health.version, 5);
        assert_eq!(health.regenerations, 1);
        assert_eq!(health.last_update, Some(noon()));
        assert!(health.playing);
    }

    #[tokio::test]
    async fn new_snapshot_replaced_for_new_clients() {
        let (state, _rx) = make_server_state("initial");
        assert_eq!(*state.snapshot_json.read().await, "initial");

        state.on_tick(Some("updated".to_string()), None, report(2)).await;
        assert_eq!(*state.snapshot_json.read().await, "updated");

        state.on_tick(None, Some("frame".to_string()), report(2)).await;
        assert_eq!(*state.snapshot_json.read().await, "updated");
    }

    #[tokio::test]
    async fn broadcast_updates_to_subscribers() {
        let (state, _rx) = make_server_state("{}");
        let mut rx = state.update_sender.subscribe();

        state.on_tick(None, Some("frame_1".to_string()), report(1)).await;
        state
            .on_tick(Some("snapshot_2".to_string()), Some("frame_2".to_string()), report(2))
            .await;

        assert_eq!(rx.recv().await.unwrap(), "frame_1");
        assert_eq!(rx.recv().await.unwrap(), "snapshot_2");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_regenerate_queues_once() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = ServerState::new("{}".to_string(), "Sim City, UK", tx);

        assert!(state.request_regenerate());
        assert!(state.request_regenerate());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!state.request_regenerate());
    }

    #[tokio::test]
    async fn websocket_client_receives_snapshot_and_frame() {
        let sim = make_state();
        let current = make_current(&sim);
        let (state, _rx) =
            make_server_state(&build_snapshot_json(&sim, Some(&current), "Sim City, UK"));
        let state = Arc::new(state);
        let (addr, server_handle) = serve_once(Arc::clone(&state)).await;

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

        let msg = tokio::time::timeout(
            Duration::from_secs(5),
            futures_util::StreamExt::next(&mut ws),
        )
        .await
        .expect("timeout waiting for snapshot")
        .expect("stream ended")
        .expect("message error");

        let text = msg.into_text().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["message_type"], "ForecastSnapshot");
        assert_eq!(parsed["hourly"].as_array().unwrap().len(), 24);

        state
            .on_tick(None, Some(build_frame_json(&sim, &current)), report(1))
            .await;

        let msg = tokio::time::timeout(
            Duration::from_secs(5),
            futures_util::StreamExt::next(&mut ws),
        )
        .await
        .expect("timeout waiting for frame")
        .expect("stream ended")
        .expect("message error");

        let text = msg.into_text().unwrap();
        assert!(text.contains("PlaybackFrame"));

        futures_util::SinkExt::close(&mut ws).await.unwrap();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn websocket_regenerate_command_is_queued() {
        let (state, mut regen_rx) = make_server_state(r#"{"message_type":"ForecastSnapshot"}"#);
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let _snapshot = futures_util::StreamExt::next(&mut ws).await;

        futures_util::SinkExt::send(&mut ws, Message::Text("regenerate".into()))
            .await
            .unwrap();

        let queued = tokio::time::timeout(Duration::from_secs(5), regen_rx.recv())
            .await
            .expect("timeout waiting for regenerate request");
        assert_eq!(queued, Some(()));

        futures_util::SinkExt::close(&mut ws).await.unwrap();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn health_endpoint_returns_json() {
        let (state, _rx) = make_server_state("{}");
        state.on_tick(None, None, report(7)).await;
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let response =
            http_request(addr, b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.contains("200 OK"));
        assert!(response.contains("application/json"));

        let body_start = response.find('{').unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response[body_start..]).unwrap();
        assert_eq!(parsed["version"], 7);
        assert_eq!(parsed["ticks"], 1);
        assert_eq!(parsed["regenerations"], 1);
        assert_eq!(parsed["location"], "Sim City, UK");
        assert_eq!(parsed["playing"], true);
        assert_eq!(parsed["last_update"], "2026-10-16T12:00:00");

        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn forecast_endpoint_returns_snapshot() {
        let (state, _rx) = make_server_state(r#"{"message_type":"ForecastSnapshot"}"#);
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let response =
            http_request(addr, b"GET /forecast HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.contains("200 OK"));
        assert!(response.ends_with(r#"{"message_type":"ForecastSnapshot"}"#));

        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn regenerate_endpoint_queues_request() {
        let (state, mut regen_rx) = make_server_state("{}");
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let response = http_request(
            addr,
            b"POST /regenerate HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        assert!(response.contains("202 Accepted"));
        assert_eq!(regen_rx.try_recv(), Ok(()));

        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (state, _rx) = make_server_state("{}");
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let response = http_request(addr, b"GET /nope HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.contains("404 Not Found"));

        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn client_disconnect_does_not_crash_server() {
        let (state, _rx) = make_server_state(r#"{"message_type":"ForecastSnapshot"}"#);
        let (addr, server_handle) = serve_once(Arc::new(state)).await;

        let url = format!("ws://127.0.0.1:{}", addr.port());
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        drop(ws);

        let result = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
        assert!(result.is_ok(), "Server should handle disconnect within 5s");
    }
}
