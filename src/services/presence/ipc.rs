//! Discord Rich Presence over the local IPC socket.
//!
//! Frames are `opcode: u32 LE`, `length: u32 LE`, then `length` bytes of JSON.

use super::r#trait::PresenceClient;
use crate::config::{ButtonConfig, DiscordConfig};
use crate::debug_if_enabled;
use crate::error::{PresenceError, Result};
use crate::events::PresenceUpdate;
use crate::presence_error;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

const MAX_FRAME_BYTES: usize = 64 * 1024;
const MAX_TEXT_CHARS: usize = 128;
const MAX_BUTTON_LABEL_CHARS: usize = 32;
const IPC_SLOTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::Frame),
            2 => Ok(Self::Close),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Pong),
            other => Err(presence_error!(protocol, "unknown opcode {}", other)),
        }
    }
}

pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

pub async fn write_frame<W>(writer: &mut W, opcode: Opcode, payload: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let body = serde_json::to_vec(payload)?;
    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&(opcode as u32).to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<(Opcode, Value)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).await?;

    let opcode = Opcode::from_u32(u32::from_le_bytes([header[0], header[1], header[2], header[3]]))?;
    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if length > MAX_FRAME_BYTES {
        return Err(presence_error!(protocol, "frame of {} bytes exceeds {}", length, MAX_FRAME_BYTES));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((opcode, payload))
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| PresenceError::Timeout(timeout))?
}

fn event_name(payload: &Value) -> Option<&str> {
    payload.get("evt").and_then(Value::as_str)
}

/// Human-readable reason out of an ERROR or close payload.
fn describe(payload: &Value) -> String {
    payload
        .pointer("/data/message")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// SET_ACTIVITY command for one update. Discord requires a pid; without a
/// sampled one the reporter's own pid is sent.
pub fn activity_payload(update: &PresenceUpdate, buttons: &[ButtonConfig], nonce: &str) -> Value {
    let mut activity = json!({
        "details": truncate(&update.details, MAX_TEXT_CHARS),
        "state": truncate(&update.state, MAX_TEXT_CHARS),
    });

    if update.start_timestamp > 0 {
        activity["timestamps"] = json!({ "start": update.start_timestamp });
    }

    if !buttons.is_empty() {
        activity["buttons"] = buttons
            .iter()
            .map(|button| {
                json!({
                    "label": truncate(&button.label, MAX_BUTTON_LABEL_CHARS),
                    "url": button.url,
                })
            })
            .collect::<Vec<_>>()
            .into();
    }

    json!({
        "cmd": "SET_ACTIVITY",
        "args": {
            "pid": update.pid.unwrap_or_else(std::process::id),
            "activity": activity,
        },
        "nonce": nonce,
    })
}

pub struct DiscordIpcClient {
    client_id: String,
    buttons: Vec<ButtonConfig>,
    timeout: Duration,
    stream: Option<Box<dyn IpcStream>>,
    nonce: u64,
}

impl DiscordIpcClient {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            buttons: config.buttons.clone(),
            timeout: config.timeout(),
            stream: None,
            nonce: 0,
        }
    }

    /// Performs the handshake on an already opened stream.
    pub async fn connect_stream(&mut self, mut stream: Box<dyn IpcStream>) -> Result<()> {
        let handshake = json!({ "v": 1, "client_id": self.client_id });

        with_timeout(self.timeout, async {
            write_frame(&mut stream, Opcode::Handshake, &handshake).await?;
            loop {
                let (opcode, payload) = read_frame(&mut stream).await?;
                match opcode {
                    Opcode::Frame if event_name(&payload) == Some("READY") => return Ok(()),
                    Opcode::Frame if event_name(&payload) == Some("ERROR") => {
                        return Err(presence_error!(connect, "handshake rejected: {}", describe(&payload)));
                    }
                    Opcode::Close => {
                        return Err(presence_error!(connect, "Discord closed the handshake: {}", describe(&payload)));
                    }
                    Opcode::Ping => write_frame(&mut stream, Opcode::Pong, &payload).await?,
                    other => debug!("Ignoring {:?} frame during handshake", other),
                }
            }
        })
        .await?;

        self.stream = Some(stream);
        Ok(())
    }

    fn next_nonce(&mut self) -> String {
        self.nonce += 1;
        format!("{}-{}", std::process::id(), self.nonce)
    }
}

#[cfg(unix)]
fn socket_dirs() -> Vec<std::path::PathBuf> {
    use std::path::PathBuf;

    let mut bases: Vec<PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    bases.push(PathBuf::from("/tmp"));

    // Flatpak and Snap builds of Discord put the socket one level down.
    bases
        .iter()
        .flat_map(|base| {
            [
                base.clone(),
                base.join("app/com.discordapp.Discord"),
                base.join("snap.discord"),
            ]
        })
        .collect()
}

#[cfg(unix)]
async fn open_socket() -> Result<Box<dyn IpcStream>> {
    for dir in socket_dirs() {
        for slot in 0..IPC_SLOTS {
            let path = dir.join(format!("discord-ipc-{}", slot));
            match tokio::net::UnixStream::connect(&path).await {
                Ok(stream) => {
                    info!("Connected to Discord IPC socket {:?}", path);
                    return Ok(Box::new(stream));
                }
                Err(e) => debug_if_enabled!("{:?}: {}", path, e),
            }
        }
    }
    Err(presence_error!(connect, "no Discord IPC socket found (is Discord running?)"))
}

#[cfg(windows)]
async fn open_socket() -> Result<Box<dyn IpcStream>> {
    use tokio::net::windows::named_pipe::ClientOptions;

    for slot in 0..IPC_SLOTS {
        let name = format!(r"\\?\pipe\discord-ipc-{}", slot);
        match ClientOptions::new().open(&name) {
            Ok(pipe) => {
                info!("Connected to Discord IPC pipe {}", name);
                return Ok(Box::new(pipe));
            }
            Err(e) => debug_if_enabled!("{}: {}", name, e),
        }
    }
    Err(presence_error!(connect, "no Discord IPC pipe found (is Discord running?)"))
}

#[cfg(not(any(unix, windows)))]
async fn open_socket() -> Result<Box<dyn IpcStream>> {
    Err(presence_error!(connect, "Discord IPC is not supported on this platform"))
}

#[async_trait::async_trait]
impl PresenceClient for DiscordIpcClient {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = with_timeout(self.timeout, open_socket()).await?;
        self.connect_stream(stream).await
    }

    async fn set_activity(&mut self, update: &PresenceUpdate) -> Result<()> {
        if self.stream.is_none() {
            return Err(PresenceError::NotConnected);
        }

        let nonce = self.next_nonce();
        let payload = activity_payload(update, &self.buttons, &nonce);
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(PresenceError::NotConnected)?;

        with_timeout(timeout, async move {
            write_frame(stream, Opcode::Frame, &payload).await?;
            loop {
                let (opcode, reply) = read_frame(stream).await?;
                match opcode {
                    Opcode::Frame => {
                        if reply.get("nonce").and_then(Value::as_str) != Some(nonce.as_str()) {
                            debug_if_enabled!("Skipping unrelated frame: {}", reply);
                            continue;
                        }
                        if event_name(&reply) == Some("ERROR") {
                            return Err(presence_error!(update, "{}", describe(&reply)));
                        }
                        return Ok(());
                    }
                    Opcode::Ping => write_frame(stream, Opcode::Pong, &reply).await?,
                    Opcode::Close => {
                        return Err(presence_error!(protocol, "Discord closed the connection: {}", describe(&reply)));
                    }
                    other => debug!("Ignoring {:?} frame while waiting for a reply", other),
                }
            }
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            // The peer may already be gone; closing is best effort.
            let _ = write_frame(&mut stream, Opcode::Close, &json!({})).await;
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord_ipc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn client() -> DiscordIpcClient {
        let config = DiscordConfig {
            client_id: "42".to_string(),
            timeout_ms: 1000,
            buttons: vec![ButtonConfig {
                label: "Source".to_string(),
                url: "https://example.com".to_string(),
            }],
        };
        DiscordIpcClient::new(&config)
    }

    async fn accept_handshake(server: &mut DuplexStream) -> Value {
        let (opcode, payload) = read_frame(server).await.unwrap();
        assert_eq!(opcode, Opcode::Handshake);
        write_frame(server, Opcode::Frame, &json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}}))
            .await
            .unwrap();
        payload
    }

    #[tokio::test]
    async fn test_handshake_and_set_activity() {
        let (client_side, mut server) = tokio::io::duplex(8192);
        let server_task = tokio::spawn(async move {
            let handshake = accept_handshake(&mut server).await;
            assert_eq!(handshake, json!({"v": 1, "client_id": "42"}));

            let (opcode, command) = read_frame(&mut server).await.unwrap();
            assert_eq!(opcode, Opcode::Frame);

            // A ping in the middle must be answered before the reply is read.
            write_frame(&mut server, Opcode::Ping, &json!({"seq": 1})).await.unwrap();
            let (pong, echoed) = read_frame(&mut server).await.unwrap();
            assert_eq!(pong, Opcode::Pong);
            assert_eq!(echoed, json!({"seq": 1}));

            let nonce = command["nonce"].clone();
            write_frame(&mut server, Opcode::Frame, &json!({"evt": "ACTIVITY_UPDATE", "nonce": "other"}))
                .await
                .unwrap();
            write_frame(&mut server, Opcode::Frame, &json!({"cmd": "SET_ACTIVITY", "nonce": nonce, "evt": null}))
                .await
                .unwrap();
            command
        });

        let mut client = client();
        client.connect_stream(Box::new(client_side)).await.unwrap();
        assert!(client.stream.is_some());

        let update = PresenceUpdate::new("bro is doing: ", "Google Chrome", 1_700_000_000).with_pid(Some(777));
        client.set_activity(&update).await.unwrap();

        let command = server_task.await.unwrap();
        assert_eq!(command["cmd"], "SET_ACTIVITY");
        assert_eq!(command["args"]["pid"], 777);
        assert_eq!(command["args"]["activity"]["details"], "bro is doing: ");
        assert_eq!(command["args"]["activity"]["state"], "Google Chrome");
        assert_eq!(command["args"]["activity"]["timestamps"]["start"], 1_700_000_000i64);
        assert_eq!(command["args"]["activity"]["buttons"][0]["label"], "Source");
    }

    #[tokio::test]
    async fn test_error_reply_is_update_failure() {
        let (client_side, mut server) = tokio::io::duplex(8192);
        tokio::spawn(async move {
            accept_handshake(&mut server).await;
            let (_, command) = read_frame(&mut server).await.unwrap();
            write_frame(
                &mut server,
                Opcode::Frame,
                &json!({"evt": "ERROR", "nonce": command["nonce"], "data": {"code": 4000, "message": "child \"activity\" fails"}}),
            )
            .await
            .unwrap();
            // Keep the stream open until the client is done.
            let _ = read_frame(&mut server).await;
        });

        let mut client = client();
        client.connect_stream(Box::new(client_side)).await.unwrap();
        let err = client
            .set_activity(&PresenceUpdate::new("a: ", "b", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PresenceError::Update(ref msg) if msg.contains("activity")));
    }

    #[tokio::test]
    async fn test_handshake_close_is_connect_failure() {
        let (client_side, mut server) = tokio::io::duplex(8192);
        tokio::spawn(async move {
            let _ = read_frame(&mut server).await.unwrap();
            write_frame(&mut server, Opcode::Close, &json!({"code": 4000, "message": "Invalid Client ID"}))
                .await
                .unwrap();
        });

        let mut client = client();
        let err = client.connect_stream(Box::new(client_side)).await.unwrap_err();
        assert!(matches!(err, PresenceError::Connect(ref msg) if msg.contains("Invalid Client ID")));
        assert!(!client.stream.is_some());
    }

    #[tokio::test]
    async fn test_set_activity_requires_connection() {
        let mut client = client();
        let err = client.set_activity(&PresenceUpdate::new("a: ", "b", 0)).await.unwrap_err();
        assert!(matches!(err, PresenceError::NotConnected));
    }

    #[tokio::test]
    async fn test_close_sends_close_frame_and_is_idempotent() {
        let (client_side, mut server) = tokio::io::duplex(8192);
        let server_task = tokio::spawn(async move {
            accept_handshake(&mut server).await;
            read_frame(&mut server).await.unwrap().0
        });

        let mut client = client();
        client.connect_stream(Box::new(client_side)).await.unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.stream.is_some());
        assert_eq!(server_task.await.unwrap(), Opcode::Close);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&1u32.to_le_bytes());
        frame.extend_from_slice(&((MAX_FRAME_BYTES + 1) as u32).to_le_bytes());
        let mut reader = frame.as_slice();
        assert!(matches!(read_frame(&mut reader).await, Err(PresenceError::Protocol(_))));
    }

    #[test]
    fn test_payload_truncates_and_defaults_pid() {
        let long_state = "x".repeat(300);
        let update = PresenceUpdate::new("d: ", long_state, 0);
        let payload = activity_payload(&update, &[], "1-1");

        assert_eq!(payload["args"]["pid"], std::process::id());
        assert_eq!(payload["args"]["activity"]["state"].as_str().unwrap().len(), MAX_TEXT_CHARS);
        assert!(payload["args"]["activity"].get("timestamps").is_none());
        assert!(payload["args"]["activity"].get("buttons").is_none());
        assert_eq!(payload["nonce"], "1-1");
    }
}
