//! WebSocket connection handlers.
//!
//! One tokio task per connection. Each socket is split: the write half is a
//! task draining that connection's [`Frame`] queue, the read half stays in the
//! handler loop. Closing either side deregisters only this connection and
//! never blocks siblings.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parley_relay::{
    ControlMessage, ConversationRole, DirectionProfile, Frame, ListenerHandle, OutboundMessage,
    Relay, SttCommand, TurnController,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Drain a connection's outbound queue into the socket. Ends when the queue
/// closes (all handles dropped) or the peer goes away; a `Close` frame ends
/// it early.
fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes),
                Frame::Close => break,
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    })
}

/// `/ws/browser` — listeners receiving translations, plus a few controls.
pub async fn browser_ws(
    State(relay): State<Arc<Relay>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| browser_loop(relay, socket))
}

async fn browser_loop(relay: Arc<Relay>, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let (handle, rx) = ListenerHandle::new();
    let writer = spawn_writer(sink, rx);
    relay.registry.register_listener(handle.clone());

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match ControlMessage::parse(&text) {
            Some(ControlMessage::Ping) => {
                handle.send_message(&OutboundMessage::Pong);
            }
            Some(ControlMessage::Stop) => {
                info!("⏹️ Stop command received from browser");
                if let Some(source) = relay.registry.take_audio_source() {
                    source.close();
                }
                relay
                    .registry
                    .broadcast_status("⏹️ Translation stopped by user");
            }
            Some(ControlMessage::Volume { value }) => {
                info!("🔊 Volume updated to: {value}x");
                relay.registry.broadcast_message(&OutboundMessage::Volume { value });
            }
            // Malformed control frames are a protocol error: ignore, no reply.
            None => {}
        }
    }

    relay.registry.unregister_listener(handle.id());
    drop(handle);
    let _ = writer.await;
}

/// `/ws/audio` — the broadcast audio source. A `linear16` encoding marker
/// means a capture bridge sending raw PCM; anything else is a mobile client
/// that also listens to the broadcast it feeds.
pub async fn audio_ws(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let raw_pcm = params.get("encoding").map(|v| v == "linear16").unwrap_or(false);
    ws.on_upgrade(move |socket| audio_loop(relay, socket, raw_pcm))
}

async fn audio_loop(relay: Arc<Relay>, socket: WebSocket, raw_pcm: bool) {
    let (sink, mut stream) = socket.split();
    let (handle, rx) = ListenerHandle::new();
    let writer = spawn_writer(sink, rx);

    let is_mobile = !raw_pcm;
    relay.registry.set_audio_source(handle.clone());
    if is_mobile {
        info!("📱 Mobile client connected (receiving translations)");
        relay.registry.register_listener(handle.clone());
    } else {
        info!("🎤 Audio bridge connected (input only)");
    }
    relay.registry.broadcast_status("🎤 Audio source connected");

    let profile = DirectionProfile::broadcast(raw_pcm);
    match relay.stt.open(&profile.stt).await {
        Ok(session) => {
            let pump = {
                let relay = relay.clone();
                tokio::spawn(async move { relay.pump_transcripts(session.events).await })
            };

            while let Some(Ok(message)) = stream.next().await {
                match message {
                    Message::Binary(bytes) => {
                        if session.commands.send(SttCommand::Audio(bytes)).await.is_err() {
                            warn!("STT stream went away, dropping audio source");
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            // Dropping the command sender closes the STT stream; the pump
            // ends once the trailing events drain.
            drop(session.commands);
            drop(pump);
        }
        Err(e) => {
            warn!("❌ Audio connection error: {e}");
            handle.send_message(&OutboundMessage::error(e.to_string()));
        }
    }

    info!("🎤 Audio source disconnected");
    relay.registry.clear_audio_source(handle.id());
    if is_mobile {
        relay.registry.unregister_listener(handle.id());
    }
    relay.registry.broadcast_status("🎤 Audio source disconnected");
    drop(handle);
    let _ = writer.await;
}

/// `/ws/conversation?mode=dad|friend` — one turn-based round per connection.
pub async fn conversation_ws(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let role = ConversationRole::from_query(params.get("mode").map(String::as_str));
    ws.on_upgrade(move |socket| conversation_loop(relay, socket, role))
}

async fn conversation_loop(relay: Arc<Relay>, socket: WebSocket, role: ConversationRole) {
    let (sink, mut stream) = socket.split();
    let (handle, rx) = ListenerHandle::new();
    let writer = spawn_writer(sink, rx);

    info!("🎤 Conversation mode: {role:?}");
    let profile = DirectionProfile::conversation(role);
    handle.send_message(&OutboundMessage::status(profile.ready_message));

    let mut turn = TurnController::new(profile.clone(), relay.config.stop_grace);
    match relay.stt.open(&profile.stt).await {
        Ok(session) => {
            let commands = session.commands;
            let mut events = session.events;
            loop {
                tokio::select! {
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Binary(bytes))) => {
                            if commands.send(SttCommand::Audio(bytes)).await.is_err() {
                                turn.fail(&handle, "speech stream ended");
                                break;
                            }
                        }
                        Some(Ok(Message::Text(text))) => {
                            if ControlMessage::parse(&text) == Some(ControlMessage::Stop) {
                                info!("🛑 Received STOP signal from client");
                                turn.finish_round(&commands, &mut events, &relay.pipeline, &handle)
                                    .await;
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    event = events.recv() => match event {
                        Some(event) => {
                            if let Some(update) = turn.on_event(&event) {
                                handle.send_message(&OutboundMessage::TranscriptionUpdate {
                                    text: update,
                                });
                            }
                        }
                        None => {
                            turn.fail(&handle, "speech stream ended");
                            break;
                        }
                    },
                }
            }
        }
        Err(e) => {
            warn!("❌ Conversation error: {e}");
            handle.send_message(&OutboundMessage::error(e.to_string()));
        }
    }

    info!("🎤 Conversation ended: {role:?}");
    drop(handle);
    let _ = writer.await;
}
