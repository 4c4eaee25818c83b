//! End-to-end flows with scripted collaborators: one conversation round and
//! one open-broadcast utterance, no network anywhere.

use parley_relay::{
    ApiSettings, CannedSynthesizer, ConversationRole, DirectionProfile, FixedTranslator, Frame,
    ListenerHandle, Relay, RelayConfig, ScriptedStt, SttConnector, SttOptions,
    TranscriptEvent, TranslationPipeline, TurnController, TurnState,
};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> RelayConfig {
    RelayConfig {
        port: 0,
        stt_ws_url: "wss://example.invalid".to_string(),
        stt_api_key: "test".to_string(),
        translate: ApiSettings {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
        },
        synth: ApiSettings {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
        },
        policy: Default::default(),
        stop_grace: Duration::from_secs(3),
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

#[tokio::test(start_paused = true)]
async fn conversation_round_delivers_translation_and_audio() {
    let connector = ScriptedStt::new(vec![
        TranscriptEvent::final_fragment("ni hao", false),
        TranscriptEvent::interim("peng"),
    ]);
    let mut session = connector
        .open(&SttOptions::conversation("zh-CN"))
        .await
        .unwrap();

    let pipeline = TranslationPipeline::new(
        Arc::new(FixedTranslator::with_output("hello friend")),
        Arc::new(CannedSynthesizer::new(vec![9; 8])),
    );
    let mut turn = TurnController::new(
        DirectionProfile::conversation(ConversationRole::Dad),
        Duration::from_secs(3),
    );

    // Consume the scripted events the way the gateway loop would.
    for _ in 0..2 {
        let event = session.events.recv().await.unwrap();
        turn.on_event(&event);
    }

    let (out, mut out_rx) = ListenerHandle::new();
    turn.finish_round(&session.commands, &mut session.events, &pipeline, &out)
        .await;
    assert_eq!(turn.state(), TurnState::Complete);

    let frames = drain(&mut out_rx);
    let translation = frames
        .iter()
        .find_map(|f| match f {
            Frame::Text(t) if t.contains(r#""type":"translation""#) => Some(t),
            _ => None,
        })
        .expect("a translation frame");
    // The trailing interim hypothesis is merged behind the accepted final.
    assert!(translation.contains("ni hao peng"));
    assert!(translation.contains("hello friend"));
    assert!(translation.contains(r#""channel":"speaker""#));
    assert!(frames.iter().any(|f| matches!(f, Frame::Binary(b) if b.len() == 8)));
}

#[tokio::test]
async fn broadcast_stream_reaches_every_listener() {
    let long = "this sentence definitely has more than ten words in it total.";
    let relay = Relay::new(
        test_config(),
        Arc::new(ScriptedStt::closing(vec![TranscriptEvent::final_fragment(
            long, false,
        )])),
        Arc::new(FixedTranslator::with_output("译文")),
        Arc::new(CannedSynthesizer::new(vec![5; 24])),
    );

    let (first, mut first_rx) = ListenerHandle::new();
    let (second, mut second_rx) = ListenerHandle::new();
    relay.registry.register_listener(first);
    relay.registry.register_listener(second);

    let session = relay.stt.open(&SttOptions::broadcast(true)).await.unwrap();
    relay.pump_transcripts(session.events).await;

    for rx in [&mut first_rx, &mut second_rx] {
        let frames = drain(rx);
        assert!(frames.iter().any(|f| matches!(f, Frame::Text(t) if t.contains(long))));
        assert!(frames.iter().any(|f| matches!(f, Frame::Binary(b) if b.len() == 24)));
    }
}
