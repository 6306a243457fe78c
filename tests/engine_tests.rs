use fangchat::config::Config;
use fangchat::engine::ChatEngine;
use fangchat::queue::Submission;
use fangchat::session::{ChannelTransport, ChannelTransportHandle, ConnectionState};
use fangchat::state::{Role, ToolState, LEAK_NOT_EXECUTED_RESULT};
use fangchat::types::{ClientFrame, ServerEvent, TypingState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn test_config() -> Config {
    Config {
        server_url: "http://localhost:8889".to_string(),
        auth_token: None,
        agent_id: "default".to_string(),
        watchdog_timeout: Duration::from_secs(120),
        stream_reasoning: false,
    }
}

fn connected_engine() -> (ChatEngine, ChannelTransportHandle) {
    let (transport, handle) = ChannelTransport::pair();
    let mut engine = ChatEngine::new(&test_config(), Arc::new(transport));
    engine.connect("default").expect("bind");
    (engine, handle)
}

fn response(content: &str) -> ServerEvent {
    ServerEvent::Response {
        content: Some(content.to_string()),
        input_tokens: None,
        output_tokens: None,
        cost_usd: None,
        iterations: None,
        fallback_model: None,
        context_pressure: None,
    }
}

#[tokio::test]
async fn test_submission_round_trip() {
    let (mut engine, mut handle) = connected_engine();

    engine.handle_input("hello agent").await.expect("input");
    let frame = handle.frame_rx.try_recv().expect("frame sent");
    assert!(matches!(frame, ClientFrame::Message { content, .. } if content == "hello agent"));
    assert!(engine.is_turn_in_flight());

    engine
        .handle_event(ServerEvent::Typing {
            state: TypingState::Start,
            tool: None,
        })
        .await
        .expect("event");
    engine
        .handle_event(ServerEvent::TextDelta {
            content: "hi ".to_string(),
        })
        .await
        .expect("event");
    engine
        .handle_event(ServerEvent::TextDelta {
            content: "there".to_string(),
        })
        .await
        .expect("event");
    engine.handle_event(response("hi there")).await.expect("event");

    assert!(!engine.is_turn_in_flight());
    assert!(engine.open_turn().is_none());

    let transcript = engine.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].visible_text, "hello agent");
    assert_eq!(transcript[1].role, Role::Agent);
    assert_eq!(transcript[1].visible_text, "hi there");
}

#[tokio::test]
async fn test_queued_submissions_dispatch_in_fifo_order() {
    let (mut engine, mut handle) = connected_engine();

    engine.handle_input("first").await.expect("input");
    engine.handle_input("second").await.expect("input");
    engine.handle_input("third").await.expect("input");

    // Only the first goes out; the rest wait for the turn to resolve.
    let frame = handle.frame_rx.try_recv().expect("first frame");
    assert!(matches!(frame, ClientFrame::Message { content, .. } if content == "first"));
    assert!(handle.frame_rx.try_recv().is_err());
    assert_eq!(engine.queued_len(), 2);

    engine.handle_event(response("answer one")).await.expect("event");
    let frame = handle.frame_rx.try_recv().expect("second frame");
    assert!(matches!(frame, ClientFrame::Message { content, .. } if content == "second"));
    assert_eq!(engine.queued_len(), 1);

    engine.handle_event(response("answer two")).await.expect("event");
    let frame = handle.frame_rx.try_recv().expect("third frame");
    assert!(matches!(frame, ClientFrame::Message { content, .. } if content == "third"));

    engine.handle_event(response("answer three")).await.expect("event");
    assert!(!engine.is_turn_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_stuck_turn_is_discarded_and_queue_unblocked() {
    let (mut engine, mut handle) = connected_engine();

    engine.handle_input("first").await.expect("input");
    engine.handle_input("second").await.expect("input");
    handle.frame_rx.try_recv().expect("first frame");

    engine
        .handle_event(ServerEvent::Typing {
            state: TypingState::Start,
            tool: None,
        })
        .await
        .expect("event");
    assert!(engine.open_turn().is_some());
    assert!(engine.watchdog_deadline().is_some());

    // Just short of the window: nothing happens.
    tokio::time::advance(Duration::from_secs(119)).await;
    engine.poll_watchdog(Instant::now()).await.expect("poll");
    assert!(engine.open_turn().is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.poll_watchdog(Instant::now()).await.expect("poll");

    // Open turn discarded silently, second submission released.
    assert!(engine.open_turn().is_none());
    assert!(engine.watchdog_deadline().is_none());
    let frame = handle.frame_rx.try_recv().expect("second frame");
    assert!(matches!(frame, ClientFrame::Message { content, .. } if content == "second"));
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_keep_the_watchdog_alive() {
    let (mut engine, _handle) = connected_engine();

    engine
        .handle_event(ServerEvent::Typing {
            state: TypingState::Start,
            tool: None,
        })
        .await
        .expect("event");

    tokio::time::advance(Duration::from_secs(100)).await;
    engine
        .handle_event(ServerEvent::TextDelta {
            content: "still going".to_string(),
        })
        .await
        .expect("event");

    tokio::time::advance(Duration::from_secs(100)).await;
    engine.poll_watchdog(Instant::now()).await.expect("poll");
    assert!(engine.open_turn().is_some());
}

#[tokio::test]
async fn test_attachment_and_image_refs_ride_the_live_frame() {
    let (mut engine, mut handle) = connected_engine();

    engine
        .submit(Submission {
            text: "look at this".to_string(),
            attachment_refs: vec!["doc-1".to_string()],
            image_refs: vec!["img-9".to_string()],
        })
        .await
        .expect("submit");

    let frame = handle.frame_rx.try_recv().expect("frame sent");
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "message");
    assert_eq!(json["content"], "look at this");
    assert_eq!(json["attachments"][0], "doc-1");
    assert_eq!(json["images"][0], "img-9");
}

#[tokio::test]
async fn test_control_command_bypasses_the_queue() {
    let (mut engine, mut handle) = connected_engine();

    engine.handle_input("long job please").await.expect("input");
    handle.frame_rx.try_recv().expect("message frame");
    assert!(engine.is_turn_in_flight());

    engine.handle_input("/stop").await.expect("input");
    let frame = handle.frame_rx.try_recv().expect("control frame");
    assert!(matches!(frame, ClientFrame::Command { command, .. } if command == "stop"));
    // Still the same in-flight turn; the control frame was not a submission.
    assert!(engine.is_turn_in_flight());
    assert_eq!(engine.queued_len(), 0);
}

#[tokio::test]
async fn test_disconnected_stop_falls_back_to_one_shot() {
    // Never bound, and the server is unreachable: the stop frame cannot ride
    // the live connection, so it goes out as a one-shot request instead of
    // being dropped with a notice. The failed request surfaces as a system
    // turn, not an error.
    let (transport, _handle) = ChannelTransport::pair();
    let config = Config {
        server_url: "http://127.0.0.1:9".to_string(),
        ..test_config()
    };
    let mut engine = ChatEngine::new(&config, Arc::new(transport));

    engine.handle_input("/stop").await.expect("input");

    let turn = engine.transcript().last().expect("system turn");
    assert_eq!(turn.role, Role::System);
    assert!(turn.visible_text.starts_with("Stop request failed"));
}

#[tokio::test]
async fn test_disconnected_agents_command_only_posts_a_notice() {
    let (transport, _handle) = ChannelTransport::pair();
    let mut engine = ChatEngine::new(&test_config(), Arc::new(transport));

    engine.handle_input("/agents").await.expect("input");

    let turn = engine.transcript().last().expect("system turn");
    assert_eq!(turn.role, Role::System);
    assert_eq!(turn.visible_text, "Not connected; '/agents' was not sent.");
}

#[tokio::test]
async fn test_help_and_clear_are_purely_local() {
    let (mut engine, mut handle) = connected_engine();

    engine.handle_input("/help").await.expect("input");
    assert!(handle.frame_rx.try_recv().is_err());
    assert_eq!(engine.transcript().len(), 1);
    assert_eq!(engine.transcript()[0].role, Role::System);
    assert!(engine.transcript()[0].visible_text.contains("/clear"));

    engine.handle_input("/clear").await.expect("input");
    assert!(engine.transcript().is_empty());
}

#[tokio::test]
async fn test_leaked_tool_call_is_hidden_from_transcript() {
    let (mut engine, _handle) = connected_engine();

    engine
        .handle_event(ServerEvent::TextDelta {
            content: "Checking. <function=web_search>{\"query\": \"rust\"}".to_string(),
        })
        .await
        .expect("event");

    let open = engine.open_turn().expect("open");
    assert_eq!(open.visible_text, "Checking. ");
    assert_eq!(open.tools[0].name, "web_search");

    engine
        .handle_event(ServerEvent::Response {
            content: None,
            input_tokens: None,
            output_tokens: None,
            cost_usd: None,
            iterations: None,
            fallback_model: None,
            context_pressure: None,
        })
        .await
        .expect("event");

    let turn = engine.transcript().last().expect("finalized");
    assert_eq!(turn.visible_text, "Checking.");
    assert_eq!(turn.tools[0].state, ToolState::Errored);
    assert_eq!(turn.tools[0].result.as_deref(), Some(LEAK_NOT_EXECUTED_RESULT));
}

#[tokio::test]
async fn test_run_drains_events_until_stream_end() {
    let (mut engine, handle) = connected_engine();

    engine.handle_input("hello").await.expect("input");
    handle
        .event_tx
        .send(ServerEvent::Typing {
            state: TypingState::Start,
            tool: None,
        })
        .expect("send");
    handle
        .event_tx
        .send(ServerEvent::TextDelta {
            content: "done".to_string(),
        })
        .expect("send");
    handle.event_tx.send(response("done")).expect("send");
    drop(handle);

    engine.run().await.expect("run");

    assert_eq!(engine.connection_state(), ConnectionState::Disconnected);
    let turn = engine.transcript().last().expect("agent turn");
    assert_eq!(turn.visible_text, "done");
    assert!(!engine.is_turn_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_run_fires_the_watchdog_without_events() {
    let (mut engine, handle) = connected_engine();

    engine.handle_input("hello").await.expect("input");
    handle
        .event_tx
        .send(ServerEvent::Typing {
            state: TypingState::Start,
            tool: None,
        })
        .expect("send");

    let run = tokio::spawn(async move {
        engine.run().await.expect("run");
        engine
    });

    // Paused clock auto-advances when the runtime is otherwise idle, so the
    // watchdog deadline is the next thing to fire.
    tokio::time::sleep(Duration::from_secs(125)).await;
    drop(handle);
    let engine = run.await.expect("join");

    assert!(engine.open_turn().is_none());
    assert!(!engine.is_turn_in_flight());
}
