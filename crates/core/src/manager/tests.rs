use std::time::Duration;

use nebula_model::{ChatMessage, ErrorKind, Mode, Role};
use nebula_test_engine::{PresetFailure, PresetResponse, TestEngine};
use tokio::time::timeout;

use super::*;
use crate::selector::{Deployment, EngineSelector};
use crate::store::{self, MemoryStore};

fn scripted(responses: impl IntoIterator<Item = PresetResponse>) -> TestEngine {
    let mut engine = TestEngine::with_name("Scripted");
    for response in responses {
        engine.add_response(response);
    }
    engine
}

fn manager_with(engine: TestEngine, store: MemoryStore) -> ChatManager {
    let selector = EngineSelector::new(Deployment::Standard).with_cloud(engine);
    ChatManagerBuilder::new()
        .with_selector(selector)
        .with_store(store)
        .build()
}

async fn send(manager: &ChatManager, text: &str) -> SendOutcome {
    timeout(Duration::from_millis(500), manager.send_message(text))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_simple_message() {
    let engine =
        scripted([PresetResponse::with_chunks(["objective ", "clear "])]);
    let store = MemoryStore::default();
    let manager = manager_with(engine, store.clone());

    assert_eq!(send(&manager, "status?").await, SendOutcome::Completed);
    let messages = manager.messages();
    assert_eq!(
        messages,
        [
            ChatMessage::user("status?"),
            ChatMessage::assistant("objective clear "),
        ]
    );
    assert!(!manager.is_typing());
    assert_eq!(manager.engine_name().as_deref(), Some("Scripted"));

    // The stored snapshot mirrors the transcript.
    assert_eq!(store::load_transcript(&store).unwrap(), messages);
}

#[tokio::test]
async fn test_one_assistant_turn_per_send() {
    let engine = scripted([
        PresetResponse::with_chunks(["Hi, ", "what can I do ", "for you?"]),
        PresetResponse::with_chunks(["Done."]),
    ]);
    let manager = manager_with(engine.clone(), MemoryStore::default());

    send(&manager, "Hello").await;
    send(&manager, "Do it").await;
    let roles: Vec<_> =
        manager.messages().iter().map(|msg| msg.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(manager.messages()[1].content, "Hi, what can I do for you?");

    // Every request carries the system turn followed by the transcript,
    // without the placeholder.
    let requests = engine.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].len(), 4);
    assert_eq!(requests[1][0].role, Role::System);
    assert_eq!(requests[1][3], ChatMessage::user("Do it"));
}

#[tokio::test]
async fn test_mode_prompt() {
    let engine = scripted([PresetResponse::with_chunks(["Noted."])]);
    let manager = manager_with(engine.clone(), MemoryStore::default());
    assert_eq!(manager.mode(), Mode::Professional);

    manager.set_mode(Mode::Minimal).await;
    assert_eq!(manager.mode(), Mode::Minimal);
    send(&manager, "status?").await;

    let request = &engine.requests()[0];
    assert_eq!(request[0], ChatMessage::system(Mode::Minimal.system_prompt()));
}

#[tokio::test]
async fn test_annotate_engine() {
    let engine = scripted([PresetResponse::with_chunks(["Noted."])]);
    let manager = ChatManagerBuilder::new()
        .with_selector(
            EngineSelector::new(Deployment::Standard).with_cloud(engine.clone()),
        )
        .with_mode(Mode::Unfiltered)
        .annotate_engine(true)
        .build();
    send(&manager, "go").await;

    let request = &engine.requests()[0];
    assert_eq!(
        request[0].content,
        format!("{} | Scripted", Mode::Unfiltered.system_prompt())
    );
}

#[tokio::test]
async fn test_empty_response() {
    let engine = scripted([PresetResponse::with_chunks([" ", "\n"])]);
    let manager = manager_with(engine, MemoryStore::default());
    assert_eq!(send(&manager, "anything?").await, SendOutcome::Completed);
    assert_eq!(manager.messages()[1].content, EMPTY_RESPONSE_FALLBACK);
}

#[tokio::test]
async fn test_engine_failure() {
    let engine = scripted([PresetResponse::with_chunks(["half a "])
        .with_failure(PresetFailure::Transport)]);
    let manager = manager_with(engine, MemoryStore::default());
    assert_eq!(
        send(&manager, "hello").await,
        SendOutcome::Failed(SendFailure::Engine(ErrorKind::Transport))
    );
    assert_eq!(manager.messages()[1].content, LINK_LOST_MESSAGE);
    assert!(!manager.is_typing());
}

#[tokio::test]
async fn test_no_engine_available() {
    let engine = scripted([]);
    engine.set_available(false);
    let manager = manager_with(engine, MemoryStore::default());
    assert_eq!(
        send(&manager, "hello").await,
        SendOutcome::Failed(SendFailure::NoEngineAvailable)
    );
    assert_eq!(manager.messages()[1].content, NO_ENGINE_MESSAGE);
    assert_eq!(manager.engine_name(), None);
    assert!(!manager.is_typing());
}

#[tokio::test]
async fn test_reject_input() {
    let engine = scripted([PresetResponse::with_chunks(["one"])]);
    let manager = manager_with(engine, MemoryStore::default());
    assert_eq!(
        send(&manager, "  \t").await,
        SendOutcome::Rejected(RejectReason::EmptyInput)
    );
    assert!(manager.messages().is_empty());

    // The second send is issued while the first one is in flight.
    let (first, second) = tokio::join!(
        manager.send_message("first"),
        manager.send_message("second"),
    );
    assert_eq!(first, SendOutcome::Completed);
    assert_eq!(second, SendOutcome::Rejected(RejectReason::Busy));
    assert_eq!(
        manager.messages(),
        [ChatMessage::user("first"), ChatMessage::assistant("one")]
    );
}

#[tokio::test]
async fn test_set_messages_while_busy() {
    let mut engine = scripted([PresetResponse::with_chunks(["slow"])]);
    engine.set_delay(Duration::from_millis(50));
    let store = MemoryStore::default();
    let manager = manager_with(engine, store.clone());

    let mut snapshots = manager.subscribe();
    let replace = async {
        snapshots.wait_for(|s| s.is_typing).await.unwrap();
        manager.set_messages(vec![ChatMessage::user("other")]).await
    };
    let (outcome, replaced) =
        tokio::join!(manager.send_message("first"), replace);
    assert_eq!(outcome, SendOutcome::Completed);
    assert_eq!(replaced, Err(RejectReason::Busy));

    let messages = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
    manager.set_messages(messages.clone()).await.unwrap();
    assert_eq!(manager.messages(), messages);
    assert_eq!(store::load_transcript(&store).unwrap(), messages);
}

#[tokio::test]
async fn test_clear_memory() {
    let engine = scripted([PresetResponse::with_chunks(["ok"])]);
    let store = MemoryStore::default();
    let manager = manager_with(engine, store.clone());
    send(&manager, "remember this").await;
    assert!(store.contents().is_some());

    manager.clear_memory().await;
    assert!(manager.messages().is_empty());
    assert_eq!(store.contents(), None);

    let reloaded = manager_with(scripted([]), store);
    assert!(reloaded.messages().is_empty());
}

#[tokio::test]
async fn test_set_empty_messages() {
    let engine = scripted([PresetResponse::with_chunks(["ok"])]);
    let store = MemoryStore::default();
    let manager = manager_with(engine, store.clone());
    send(&manager, "remember this").await;

    manager.set_messages(vec![]).await.unwrap();
    assert!(manager.messages().is_empty());
    assert_eq!(store.contents(), None);

    let reloaded = manager_with(scripted([]), store);
    assert!(reloaded.messages().is_empty());
}

#[tokio::test]
async fn test_hydrate() {
    let messages = vec![
        ChatMessage::user("status?"),
        ChatMessage::assistant("objective clear "),
    ];
    let store = MemoryStore::default();
    store::save_transcript(&store, &messages).unwrap();
    let manager = manager_with(scripted([]), store);
    assert_eq!(manager.messages(), messages);
    assert_eq!(manager.subscribe().borrow().messages, messages);

    // A placeholder left by an interrupted session is dropped.
    let store = MemoryStore::default();
    store::save_transcript(
        &store,
        &[ChatMessage::user("hi"), ChatMessage::assistant("")],
    )
    .unwrap();
    let manager = manager_with(scripted([]), store.clone());
    assert_eq!(manager.messages(), [ChatMessage::user("hi")]);
    assert_eq!(
        store::load_transcript(&store).unwrap(),
        [ChatMessage::user("hi")]
    );
}

#[tokio::test]
async fn test_corrupted_snapshot() {
    let store = MemoryStore::with_contents("{ not a transcript");
    let engine = scripted([PresetResponse::with_chunks(["fresh"])]);
    let manager = manager_with(engine, store.clone());
    assert!(manager.messages().is_empty());

    send(&manager, "start over").await;
    assert_eq!(
        store::load_transcript(&store).unwrap(),
        manager.messages()
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel() {
    let mut engine = scripted([PresetResponse::with_chunks(["never"])]);
    engine.set_delay(Duration::from_secs(60));
    let manager = manager_with(engine, MemoryStore::default());

    let mut snapshots = manager.subscribe();
    let cancel = async {
        snapshots.wait_for(|s| s.is_typing).await.unwrap();
        manager.cancel();
    };
    let (outcome, _) = tokio::join!(manager.send_message("wait"), cancel);
    assert_eq!(
        outcome,
        SendOutcome::Failed(SendFailure::Engine(ErrorKind::Cancelled))
    );
    assert_eq!(manager.messages()[1].content, CANCELLED_MESSAGE);
    assert!(!manager.is_typing());
}

#[tokio::test]
async fn test_progress() {
    let builder = ChatManagerBuilder::new();
    let reporter = builder.progress_reporter();
    let manager = builder.build();
    assert_eq!(manager.progress(), None);

    reporter.report(Some(42));
    assert_eq!(manager.progress(), Some(42));
}
