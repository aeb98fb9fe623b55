//! A lightweight actor framework.
//!
//! An actor owns its state exclusively and handles one message at a time,
//! so the state never needs a lock.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u32,
    }

    #[derive(Debug)]
    struct Add(u32);

    impl Message<Counter> for Add {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            state.value += self.0;
        }
    }

    #[derive(Debug)]
    struct AddTwiceLater(u32);

    impl Message<Counter> for AddTwiceLater {
        fn handle(self, state: &mut Counter, handle: &Actor<Counter>) {
            state.value += self.0;
            // Messages sent from a handler are queued behind the current one.
            handle.send(Add(self.0)).unwrap();
        }
    }

    #[derive(Debug)]
    struct Get(oneshot::Sender<u32>);

    impl Message<Counter> for Get {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            self.0.send(state.value).unwrap();
        }
    }

    #[tokio::test]
    async fn test_send_message() {
        let actor = Actor::spawn(Counter::default(), None);
        actor.send(Add(40)).unwrap();
        actor.send(AddTwiceLater(1)).unwrap();

        let (tx, rx) = oneshot::channel();
        actor.send(Get(tx)).unwrap();
        assert_eq!(rx.await.unwrap(), 41);
        assert_eq!(actor.call(|state, _| state.value).await, Ok(42));
    }

    #[tokio::test]
    async fn test_stop() {
        let actor = Actor::spawn(Counter::default(), Some("counter"));
        actor.stop();
        let result = timeout(
            Duration::from_millis(500),
            actor.call(|state, _| state.value),
        )
        .await
        .unwrap();
        assert_eq!(result, Err(ActorDeadError));
    }
}
