use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::Instrument;

use crate::mailbox::{FnMessage, Mailbox, MailboxParts};
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message};

/// Handle to an actor.
///
/// The actor keeps running as long as any handle is alive, or until it is
/// stopped explicitly.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// This must be called within a Tokio runtime.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            stop_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, stop_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.send(Box::new(msg))
    }

    /// Runs `f` against the actor's state, in order with the other
    /// messages, and returns its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R, ActorDeadError>
    where
        R: Send + 'static,
        F: FnOnce(&mut S, &Actor<S>) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(FnMessage(move |state: &mut S, handle: &Actor<S>| {
            reply_tx.send(f(state, handle)).ok();
        }))?;
        reply_rx.await.map_err(|_| ActorDeadError)
    }

    /// Attempts to stop the actor.
    ///
    /// The actor is not guaranteed to be stopped immediately, but it
    /// will stop handling further messages and quit soon.
    #[inline]
    pub fn stop(&self) {
        self.mailbox.stop();
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
