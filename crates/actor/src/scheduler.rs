use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::mailbox::Mailbox;
use crate::{Actor, Message};

/// Runs the message loop of an actor until it is stopped or every handle
/// has been dropped.
pub async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn Message<S>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = stop_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        // Handles are needed by the message handlers, if the last one has
        // gone the pending messages are meaningless.
        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last handle has been dropped, discard the message");
            break;
        };
        trace_span!("proc msg").in_scope(|| {
            msg.handle(&mut state, &Actor::from_mailbox(mailbox));
        });
    }
    debug!("stopped");
}
