//! Generic mailbox/handle pair for the per-component actor model (spec §5, §9).
//!
//! Grounded on the same shape as a session actor: a cloneable `Handle` wrapping an
//! `mpsc::UnboundedSender`, and a single task reading from the matching receiver until every
//! handle is dropped. Each component (Manager, Supervisor, Guard, Classifier, Router, Agent)
//! is one such task: it processes one message to completion before taking the next, so no
//! internal locking is required for the state that task exclusively owns.

use tokio::sync::mpsc;

/// A cloneable reference to a running actor's mailbox. Sending never blocks the caller on the
/// actor's own processing (the channel is unbounded) — callers observe serialization only
/// through reply channels embedded in request messages ("ask" pattern).
pub struct Handle<M> {
    tx: mpsc::UnboundedSender<M>,
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<M> Handle<M> {
    /// Fire-and-forget send. Fails only if the actor's task has already exited.
    pub fn tell(&self, msg: M) -> Result<(), crate::error::CoreError> {
        self.tx
            .send(msg)
            .map_err(|_| crate::error::CoreError::Invariant("actor mailbox closed".to_string()))
    }
}

/// The receiving half of a mailbox; owned by the task that runs the actor loop.
pub struct Mailbox<M> {
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> Mailbox<M> {
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }
}

/// Creates a fresh mailbox and its handle.
pub fn mailbox<M>() -> (Handle<M>, Mailbox<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Handle { tx }, Mailbox { rx })
}

/// Performs a request/reply "ask" over a mailbox: builds the request with a fresh oneshot
/// reply sender, sends it, and awaits the reply. Used for synchronous-feeling calls like
/// `GuardCheckRequest` → reply, while the callee remains a single-consumer actor.
pub async fn ask<M, R>(
    handle: &Handle<M>,
    build: impl FnOnce(tokio::sync::oneshot::Sender<R>) -> M,
) -> Result<R, crate::error::CoreError> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    handle.tell(build(reply_tx))?;
    reply_rx
        .await
        .map_err(|_| crate::error::CoreError::Invariant("actor dropped reply sender".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Echo {
        Ping(tokio::sync::oneshot::Sender<u32>),
    }

    #[tokio::test]
    async fn ask_round_trips_through_an_actor_loop() {
        let (handle, mut mb) = mailbox::<Echo>();
        tokio::spawn(async move {
            while let Some(Echo::Ping(reply)) = mb.recv().await {
                let _ = reply.send(42);
            }
        });
        let got = ask(&handle, Echo::Ping).await.unwrap();
        assert_eq!(got, 42);
    }

    #[tokio::test]
    async fn tell_fails_once_actor_task_has_exited() {
        let (handle, mb) = mailbox::<Echo>();
        drop(mb);
        let (tx, _rx) = tokio::sync::oneshot::channel();
        assert!(handle.tell(Echo::Ping(tx)).is_err());
    }
}
