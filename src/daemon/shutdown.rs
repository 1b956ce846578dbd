use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub mod util;

/// Handed to every task that has to stop when the daemon does.
///
/// dropping all handles is what [`Shutdown::wait_for_completion`] waits for
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    #[allow(unused)]
    inner: mpsc::Sender<()>,
    listener: watch::Receiver<bool>,
    trigger: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// resolves once shutdown has been triggered, immedietally if that already happened
    pub async fn wait_for_shutdown(&mut self) {
        // the sender lives as long as this handle does, so this can not fail
        let _ = self.listener.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.listener.borrow()
    }

    pub fn trigger_shutdown(&self) {
        self.trigger.send_replace(true);
    }
}

pub struct Shutdown {
    tx: Option<mpsc::Sender<()>>,
    rx: mpsc::Receiver<()>,
    trigger: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        let (trigger, _) = watch::channel(false);
        Self {
            tx: Some(tx),
            rx,
            trigger: Arc::new(trigger),
        }
    }

    /// # Panics
    /// if called after [`Shutdown::wait_for_completion`]
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            inner: self
                .tx
                .clone()
                .expect("shutdown handle requested after waiting for completion"),
            listener: self.trigger.subscribe(),
            trigger: self.trigger.clone(),
        }
    }

    /// waits for every handle to be dropped
    pub async fn wait_for_completion(&mut self) {
        drop(self.tx.take());
        self.rx.recv().await;
    }

    pub fn trigger_shutdown(&self) {
        self.trigger.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn trigger_is_sticky() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.handle();
        let mut b = shutdown.handle();
        assert!(!a.is_triggered());
        shutdown.trigger_shutdown();
        a.wait_for_shutdown().await;
        // waiting a second time (or on another handle) must not hang
        a.wait_for_shutdown().await;
        b.wait_for_shutdown().await;
        assert!(b.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_can_trigger() {
        let shutdown = Shutdown::new();
        let a = shutdown.handle();
        let mut b = shutdown.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            a.trigger_shutdown();
        });
        tokio::time::timeout(Duration::from_secs(5), b.wait_for_shutdown())
            .await
            .expect("shutdown was not observed");
    }

    #[tokio::test(start_paused = true)]
    async fn completion_waits_for_handles() {
        let mut shutdown = Shutdown::new();
        let mut handle = shutdown.handle();
        let task = tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        shutdown.trigger_shutdown();
        shutdown.wait_for_completion().await;
        assert!(task.is_finished() || task.await.is_ok());
    }
}
