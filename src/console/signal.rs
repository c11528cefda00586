use std::future::Future;

/// Fires when the user asks for a settings reload (SIGHUP on unix).
#[cfg(unix)]
pub struct ReloadSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ReloadSignal {
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    pub async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
pub struct ReloadSignal;

#[cfg(not(unix))]
impl ReloadSignal {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

/// Drive `task` to completion while still serving settings reloads.
/// Returns `None` if `interrupt` fires first; the task is dropped then.
pub async fn run_interruptible<T>(
    task: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
    reload: &mut ReloadSignal,
    mut on_reload: impl FnMut(),
) -> Option<T> {
    tokio::pin!(task);
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            value = &mut task => return Some(value),
            _ = &mut interrupt => return None,
            _ = reload.recv() => on_reload(),
        }
    }
}
