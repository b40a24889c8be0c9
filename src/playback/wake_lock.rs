//! Keeping the machine awake while narrating.

use crate::config::WakeLockMode;
use anyhow::{Context, Result, bail};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// A platform facility that prevents idle sleep while a handle is held.
pub trait WakeLock {
    fn acquire(&mut self) -> Result<Box<dyn WakeLockHandle>>;
}

pub trait WakeLockHandle {
    /// False once the platform has revoked the lock.
    fn is_active(&mut self) -> bool;
    fn release(self: Box<Self>);
}

/// Build the wake lock selected in the configuration.
pub fn system_wake_lock(mode: WakeLockMode) -> Box<dyn WakeLock> {
    match mode {
        WakeLockMode::Disabled => Box::new(NoopWakeLock),
        WakeLockMode::SystemdInhibit => Box::new(InhibitWakeLock::new("novel-narrator")),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&mut self) -> Result<Box<dyn WakeLockHandle>> {
        Ok(Box::new(NoopHandle))
    }
}

struct NoopHandle;

impl WakeLockHandle for NoopHandle {
    fn is_active(&mut self) -> bool {
        true
    }

    fn release(self: Box<Self>) {}
}

/// Holds an idle/sleep inhibitor through `systemd-inhibit` for as long as the
/// spawned child lives.
#[derive(Debug, Clone)]
pub struct InhibitWakeLock {
    who: String,
}

impl InhibitWakeLock {
    pub fn new(who: impl Into<String>) -> Self {
        Self { who: who.into() }
    }
}

impl WakeLock for InhibitWakeLock {
    fn acquire(&mut self) -> Result<Box<dyn WakeLockHandle>> {
        let mut child = Command::new("systemd-inhibit")
            .arg("--what=idle:sleep")
            .arg(format!("--who={}", self.who))
            .arg("--why=Narrating chapter")
            .arg("--mode=block")
            .arg("sleep")
            .arg("infinity")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Spawning systemd-inhibit")?;

        if let Some(status) = child.try_wait().context("Polling systemd-inhibit")? {
            bail!("systemd-inhibit exited immediately with {status}");
        }
        info!(pid = child.id(), "Acquired wake lock");
        Ok(Box::new(InhibitHandle { child }))
    }
}

struct InhibitHandle {
    child: Child,
}

impl WakeLockHandle for InhibitHandle {
    fn is_active(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn release(self: Box<Self>) {
        debug!(pid = self.child.id(), "Releasing wake lock");
        // Dropping kills and reaps the inhibitor.
        drop(self);
    }
}

impl Drop for InhibitHandle {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            debug!("systemd-inhibit already gone: {err}");
        }
        if let Err(err) = self.child.wait() {
            warn!("Failed to reap systemd-inhibit: {err}");
        }
    }
}
