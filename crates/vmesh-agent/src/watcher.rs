// ── Command watcher state machine ──
//
// One instance per host identity. The store's child watches are
// one-shot, so the invariant that keeps delivery alive is: every
// enumeration arms the next watch in the same call, BEFORE any command
// from the batch is processed. A missed re-arm silently stops future
// delivery — that is a correctness bug, not a performance one.
//
// The executed set is seeded from persisted completion markers on
// start, so an agent restart re-derives what already ran instead of
// re-executing the whole queue.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vmesh_core::{CommandId, ErrorLogEntry, HostId, HostManager};
use vmesh_store::{ChildWatch, ConfigStore, WatchEvent};

use crate::error::AgentError;
use crate::interpreter::{CommandExecutor as _, CommandInterpreter};

const DEFAULT_RESCAN_DELAY: Duration = Duration::from_secs(5);

/// Watcher lifecycle. There is no terminal state: the watcher lives for
/// the host process; cancellation is the only way out of `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Active,
}

/// Watches one host's command queue and dispatches new commands.
pub struct CommandWatcher<S, I> {
    hosts: HostManager<S>,
    interpreter: I,
    host_id: HostId,
    executed: HashSet<CommandId>,
    state: WatcherState,
    rescan_delay: Duration,
}

impl<S: ConfigStore, I: CommandInterpreter> CommandWatcher<S, I> {
    pub fn new(hosts: HostManager<S>, interpreter: I, host_id: HostId) -> Self {
        Self {
            hosts,
            interpreter,
            host_id,
            executed: HashSet::new(),
            state: WatcherState::Idle,
            rescan_delay: DEFAULT_RESCAN_DELAY,
        }
    }

    /// Delay before re-entering enumeration after a lost watch or a
    /// transient store failure.
    pub fn with_rescan_delay(mut self, delay: Duration) -> Self {
        self.rescan_delay = delay;
        self
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Commands whose execution attempt has completed, successful or not.
    pub fn executed_ids(&self) -> &HashSet<CommandId> {
        &self.executed
    }

    /// Seed the executed set from persisted completion markers, process
    /// the queue's current contents, and transition to Active. Returns
    /// the armed watch for the run loop.
    pub async fn start(&mut self) -> Result<ChildWatch, AgentError> {
        let seeded = self.hosts.executed_commands(self.host_id).await?;
        debug!(
            host = %self.host_id,
            seeded = seeded.len(),
            "executed set seeded from completion markers"
        );
        self.executed = seeded.into_iter().collect();

        let watch = self.scan().await?;
        self.state = WatcherState::Active;
        Ok(watch)
    }

    /// Re-enumerate the queue — arming the next watch in the same call —
    /// then dispatch everything not yet in the executed set, ascending.
    pub async fn scan(&mut self) -> Result<ChildWatch, AgentError> {
        let (current, watch) = self.hosts.list_commands_and_watch(self.host_id).await?;

        let new: Vec<CommandId> = current
            .into_iter()
            .filter(|id| !self.executed.contains(id))
            .collect();
        if !new.is_empty() {
            debug!(host = %self.host_id, count = new.len(), "dispatching new commands");
        }

        for id in new {
            self.dispatch(id).await;

            // The attempt is over (success or failure): persist the
            // marker, then remember it. Marker write failure only costs
            // a possible re-execution after restart.
            if let Err(e) = self.hosts.mark_executed(self.host_id, id).await {
                warn!(command = id, error = %e, "could not persist completion marker");
            }
            self.executed.insert(id);
        }
        Ok(watch)
    }

    /// Run until cancelled. Startup failures are fatal; once active,
    /// transient store failures and lost watches re-enter enumeration
    /// after the rescan delay.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), AgentError> {
        let mut watch = self.start().await?;
        info!(host = %self.host_id, "command watcher active");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(host = %self.host_id, "command watcher shutting down");
                    return Ok(());
                }
                event = watch.wait() => {
                    if matches!(event, WatchEvent::Lost) {
                        warn!(host = %self.host_id, "command watch lost; re-arming after delay");
                        tokio::time::sleep(self.rescan_delay).await;
                    }
                    watch = loop {
                        match self.scan().await {
                            Ok(w) => break w,
                            Err(e) if e.is_retryable() => {
                                warn!(error = %e, "queue re-scan failed; retrying");
                                tokio::time::sleep(self.rescan_delay).await;
                            }
                            Err(e) => return Err(e),
                        }
                    };
                }
            }
        }
    }

    /// Interpret one command and run its actions in order. Every
    /// failure — unreadable descriptor, interpretation, individual
    /// action — is recorded and never propagates: sibling commands in
    /// the batch must still run.
    async fn dispatch(&self, id: CommandId) {
        let command = match self.hosts.get_command(self.host_id, id).await {
            Ok(command) => command,
            Err(e) => {
                warn!(command = id, error = %e, "could not read command descriptor");
                self.record_failure(id, "", &format!("unreadable command: {e}"))
                    .await;
                return;
            }
        };

        let executors = match self.interpreter.interpret(&command) {
            Ok(executors) => executors,
            Err(e) => {
                warn!(
                    command = id,
                    interface = %command.interface_name,
                    error = %e,
                    "command interpretation failed"
                );
                self.record_failure(id, &command.interface_name, &e.message)
                    .await;
                return;
            }
        };

        for (index, mut executor) in executors.into_iter().enumerate() {
            if let Err(e) = executor.execute() {
                warn!(
                    command = id,
                    action = index,
                    interface = %command.interface_name,
                    error = %e,
                    "command action failed"
                );
                self.record_failure(id, &command.interface_name, &e.message)
                    .await;
            }
        }
    }

    async fn record_failure(&self, id: CommandId, interface: &str, message: &str) {
        let entry = ErrorLogEntry::new(id, interface, message);
        if let Err(e) = self.hosts.log_command_error(self.host_id, &entry).await {
            // The agent must keep serving the queue even when the error
            // sink is unavailable; this failure stays local.
            warn!(command = id, error = %e, "could not write error log entry");
        }
    }
}
