// ── Per-host command bookkeeping ──
//
// The command queue view consumed by the agent-side watcher and the
// administrative side that posts work. Commands are sequential children
// of the host's queue node; the store never deletes them — a command's
// terminal state is its completion marker.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use vmesh_store::{ChildWatch, ConfigStore, StoreError};

use crate::codec;
use crate::error::TopologyError;
use crate::model::{CommandId, ErrorLogEntry, HostCommand, HostId};
use crate::paths::{COMMAND_PREFIX, PathBuilder};

/// Store-side bookkeeping for one-or-more hosts' command queues.
pub struct HostManager<S> {
    store: Arc<S>,
    paths: PathBuilder,
}

impl<S: ConfigStore> HostManager<S> {
    pub fn new(store: Arc<S>, paths: PathBuilder) -> Self {
        Self { store, paths }
    }

    pub fn paths(&self) -> &PathBuilder {
        &self.paths
    }

    /// Create the host's root and its commands/errors/executed
    /// containers. Idempotent.
    pub async fn register_host(&self, host_id: HostId) -> Result<(), TopologyError> {
        let containers = [
            self.paths.host(host_id),
            self.paths.host_commands(host_id),
            self.paths.host_errors(host_id),
            self.paths.host_executed(host_id),
        ];
        for path in containers {
            match self.store.create(&path, Vec::new()).await {
                Ok(()) | Err(StoreError::NodeExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Queue a command for `host_id` and return its minted id.
    ///
    /// This is the administrative write path; the host's watcher picks
    /// the command up through its child watch.
    pub async fn post_command(
        &self,
        host_id: HostId,
        command: &HostCommand,
    ) -> Result<CommandId, TopologyError> {
        let data = codec::encode(command, "HostCommand")?;
        let id = self
            .store
            .create_sequential(&self.paths.host_commands(host_id), COMMAND_PREFIX, data)
            .await?;
        debug!(host = %host_id, command = id, interface = %command.interface_name, "command queued");
        Ok(id)
    }

    /// Current command ids in the host's queue, ascending.
    pub async fn list_commands(&self, host_id: HostId) -> Result<Vec<CommandId>, TopologyError> {
        let names = self
            .store
            .children(&self.paths.host_commands(host_id))
            .await?;
        Ok(parse_command_ids(&names))
    }

    /// Enumerate the queue and arm a one-shot child watch in one call,
    /// so no command posted in between can be missed.
    pub async fn list_commands_and_watch(
        &self,
        host_id: HostId,
    ) -> Result<(Vec<CommandId>, ChildWatch), TopologyError> {
        let (names, watch) = self
            .store
            .children_and_watch(&self.paths.host_commands(host_id))
            .await?;
        Ok((parse_command_ids(&names), watch))
    }

    pub async fn get_command(
        &self,
        host_id: HostId,
        command_id: CommandId,
    ) -> Result<HostCommand, TopologyError> {
        let node = self
            .store
            .get(&self.paths.host_command(host_id, command_id))
            .await?;
        codec::decode(&node.data, "HostCommand")
    }

    /// Write an execution failure back into the store. Re-logging the
    /// same command overwrites the previous entry (last failure wins).
    pub async fn log_command_error(
        &self,
        host_id: HostId,
        entry: &ErrorLogEntry,
    ) -> Result<(), TopologyError> {
        let path = self.paths.host_error(host_id, entry.command_id);
        let data = codec::encode(entry, "ErrorLogEntry")?;
        match self.store.create(&path, data.clone()).await {
            Ok(()) => Ok(()),
            Err(StoreError::NodeExists { .. }) => Ok(self.store.set_data(&path, data).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// All error entries recorded for a host, ascending by command id.
    pub async fn read_error_log(
        &self,
        host_id: HostId,
    ) -> Result<Vec<ErrorLogEntry>, TopologyError> {
        let names = self.store.children(&self.paths.host_errors(host_id)).await?;
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let path = format!("{}/{name}", self.paths.host_errors(host_id));
            let node = self.store.get(&path).await?;
            entries.push(codec::decode(&node.data, "ErrorLogEntry")?);
        }
        Ok(entries)
    }

    /// Persist a completion marker for an attempted command. Idempotent.
    pub async fn mark_executed(
        &self,
        host_id: HostId,
        command_id: CommandId,
    ) -> Result<(), TopologyError> {
        let path = self.paths.host_executed_entry(host_id, command_id);
        match self.store.create(&path, Vec::new()).await {
            Ok(()) | Err(StoreError::NodeExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every command whose execution attempt has completed.
    /// Seeds the watcher's executed set across restarts.
    pub async fn executed_commands(
        &self,
        host_id: HostId,
    ) -> Result<BTreeSet<CommandId>, TopologyError> {
        let names = self
            .store
            .children(&self.paths.host_executed(host_id))
            .await?;
        Ok(names
            .iter()
            .filter_map(|name| name.parse::<CommandId>().ok())
            .collect())
    }
}

/// Sequential command node names (`cmd0000000012`) to sorted ids.
fn parse_command_ids(names: &[String]) -> Vec<CommandId> {
    let mut ids: Vec<CommandId> = names
        .iter()
        .filter_map(|name| name.strip_prefix(COMMAND_PREFIX)?.parse().ok())
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use vmesh_store::MemoryStore;

    async fn manager() -> (HostManager<MemoryStore>, HostId) {
        let store = Arc::new(MemoryStore::new());
        let paths = PathBuilder::default();
        for path in paths.base_paths() {
            store.create(&path, Vec::new()).await.unwrap();
        }
        let hosts = HostManager::new(store, paths);
        let host_id = Uuid::new_v4();
        hosts.register_host(host_id).await.unwrap();
        (hosts, host_id)
    }

    #[tokio::test]
    async fn register_host_is_idempotent() {
        let (hosts, host_id) = manager().await;
        hosts.register_host(host_id).await.unwrap();
    }

    #[tokio::test]
    async fn posted_commands_round_trip_in_order() {
        let (hosts, host_id) = manager().await;
        let first = hosts
            .post_command(host_id, &HostCommand::new("eth0", json!({"op": "up"})))
            .await
            .unwrap();
        let second = hosts
            .post_command(host_id, &HostCommand::new("eth1", json!({"op": "down"})))
            .await
            .unwrap();
        assert!(first < second);

        assert_eq!(
            hosts.list_commands(host_id).await.unwrap(),
            vec![first, second]
        );
        let cmd = hosts.get_command(host_id, first).await.unwrap();
        assert_eq!(cmd.interface_name, "eth0");
    }

    #[tokio::test]
    async fn error_log_last_write_wins() {
        let (hosts, host_id) = manager().await;
        hosts
            .log_command_error(host_id, &ErrorLogEntry::new(7, "eth0", "first failure"))
            .await
            .unwrap();
        hosts
            .log_command_error(host_id, &ErrorLogEntry::new(7, "eth0", "second failure"))
            .await
            .unwrap();

        let entries = hosts.read_error_log(host_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command_id, 7);
        assert_eq!(entries[0].error, "second failure");
    }

    #[tokio::test]
    async fn completion_markers_accumulate() {
        let (hosts, host_id) = manager().await;
        hosts.mark_executed(host_id, 1).await.unwrap();
        hosts.mark_executed(host_id, 3).await.unwrap();
        hosts.mark_executed(host_id, 3).await.unwrap();

        let executed = hosts.executed_commands(host_id).await.unwrap();
        assert_eq!(executed.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }
}
