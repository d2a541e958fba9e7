// Integration tests for the command watcher, run against the in-memory
// store backend with a recording interpreter.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vmesh_agent::interpreter::{CommandExecutor, CommandInterpreter, ExecutionError};
use vmesh_agent::watcher::{CommandWatcher, WatcherState};
use vmesh_core::{HostCommand, HostId, HostManager, PathBuilder, TopologyManager};
use vmesh_store::{MemoryStore, WatchEvent};

// ── Test doubles ────────────────────────────────────────────────────

/// Interpreter that records every executed action label.
///
/// Payload knobs: `actions` (count, default 1) and `fail_at` (index of
/// the action that fails). Interface `bad-descriptor` fails
/// interpretation itself.
#[derive(Clone, Default)]
struct Recording {
    log: Arc<Mutex<Vec<String>>>,
}

struct Action {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl CommandExecutor for Action {
    fn execute(&mut self) -> Result<(), ExecutionError> {
        self.log.lock().unwrap().push(self.label.clone());
        if self.fail {
            Err(ExecutionError::new(format!("{} failed", self.label)))
        } else {
            Ok(())
        }
    }
}

impl CommandInterpreter for Recording {
    fn interpret(
        &self,
        command: &HostCommand,
    ) -> Result<Vec<Box<dyn CommandExecutor>>, ExecutionError> {
        if command.interface_name == "bad-descriptor" {
            return Err(ExecutionError::new("unknown command type"));
        }
        let count = command
            .payload
            .get("actions")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1);
        let fail_at = command
            .payload
            .get("fail_at")
            .and_then(serde_json::Value::as_u64);

        let mut executors: Vec<Box<dyn CommandExecutor>> = Vec::new();
        for index in 0..count {
            executors.push(Box::new(Action {
                label: format!("{}#{index}", command.interface_name),
                log: Arc::clone(&self.log),
                fail: fail_at == Some(index),
            }));
        }
        Ok(executors)
    }
}

// ── Harness ─────────────────────────────────────────────────────────

async fn setup() -> (Arc<MemoryStore>, PathBuilder, HostId) {
    let store = Arc::new(MemoryStore::new());
    let paths = PathBuilder::default();
    let topology = TopologyManager::new(Arc::clone(&store), paths.clone());
    topology.ensure_base_layout().await.unwrap();

    let host_id = Uuid::new_v4();
    HostManager::new(Arc::clone(&store), paths.clone())
        .register_host(host_id)
        .await
        .unwrap();
    (store, paths, host_id)
}

fn hosts(store: &Arc<MemoryStore>, paths: &PathBuilder) -> HostManager<MemoryStore> {
    HostManager::new(Arc::clone(store), paths.clone())
}

fn watcher(
    store: &Arc<MemoryStore>,
    paths: &PathBuilder,
    host_id: HostId,
) -> (CommandWatcher<MemoryStore, Recording>, Arc<Mutex<Vec<String>>>) {
    let interpreter = Recording::default();
    let log = Arc::clone(&interpreter.log);
    (
        CommandWatcher::new(hosts(store, paths), interpreter, host_id),
        log,
    )
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn initial_batch_then_only_new_commands() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);
    let c1 = admin
        .post_command(host_id, &HostCommand::new("eth0", json!({})))
        .await
        .unwrap();
    let c2 = admin
        .post_command(host_id, &HostCommand::new("eth1", json!({})))
        .await
        .unwrap();
    let c3 = admin
        .post_command(host_id, &HostCommand::new("eth2", json!({})))
        .await
        .unwrap();

    let (mut watcher, log) = watcher(&store, &paths, host_id);
    assert_eq!(watcher.state(), WatcherState::Idle);

    let watch = watcher.start().await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Active);
    assert_eq!(*watcher.executed_ids(), HashSet::from([c1, c2, c3]));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["eth0#0", "eth1#0", "eth2#0"],
        "initial batch runs ascending"
    );

    // A fourth command triggers the armed watch; the re-scan dispatches
    // only the new id, never 1-3 again.
    let c4 = admin
        .post_command(host_id, &HostCommand::new("eth3", json!({})))
        .await
        .unwrap();
    assert!(matches!(
        watch.wait().await,
        WatchEvent::ChildrenChanged { .. }
    ));

    let _watch = watcher.scan().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 4);
    assert_eq!(log.lock().unwrap()[3], "eth3#0");
    assert!(watcher.executed_ids().contains(&c4));
}

#[tokio::test]
async fn failing_executor_logs_one_entry_and_batch_continues() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);
    admin
        .post_command(host_id, &HostCommand::new("eth0", json!({})))
        .await
        .unwrap();
    let flaky = admin
        .post_command(host_id, &HostCommand::new("flaky", json!({"fail_at": 0})))
        .await
        .unwrap();
    let after = admin
        .post_command(host_id, &HostCommand::new("eth2", json!({})))
        .await
        .unwrap();

    let (mut watcher, log) = watcher(&store, &paths, host_id);
    let _watch = watcher.start().await.unwrap();

    let entries = admin.read_error_log(host_id).await.unwrap();
    assert_eq!(entries.len(), 1, "exactly one error entry");
    assert_eq!(entries[0].command_id, flaky);
    assert_eq!(entries[0].interface_name, "flaky");

    // The failure never blocked the sibling that followed it.
    assert!(log.lock().unwrap().contains(&"eth2#0".to_owned()));
    assert!(watcher.executed_ids().contains(&after));
    assert!(watcher.executed_ids().contains(&flaky));
}

#[tokio::test]
async fn interpretation_failure_is_recorded_and_skipped() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);
    let bad = admin
        .post_command(host_id, &HostCommand::new("bad-descriptor", json!({})))
        .await
        .unwrap();
    admin
        .post_command(host_id, &HostCommand::new("eth1", json!({})))
        .await
        .unwrap();

    let (mut watcher, log) = watcher(&store, &paths, host_id);
    let _watch = watcher.start().await.unwrap();

    let entries = admin.read_error_log(host_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].command_id, bad);
    assert!(entries[0].error.contains("unknown command type"));

    // No actions from the bad command, and it still counts as attempted.
    assert_eq!(*log.lock().unwrap(), vec!["eth1#0"]);
    assert!(watcher.executed_ids().contains(&bad));
}

#[tokio::test]
async fn actions_run_in_order_and_survive_mid_failure() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);
    let id = admin
        .post_command(
            host_id,
            &HostCommand::new("multi", json!({"actions": 3, "fail_at": 1})),
        )
        .await
        .unwrap();

    let (mut watcher, log) = watcher(&store, &paths, host_id);
    let _watch = watcher.start().await.unwrap();

    // Interpreter order preserved; the failed middle action does not
    // abort the rest of the command.
    assert_eq!(*log.lock().unwrap(), vec!["multi#0", "multi#1", "multi#2"]);
    let entries = admin.read_error_log(host_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].command_id, id);
}

#[tokio::test]
async fn restart_seeds_executed_set_from_markers() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);
    let c1 = admin
        .post_command(host_id, &HostCommand::new("eth0", json!({})))
        .await
        .unwrap();
    let c2 = admin
        .post_command(host_id, &HostCommand::new("eth1", json!({})))
        .await
        .unwrap();

    {
        let (mut first, log) = watcher(&store, &paths, host_id);
        let _watch = first.start().await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
        // Watcher dropped here: simulated agent restart.
    }

    let (mut second, log) = watcher(&store, &paths, host_id);
    let watch = second.start().await.unwrap();

    // Nothing re-executed: the set was re-derived from markers.
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(*second.executed_ids(), HashSet::from([c1, c2]));

    // New work still flows.
    admin
        .post_command(host_id, &HostCommand::new("eth2", json!({})))
        .await
        .unwrap();
    watch.wait().await;
    let _watch = second.scan().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["eth2#0"]);
}

#[tokio::test]
async fn run_loop_processes_commands_until_cancelled() {
    let (store, paths, host_id) = setup().await;
    let admin = hosts(&store, &paths);

    let (watcher, log) = watcher(&store, &paths, host_id);
    let watcher = watcher.with_rescan_delay(Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(watcher.run(cancel.clone()));

    admin
        .post_command(host_id, &HostCommand::new("eth0", json!({})))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while log.lock().unwrap().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "command was never processed"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    assert_ok!(worker.await.unwrap());
    assert_eq!(*log.lock().unwrap(), vec!["eth0#0"]);
}
