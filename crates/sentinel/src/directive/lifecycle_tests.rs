// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;

use super::{DirectiveManager, LifecycleTiming};
use crate::connection::ConnectionHandle;
use crate::directive::{DirectiveRequest, DirectiveStatus, ReportedStatus};
use crate::error::{DispatchError, TransitionError, ValidationError};
use crate::events::BroadcastHub;
use crate::registry::{AgentRegistry, ReRegisterPolicy, Registration};
use crate::stake::{StakeLedger, StakePolicy};

const TIMEOUT: Duration = Duration::from_secs(60);

struct Fixture {
    manager: Arc<DirectiveManager>,
    registry: Arc<AgentRegistry>,
    hub: Arc<BroadcastHub>,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(StakeLedger::new(StakePolicy::default()));
    let hub = Arc::new(BroadcastHub::new(Duration::from_millis(50)));
    // Agents are not observers here so their queues only carry directives.
    let registry = Arc::new(AgentRegistry::new(
        ledger,
        Arc::clone(&hub),
        ReRegisterPolicy::Replace,
        false,
    ));
    let timing = LifecycleTiming {
        timeout: TIMEOUT,
        retention: Duration::from_secs(3600),
        send_timeout: Duration::from_millis(50),
    };
    let manager =
        Arc::new(DirectiveManager::new(Arc::clone(&registry), Arc::clone(&hub), timing));
    Fixture { manager, registry, hub }
}

async fn connect(f: &Fixture, id: &str) -> anyhow::Result<mpsc::Receiver<String>> {
    let (handle, rx) = ConnectionHandle::new(16);
    f.registry
        .register(Registration {
            agent_id: id.to_owned(),
            handle,
            stake: 10_000,
            capabilities: vec![],
        })
        .await?;
    Ok(rx)
}

fn observer(f: &Fixture) -> mpsc::Receiver<String> {
    let (handle, rx) = ConnectionHandle::new(64);
    f.hub.attach(handle);
    rx
}

fn updates(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text) {
            if v["type"] == "directive_update" {
                out.push(v);
            }
        }
    }
    out
}

fn request(agent: &str) -> DirectiveRequest {
    DirectiveRequest::new(agent, "Optimize GPU", json!({"priority": "high"}))
}

#[tokio::test]
async fn dispatch_delivers_to_target_and_goes_in_progress() -> anyhow::Result<()> {
    let f = fixture();
    let mut agent_rx = connect(&f, "A").await?;
    let mut obs = observer(&f);

    let d = f.manager.create_and_dispatch(request("A")).await?;
    assert_eq!(d.status, DirectiveStatus::InProgress);
    assert!(d.id.starts_with("directive_"));

    let msg: serde_json::Value = serde_json::from_str(&agent_rx.try_recv()?)?;
    assert_eq!(msg["action"], "directive");
    assert_eq!(msg["directive_id"], d.id.as_str());
    assert_eq!(msg["task"], "Optimize GPU");
    assert_eq!(msg["payload"]["priority"], "high");

    let events = updates(&mut obs);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["directive"]["status"], "in-progress");
    assert_eq!(f.manager.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_agent_is_not_retained() {
    let f = fixture();
    let err = f.manager.create_and_dispatch(request("nobody")).await;
    assert!(matches!(err, Err(DispatchError::AgentUnreachable(ref a)) if a == "nobody"));
    assert!(f.manager.is_empty().await);
}

#[tokio::test]
async fn invalid_request_is_not_retained() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let req = DirectiveRequest { agent_id: Some("A".to_owned()), task: None, payload: Some(json!({})) };
    let err = f.manager.create_and_dispatch(req).await;
    assert_eq!(err.map(|d| d.id), Err(DispatchError::Validation(ValidationError::MissingField("task"))));
    assert!(f.manager.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_is_not_retained() -> anyhow::Result<()> {
    let f = fixture();
    let agent_rx = connect(&f, "A").await?;
    // Receiver gone but the session is still registered.
    drop(agent_rx);
    let err = f.manager.create_and_dispatch(request("A")).await;
    assert!(matches!(err, Err(DispatchError::AgentUnreachable(_)) | Err(DispatchError::Transport { .. })));
    assert!(f.manager.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn completion_reaches_every_observer_once() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let mut early = observer(&f);
    let (gone, mut gone_rx) = ConnectionHandle::new(64);
    let gone_id = gone.id();
    f.hub.attach(gone);

    let d1 = f.manager.create_and_dispatch(request("A")).await?;
    assert!(f.hub.detach(gone_id));
    let mut late = observer(&f);
    updates(&mut early);
    updates(&mut gone_rx);

    let done = f.manager.report("A", &d1.id, ReportedStatus::Completed).await?;
    assert_eq!(done.status, DirectiveStatus::Completed);
    assert!(updates(&mut gone_rx).is_empty());

    for rx in [&mut early, &mut late] {
        let events = updates(rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["directive"]["status"], "completed");
        assert_eq!(events[0]["directive"]["id"], d1.id.as_str());
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_completion_is_stale() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let d = f.manager.create_and_dispatch(request("A")).await?;
    f.manager.report("A", &d.id, ReportedStatus::Completed).await?;

    let err = f.manager.report("A", &d.id, ReportedStatus::Failed).await;
    assert_eq!(
        err.map(|d| d.status),
        Err(TransitionError::StaleTransition { id: d.id.clone(), current: DirectiveStatus::Completed })
    );
    let stored = f.manager.get(&d.id).await.map(|d| d.status);
    assert_eq!(stored, Some(DirectiveStatus::Completed));
    Ok(())
}

#[tokio::test]
async fn unknown_directive_is_rejected() {
    let f = fixture();
    let err = f.manager.report("A", "directive_missing", ReportedStatus::Completed).await;
    assert_eq!(err.map(|d| d.id), Err(TransitionError::UnknownDirective("directive_missing".to_owned())));
}

#[tokio::test]
async fn only_the_target_may_report() -> anyhow::Result<()> {
    let f = fixture();
    let _a = connect(&f, "A").await?;
    let _b = connect(&f, "B").await?;
    let d = f.manager.create_and_dispatch(request("A")).await?;

    let err = f.manager.report("B", &d.id, ReportedStatus::Completed).await;
    assert!(matches!(err, Err(TransitionError::UnknownDirective(_))));
    let stored = f.manager.get(&d.id).await.map(|d| d.status);
    assert_eq!(stored, Some(DirectiveStatus::InProgress));
    Ok(())
}

#[tokio::test]
async fn sweep_times_out_and_late_report_is_stale() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let mut obs = observer(&f);
    let d2 = f.manager.create_and_dispatch(request("A")).await?;
    updates(&mut obs);

    // Before the deadline nothing happens.
    let early = f.manager.sweep(Instant::now()).await;
    assert!(early.timed_out.is_empty());

    let outcome = f.manager.sweep(Instant::now() + TIMEOUT).await;
    assert_eq!(outcome.timed_out, vec![d2.id.clone()]);
    let events = updates(&mut obs);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["directive"]["status"], "timed-out");

    let err = f.manager.report("A", &d2.id, ReportedStatus::Completed).await;
    assert!(matches!(
        err,
        Err(TransitionError::StaleTransition { current: DirectiveStatus::TimedOut, .. })
    ));
    let stored = f.manager.get(&d2.id).await.map(|d| d.status);
    assert_eq!(stored, Some(DirectiveStatus::TimedOut));
    Ok(())
}

#[tokio::test]
async fn sweep_leaves_finished_directives_alone() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let d = f.manager.create_and_dispatch(request("A")).await?;
    f.manager.report("A", &d.id, ReportedStatus::Failed).await?;

    let outcome = f.manager.sweep(Instant::now() + TIMEOUT).await;
    assert!(outcome.timed_out.is_empty());
    assert_eq!(outcome.pruned, 0);
    let stored = f.manager.get(&d.id).await.map(|d| d.status);
    assert_eq!(stored, Some(DirectiveStatus::Failed));
    Ok(())
}

#[tokio::test]
async fn retention_prunes_terminal_directives() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let done = f.manager.create_and_dispatch(request("A")).await?;
    let open = f.manager.create_and_dispatch(request("A")).await?;
    f.manager.report("A", &done.id, ReportedStatus::Completed).await?;

    let far = Instant::now() + Duration::from_secs(7200);
    // First pass times out `open`; second prunes both once retention passes.
    let first = f.manager.sweep(far).await;
    assert_eq!(first.timed_out, vec![open.id.clone()]);
    assert_eq!(first.pruned, 1);
    assert!(f.manager.get(&done.id).await.is_none());

    let second = f.manager.sweep(far + Duration::from_secs(7200)).await;
    assert_eq!(second.pruned, 1);
    assert!(f.manager.is_empty().await);

    let err = f.manager.report("A", &done.id, ReportedStatus::Completed).await;
    assert!(matches!(err, Err(TransitionError::UnknownDirective(_))));
    Ok(())
}

#[tokio::test]
async fn report_and_sweep_race_has_one_winner() -> anyhow::Result<()> {
    for _ in 0..20 {
        let f = fixture();
        let _agent_rx = connect(&f, "A").await?;
        let d = f.manager.create_and_dispatch(request("A")).await?;

        let reporter = {
            let manager = Arc::clone(&f.manager);
            let id = d.id.clone();
            tokio::spawn(async move { manager.report("A", &id, ReportedStatus::Completed).await })
        };
        let sweeper = {
            let manager = Arc::clone(&f.manager);
            tokio::spawn(async move { manager.sweep(Instant::now() + TIMEOUT).await })
        };

        let report = reporter.await?;
        let sweep = sweeper.await?;
        let stored = f.manager.get(&d.id).await.map(|d| d.status);

        match report {
            Ok(_) => {
                assert!(sweep.timed_out.is_empty());
                assert_eq!(stored, Some(DirectiveStatus::Completed));
            }
            Err(TransitionError::StaleTransition { current, .. }) => {
                assert_eq!(current, DirectiveStatus::TimedOut);
                assert_eq!(sweep.timed_out, vec![d.id.clone()]);
                assert_eq!(stored, Some(DirectiveStatus::TimedOut));
            }
            Err(other) => anyhow::bail!("unexpected report error: {other}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn list_preserves_creation_order() -> anyhow::Result<()> {
    let f = fixture();
    let _agent_rx = connect(&f, "A").await?;
    let a = f.manager.create_and_dispatch(request("A")).await?;
    let b = f.manager.create_and_dispatch(request("A")).await?;

    let ids: Vec<String> = f.manager.list().await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    Ok(())
}
