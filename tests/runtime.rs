//! Machine actor driven by tokio's paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sheetcycle::{
    Event, EventKind, ExecuteRequest, MachineBuilder, MachineState, Message, SchedulerConfig,
    ScriptSheet, Subscribe, TriggerConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counter(name: &str) -> ScriptSheet {
    ScriptSheet::new(name).on_step(|s| {
        let v = s.cell("A1");
        s.set_cell("A1", v + 1.0);
        Ok(())
    })
}

#[derive(Default)]
struct StepCounter {
    steps: AtomicU64,
    returns: AtomicU64,
}

#[async_trait]
impl Subscribe for StepCounter {
    async fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::StepCompleted => {
                self.steps.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::RepeatFinished => {
                self.returns.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "step-counter"
    }
}

#[tokio::test(start_paused = true)]
async fn test_continuous_sheet_follows_cycle_time() {
    init_tracing();
    let handle = MachineBuilder::new(SchedulerConfig::default())
        .with_sheet(counter("S1"), TriggerConfig::continuous())
        .spawn()
        .expect("spawn");

    assert_eq!(handle.start().await.expect("start"), MachineState::Running);
    tokio::time::sleep(Duration::from_millis(350)).await;

    let snap = handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.sheets[0].stats.steps, 4);

    assert_eq!(handle.pause().await.expect("pause"), MachineState::Paused);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.step().await.expect("step"), MachineState::Paused);
    let snap = handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.sheets[0].stats.steps, 5);

    assert_eq!(handle.stop().await.expect("stop"), MachineState::Stopped);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_receive_events() {
    init_tracing();
    let counter_sub = Arc::new(StepCounter::default());
    let handle = MachineBuilder::new(SchedulerConfig::default())
        .with_subscribers(vec![counter_sub.clone() as Arc<dyn Subscribe>])
        .with_sheet(counter("S1"), TriggerConfig::continuous())
        .spawn()
        .expect("spawn");

    handle.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.stop().await.expect("stop");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(counter_sub.steps.load(Ordering::Relaxed), 3);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_messages_and_execute_through_the_handle() {
    init_tracing();
    let handle = MachineBuilder::new(SchedulerConfig::default())
        .with_sheet(
            ScriptSheet::new("IN").on_step(|s| {
                if s.message().is_some() {
                    s.execute(ExecuteRequest::new("WORK", 3).paced(true));
                }
                Ok(())
            }),
            TriggerConfig::arrival(),
        )
        .with_sheet(counter("WORK"), TriggerConfig::execute())
        .spawn()
        .expect("spawn");

    handle.start().await.expect("start");
    handle
        .post_message("IN", Message::new(json!({"job": 1})))
        .await
        .expect("post");
    handle.tasks_done().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snap = handle.snapshot().await.expect("snapshot");
    let work = snap
        .sheets
        .iter()
        .find(|s| s.name == "WORK")
        .expect("WORK");
    let input = snap.sheets.iter().find(|s| s.name == "IN").expect("IN");
    assert_eq!(work.stats.executesteps, 3);
    assert!(!input.paused);
    assert_eq!(input.stats.steps, 1);

    let machine = handle.shutdown().await.expect("shutdown");
    assert_eq!(machine.state(), MachineState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_set_trigger_through_the_handle() {
    init_tracing();
    let handle = MachineBuilder::new(SchedulerConfig::default())
        .with_sheet(counter("S1"), TriggerConfig::arrival())
        .spawn()
        .expect("spawn");
    handle.start().await.expect("start");

    handle
        .set_trigger("S1", TriggerConfig::time(Duration::from_millis(50)))
        .await
        .expect("set trigger");
    tokio::time::sleep(Duration::from_millis(120)).await;
    let snap = handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.sheets[0].stats.steps, 3);

    let err = handle
        .set_trigger("nope", TriggerConfig::continuous())
        .await
        .expect_err("unknown sheet");
    assert_eq!(err.as_label(), "machine_unknown_sheet");
    handle.shutdown().await.expect("shutdown");
}
