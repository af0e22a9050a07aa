//! End-to-end scheduling scenarios on the synchronous machine.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;
use sheetcycle::{
    Event, EventKind, ExecuteRequest, Machine, MachineBuilder, MachineState, Message,
    SchedulerConfig, ScriptSheet, SheetId, StreamSheet, TriggerConfig,
};
use tokio::sync::broadcast;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn counter(name: &str) -> ScriptSheet {
    ScriptSheet::new(name).on_step(|s| {
        let v = s.cell("A1");
        s.set_cell("A1", v + 1.0);
        Ok(())
    })
}

/// Increments A1 every pass and returns whenever A1 is a multiple of `every`.
fn returning(name: &str, every: f64) -> ScriptSheet {
    ScriptSheet::new(name).on_step(move |s| {
        let v = s.cell("A1") + 1.0;
        s.set_cell("A1", v);
        if v % every == 0.0 {
            s.ret();
        }
        Ok(())
    })
}

fn id(machine: &Machine, name: &str) -> SheetId {
    machine.sheet_id(name).expect("sheet registered")
}

fn steps(machine: &Machine, name: &str) -> u64 {
    machine.stats(id(machine, name)).map_or(0, |s| s.steps)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        bus_capacity: 4096,
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_manual_steps_on_stopped_machine() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(counter("S1").with_cell("A1", 1.0), TriggerConfig::continuous())
        .build()
        .expect("build");

    for _ in 0..3 {
        assert_eq!(m.step(), MachineState::Stopped);
    }
    assert_eq!(steps(&m, "S1"), 3);
    assert_eq!(m.pending_timers(id(&m, "S1")), 0);

    m.advance(Duration::from_secs(10));
    assert_eq!(steps(&m, "S1"), 3);
}

#[test]
fn test_endless_step_counts_one_logical_step_per_return() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(returning("S1", 3.0), TriggerConfig::continuous().endless())
        .build()
        .expect("build");
    let mut rx = m.bus().subscribe();

    m.start();
    m.advance(ms(1_000));

    let events = drain(&mut rx);
    let returns: Vec<u64> = events
        .iter()
        .filter(|e| e.kind == EventKind::RepeatFinished)
        .filter_map(|e| e.count)
        .collect();
    // A1 starts at 0: the first return needs 3 passes, every later one 3 more.
    assert!(returns.len() >= 9);
    assert!(returns.iter().all(|&r| r == 3));

    let stats = m.stats(id(&m, "S1")).expect("stats");
    let completed = returns.len() as u64;
    assert!(stats.steps == completed || stats.steps == completed + 1);
}

#[test]
fn test_execute_repetitions_block_the_caller() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(
            ScriptSheet::new("S1").on_step(|s| {
                s.execute(ExecuteRequest::new("S2", 4));
                Ok(())
            }),
            TriggerConfig::continuous(),
        )
        .with_sheet(counter("S2"), TriggerConfig::execute())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");
    let s2 = id(&m, "S2");

    m.start();
    assert!(m.sheet(s1).expect("S1").is_paused());
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(1));

    m.advance_to(ms(350));
    assert_eq!(m.stats(s1).map(|s| s.steps), Some(1));
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(4));
    assert!(!m.sheet(s1).expect("S1").is_paused());

    // the next caller step starts a fresh call
    m.advance_to(ms(400));
    assert_eq!(m.stats(s1).map(|s| s.steps), Some(2));
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(1));
}

#[test]
fn test_fast_execute_finishes_within_one_caller_cycle() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(
            ScriptSheet::new("S1").on_step(|s| {
                s.execute(ExecuteRequest::new("S2", 10).paced(true));
                Ok(())
            }),
            TriggerConfig::continuous(),
        )
        .with_sheet(counter("S2"), TriggerConfig::execute())
        .build()
        .expect("build");

    m.start();
    m.advance(ms(20));
    assert_eq!(m.stats(id(&m, "S2")).map(|s| s.executesteps), Some(10));
    assert!(!m.sheet(id(&m, "S1")).expect("S1").is_paused());
}

#[test]
fn test_busy_target_rejects_second_caller() {
    let caller = |name: &str| {
        ScriptSheet::new(name).on_step(|s| {
            s.execute(ExecuteRequest::new("S2", 4));
            Ok(())
        })
    };
    let mut m = MachineBuilder::new(config())
        .with_sheet(caller("S1"), TriggerConfig::continuous())
        .with_sheet(caller("S3"), TriggerConfig::continuous())
        .with_sheet(counter("S2"), TriggerConfig::execute())
        .build()
        .expect("build");
    let mut rx = m.bus().subscribe();

    m.start();

    assert!(m.sheet(id(&m, "S1")).expect("S1").is_paused());
    assert!(!m.sheet(id(&m, "S3")).expect("S3").is_paused());
    let rejected: Vec<Event> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.kind == EventKind::ExecuteRejected)
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].sheet.as_deref(), Some("S3"));
}

#[test]
fn test_machine_stop_sheet_holds_will_stop_until_return() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(counter("S1"), TriggerConfig::continuous())
        .with_sheet(returning("S9", 5.0), TriggerConfig::machine_stop().endless())
        .build()
        .expect("build");
    let s9 = id(&m, "S9");

    m.start();
    m.advance(ms(250));
    assert_eq!(steps(&m, "S1"), 3);
    assert_eq!(steps(&m, "S9"), 0);

    assert_eq!(m.stop(), MachineState::WillStop);
    assert_eq!(m.stats(s9).map(|s| s.repeatsteps), Some(1));

    m.advance(ms(2));
    assert_eq!(m.state(), MachineState::WillStop);
    assert_eq!(m.stats(s9).map(|s| s.repeatsteps), Some(3));

    m.advance(ms(10));
    assert_eq!(m.state(), MachineState::Stopped);
    assert_eq!(m.stats(s9).map(|s| s.repeatsteps), Some(5));
    assert_eq!(m.next_deadline(), None);

    let before = m.snapshot();
    assert_eq!(m.stop(), MachineState::Stopped);
    m.advance(Duration::from_secs(5));
    assert_eq!(m.snapshot().sheets, before.sheets);
    assert_eq!(steps(&m, "S1"), 3);
}

#[test]
fn test_second_stop_forces_machine_down() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(
            ScriptSheet::new("S9").on_step(|_| Ok(())),
            TriggerConfig::machine_stop().endless(),
        )
        .build()
        .expect("build");

    m.start();
    assert_eq!(m.stop(), MachineState::WillStop);
    m.advance(ms(50));
    assert_eq!(m.state(), MachineState::WillStop);

    assert_eq!(m.stop(), MachineState::Stopped);
    assert_eq!(m.next_deadline(), None);
    let repeats = m.stats(id(&m, "S9")).map(|s| s.repeatsteps);
    m.advance(ms(50));
    assert_eq!(m.stats(id(&m, "S9")).map(|s| s.repeatsteps), repeats);
}

#[test]
fn test_machine_restarts_after_stop() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(counter("S1"), TriggerConfig::continuous())
        .with_sheet(counter("S2"), TriggerConfig::machine_start())
        .build()
        .expect("build");

    m.start();
    m.advance(ms(150));
    m.stop();
    m.start();
    assert_eq!(steps(&m, "S1"), 3);
    assert_eq!(steps(&m, "S2"), 2);
}

#[test]
fn test_arrival_detaches_each_message_once() {
    let sheet = ScriptSheet::new("S1").on_step(|s| {
        let seen = s.cell("SEEN");
        s.set_cell("SEEN", seen + 1.0);
        Ok(())
    });
    let mut m = MachineBuilder::new(config())
        .with_sheet(sheet, TriggerConfig::arrival())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");
    let mut rx = m.bus().subscribe();

    let posted: Vec<Message> = (0..3).map(|i| Message::new(json!({ "n": i }))).collect();
    for message in &posted {
        m.post_message(s1, message.clone()).expect("post");
    }
    assert_eq!(steps(&m, "S1"), 0);

    m.start();
    assert_eq!(steps(&m, "S1"), 1);
    m.advance(ms(500));
    assert_eq!(steps(&m, "S1"), 3);
    assert_eq!(m.pending_timers(s1), 0);

    m.post_message(s1, Message::new(json!({ "n": 3 })))
        .expect("post");
    assert_eq!(steps(&m, "S1"), 4);

    let detached: Vec<u64> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.kind == EventKind::MessageDetached)
        .filter_map(|e| e.count)
        .collect();
    let unique: HashSet<u64> = detached.iter().copied().collect();
    assert_eq!(detached.len(), 4);
    assert_eq!(unique.len(), 4);
    for message in &posted {
        assert!(unique.contains(&message.id));
    }
}

#[test]
fn test_pause_suspends_and_manual_steps_advance() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(returning("S1", 4.0), TriggerConfig::continuous().endless())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");

    m.start();
    assert_eq!(m.pause(), MachineState::Paused);
    assert_eq!(m.pending_timers(s1), 0);
    let repeats = m.stats(s1).map(|s| s.repeatsteps);
    m.advance(Duration::from_secs(1));
    assert_eq!(m.stats(s1).map(|s| s.repeatsteps), repeats);

    m.step();
    assert_eq!(m.stats(s1).map(|s| s.repeatsteps), Some(2));
    assert_eq!(m.pending_timers(s1), 0);

    assert_eq!(m.resume(), MachineState::Running);
    assert_eq!(m.pending_timers(s1), 1);
    m.advance(ms(2));
    assert_eq!(m.stats(s1).map(|s| s.steps), Some(1));
    assert_eq!(m.stats(s1).map(|s| s.repeatsteps), Some(4));
}

#[test]
fn test_at_most_one_timer_per_sheet() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(returning("C", 3.0), TriggerConfig::continuous().endless())
        .with_sheet(counter("T"), TriggerConfig::time(ms(30)))
        .with_sheet(counter("R"), TriggerConfig::random(ms(20)))
        .with_sheet(
            ScriptSheet::new("A").with_loop("/items"),
            TriggerConfig::arrival(),
        )
        .with_sheet(
            ScriptSheet::new("X").on_step(|s| {
                s.execute(ExecuteRequest::new("E", 3));
                Ok(())
            }),
            TriggerConfig::time(ms(70)),
        )
        .with_sheet(returning("E", 2.0), TriggerConfig::execute().endless())
        .build()
        .expect("build");
    let ids: Vec<SheetId> = m.snapshot().sheets.iter().map(|s| s.id).collect();
    let arrival = id(&m, "A");

    m.start();
    for tick in 0..200u64 {
        if tick % 25 == 0 {
            m.post_message(arrival, Message::new(json!({ "items": [1, 2, 3] })))
                .expect("post");
        }
        if tick == 120 {
            m.pause();
        }
        if tick == 130 {
            m.step();
            m.resume();
        }
        m.advance(ms(7));
        for sheet in &ids {
            assert!(m.pending_timers(*sheet) <= 1, "tick {tick}: {sheet} holds several timers");
        }
    }
    assert!(steps(&m, "T") > 0);
    assert!(steps(&m, "E") > 0);
}

#[test]
fn test_set_trigger_on_running_machine() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(counter("S1"), TriggerConfig::arrival())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");
    m.start();
    assert_eq!(steps(&m, "S1"), 0);

    m.set_trigger(s1, TriggerConfig::continuous()).expect("swap");
    assert_eq!(steps(&m, "S1"), 1);
    m.set_trigger(s1, TriggerConfig::continuous().endless())
        .expect("update");
    m.advance(ms(100));
    assert_eq!(steps(&m, "S1"), 2);

    let gone = m
        .add_sheet(Box::new(counter("TMP")), TriggerConfig::execute())
        .expect("add");
    m.remove_sheet(gone).expect("remove");
    let err = m
        .set_trigger(gone, TriggerConfig::continuous())
        .expect_err("unknown sheet");
    assert_eq!(err.as_label(), "machine_unknown_sheet");
}

#[test]
fn test_trigger_from_json_config() {
    let trigger = TriggerConfig::from_json(r#"{"type":"time","interval":1,"intervalUnit":"s"}"#)
        .expect("config");
    let mut m = MachineBuilder::new(config())
        .with_sheet(counter("S1"), trigger)
        .build()
        .expect("build");
    m.start();
    m.advance(Duration::from_secs(3));
    assert_eq!(steps(&m, "S1"), 4);
}

#[test]
fn test_snapshot_reports_paused_sheet() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(
            ScriptSheet::new("S1").on_step(|s| {
                s.execute(ExecuteRequest::new("S2", 2));
                Ok(())
            }),
            TriggerConfig::continuous(),
        )
        .with_sheet(counter("S2"), TriggerConfig::execute())
        .build()
        .expect("build");
    m.start();
    let snap = m.snapshot();
    let s1 = snap
        .sheets
        .iter()
        .find(|s| s.name == "S1")
        .expect("S1");
    assert!(s1.paused);
    assert_eq!(snap.state, MachineState::Running);
    assert_eq!(m.sheet(s1.id).map(|sheet| sheet.name()), Some("S1"));
}

#[test]
fn test_execute_accepted_while_stopped_finishes_after_start() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(
            ScriptSheet::new("S1").on_step(|s| {
                s.execute(ExecuteRequest::new("S2", 3));
                Ok(())
            }),
            TriggerConfig::continuous(),
        )
        .with_sheet(counter("S2"), TriggerConfig::execute())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");
    let s2 = id(&m, "S2");

    m.step();
    assert!(m.sheet(s1).expect("S1").is_paused());
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(1));
    assert_eq!(m.pending_timers(s2), 0);

    m.start();
    assert_eq!(m.pending_timers(s2), 1);
    m.advance(ms(250));
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(3));
    assert!(!m.sheet(s1).expect("S1").is_paused());
    assert!(!m.trigger(s2).expect("S2").is_executing());
    assert_eq!(steps(&m, "S1"), 1);

    m.advance(ms(50));
    assert_eq!(steps(&m, "S1"), 2);
    assert_eq!(m.stats(s2).map(|s| s.executesteps), Some(1));
}

#[test]
fn test_each_message_detached_after_its_repeat_until_returns() {
    let mut m = MachineBuilder::new(config())
        .with_sheet(returning("S1", 3.0), TriggerConfig::arrival().endless())
        .build()
        .expect("build");
    let s1 = id(&m, "S1");
    let mut rx = m.bus().subscribe();

    let posted: Vec<Message> = (0..4).map(|i| Message::new(json!({ "n": i }))).collect();
    for message in &posted {
        m.post_message(s1, message.clone()).expect("post");
    }
    m.start();
    m.advance(Duration::from_secs(1));

    let events: Vec<Event> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::RepeatFinished | EventKind::MessageDetached))
        .collect();
    assert_eq!(events.len(), 8);
    for pair in events.chunks(2) {
        assert_eq!(pair[0].kind, EventKind::RepeatFinished);
        assert_eq!(pair[0].count, Some(3));
        assert_eq!(pair[1].kind, EventKind::MessageDetached);
    }
    let detached: HashSet<u64> = events
        .iter()
        .filter(|e| e.kind == EventKind::MessageDetached)
        .filter_map(|e| e.count)
        .collect();
    let expected: HashSet<u64> = posted.iter().map(|message| message.id).collect();
    assert_eq!(detached, expected);
    assert_eq!(steps(&m, "S1"), 4);
    assert_eq!(m.pending_timers(s1), 0);
}
