//! Integration tests for the sequencer, splitter, and adapter decorators.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::prelude::*;

type Log = Arc<Mutex<Vec<(Option<ActorAddr>, Message)>>>;

fn spawn_probe(system: &ActorSystem) -> (ActorRef, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let probe = system.spawn(Box::new(move |_, element| {
        sink.lock().push((
            element.sender.as_ref().map(ActorRef::address),
            element.payload.clone(),
        ));
        None
    }));
    (probe, log)
}

fn spawn_mapper(system: &ActorSystem, f: impl Fn(i64) -> i64 + Send + 'static) -> ActorRef {
    system.spawn(Box::new(move |_, element| {
        let x = element.payload.get::<i64>(0).copied().unwrap_or(0);
        Some(Message::of(f(x)))
    }))
}

fn system() -> ActorSystem {
    ActorSystem::new(SystemConfig::default()).unwrap()
}

#[test]
fn test_sequencer_composes_f_after_g() {
    let sys = system();
    let double = spawn_mapper(&sys, |x| x * 2);
    let add_one = spawn_mapper(&sys, |x| x + 1);
    // f after g: first add one, then double
    let composed = Sequencer::new(double.clone(), add_one.clone());
    let (probe, log) = spawn_probe(&sys);

    composed.enqueue(
        MailboxElement::make(Some(probe.clone()), probe.make_request_id(), Message::of(3i64)),
        None,
    );

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1.get::<i64>(0), Some(&8));
}

#[test]
fn test_sequencer_node_is_node_of_g() {
    let sys = system();
    let double = spawn_mapper(&sys, |x| x * 2);
    let add_one = spawn_mapper(&sys, |x| x + 1);
    let composed = Sequencer::new(double, add_one.clone());
    assert_eq!(composed.node(), add_one.node());
}

#[test]
fn test_sequencer_dies_with_constituent() {
    let sys = system();
    let double = spawn_mapper(&sys, |x| x * 2);
    let add_one = spawn_mapper(&sys, |x| x + 1);
    let composed = Sequencer::new(double, add_one.clone());
    let (probe, log) = spawn_probe(&sys);

    add_one.send_exit(ExitReason::Kill, None);
    assert!(composed.is_terminated());

    let accepted = composed.enqueue(
        MailboxElement::make(Some(probe.clone()), probe.make_request_id(), Message::of(3i64)),
        None,
    );

    assert!(!accepted);
    let log = log.lock();
    assert_eq!(log.len(), 1);
    let error = log[0].1.get::<ErrorMsg>(0).unwrap();
    assert_eq!(error.reason, ExitReason::Kill);
}

#[test]
fn test_sequencer_over_dead_constituent_spawns_dead() {
    let sys = system();
    let double = spawn_mapper(&sys, |x| x * 2);
    let dead = spawn_mapper(&sys, |x| x + 1);
    dead.cleanup(ExitReason::UserShutdown, None);

    let composed = Sequencer::new(double, dead);

    assert!(composed.is_terminated());
    assert_eq!(composed.fail_state(), ExitReason::UserShutdown);
}

#[test]
fn test_splitter_concatenates_worker_responses() {
    let sys = system();
    let workers: Vec<ActorRef> = (0..3i64).map(|k| spawn_mapper(&sys, move |x| x + k)).collect();
    let splitter = Splitter::new(&sys, workers);
    let (probe, log) = spawn_probe(&sys);

    splitter.enqueue(
        MailboxElement::make(Some(probe.clone()), probe.make_request_id(), Message::of(10i64)),
        None,
    );

    let log = log.lock();
    assert_eq!(log.len(), 1);
    let aggregated = &log[0].1;
    assert_eq!(aggregated.len(), 3);
    let mut values: Vec<i64> = (0..3)
        .map(|i| aggregated.get::<i64>(i).copied().unwrap())
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![10, 11, 12]);
}

#[test]
fn test_splitter_exits_when_a_worker_dies() {
    let sys = system();
    let workers: Vec<ActorRef> = (0..2).map(|_| spawn_mapper(&sys, |x| x)).collect();
    let splitter = Splitter::new(&sys, workers.clone());

    workers[0].send_exit(ExitReason::Kill, None);

    assert!(splitter.is_terminated());
    assert_eq!(splitter.fail_state(), ExitReason::Kill);
}

#[test]
fn test_splitter_node_is_node_of_creating_system() {
    let sys = system();
    let worker = spawn_mapper(&sys, |x| x);
    let splitter = Splitter::new(&sys, vec![worker]);
    assert_eq!(splitter.node(), sys.node());
}

#[test]
fn test_adapter_prepends_bound_arguments() {
    let sys = system();
    let (recorder, log) = spawn_probe(&sys);
    let bound = Adapter::new(
        recorder,
        Message::builder().append(String::from("scale")).append(4i64).build(),
    );

    bound.send_anonymous(Message::of(9i64), None);

    let log = log.lock();
    assert_eq!(log.len(), 1);
    let merged = &log[0].1;
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.get::<String>(0), Some(&"scale".to_string()));
    assert_eq!(merged.get::<i64>(1), Some(&4));
    assert_eq!(merged.get::<i64>(2), Some(&9));
}

#[test]
fn test_adapter_substitutes_index_mappings() {
    let sys = system();
    let (recorder, log) = spawn_probe(&sys);
    let bound = Adapter::new(
        recorder,
        Message::builder()
            .append(String::from("echo"))
            .append(IndexMapping(1))
            .build(),
    );

    bound.send_anonymous(Message::of(String::from("payload")), None);

    let log = log.lock();
    let merged = &log[0].1;
    assert_eq!(merged.get::<String>(0), Some(&"echo".to_string()));
    assert_eq!(merged.get::<String>(1), Some(&"payload".to_string()));
    assert_eq!(merged.get::<String>(2), Some(&"payload".to_string()));
}

#[test]
fn test_adapter_dies_with_decorated() {
    let sys = system();
    let decorated = spawn_mapper(&sys, |x| x);
    let bound = Adapter::new(decorated.clone(), Message::of(1i64));
    let (probe, log) = spawn_probe(&sys);

    decorated.send_exit(ExitReason::UserShutdown, None);

    assert!(bound.is_terminated());
    let accepted = bound.enqueue(
        MailboxElement::make(Some(probe.clone()), probe.make_request_id(), Message::of(2i64)),
        None,
    );
    assert!(!accepted);
    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert!(log[0].1.get::<ErrorMsg>(0).is_some());
}

#[test]
fn test_adapter_forwards_responses_to_original_sender() {
    let sys = system();
    // decorated sums its two integer arguments
    let summer = sys.spawn(Box::new(|_, element| {
        let a = element.payload.get::<i64>(0).copied().unwrap_or(0);
        let b = element.payload.get::<i64>(1).copied().unwrap_or(0);
        Some(Message::of(a + b))
    }));
    let bound = Adapter::new(summer, Message::of(100i64));
    let (probe, log) = spawn_probe(&sys);

    bound.enqueue(
        MailboxElement::make(Some(probe.clone()), probe.make_request_id(), Message::of(11i64)),
        None,
    );

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1.get::<i64>(0), Some(&111));
}
