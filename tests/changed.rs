//! Tests for change flags and wiring notifications.

use parking_lot::Mutex;
use rowpipe::changed::ChangeFlag;
use rowpipe::pipeline::{Pipeline, PipelineEvent};
use rowpipe::stages::RowCollector;
use std::sync::Arc;

#[test]
fn test_notify_is_noop_unless_changed() {
    let flag: ChangeFlag<u32> = ChangeFlag::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    flag.add_listener(move |v| sink.lock().push(*v));

    flag.notify(&1);
    assert!(calls.lock().is_empty());

    flag.set_changed();
    assert!(flag.has_changed());
    flag.notify(&2);
    assert!(!flag.has_changed());
    flag.notify(&3);
    assert_eq!(*calls.lock(), vec![2]);
}

#[test]
fn test_listeners_run_most_recent_first() {
    let flag: ChangeFlag<()> = ChangeFlag::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        flag.add_listener(move |_| order.lock().push(name));
    }
    flag.set_changed();
    flag.notify(&());
    assert_eq!(*order.lock(), vec!["third", "second", "first"]);
}

#[test]
fn test_remove_listener() {
    let flag: ChangeFlag<()> = ChangeFlag::new();
    let hits = Arc::new(Mutex::new(0));
    let h = Arc::clone(&hits);
    let id = flag.add_listener(move |_| *h.lock() += 1);
    assert_eq!(flag.listener_count(), 1);

    assert!(flag.remove_listener(id));
    assert!(!flag.remove_listener(id));
    flag.set_changed_to(true);
    flag.notify(&());
    assert_eq!(*hits.lock(), 0);

    flag.set_changed();
    flag.clear_changed();
    assert!(!flag.has_changed());
}

#[test]
fn test_listener_may_register_listeners() {
    let flag: Arc<ChangeFlag<()>> = Arc::new(ChangeFlag::new());
    let inner = Arc::clone(&flag);
    flag.add_listener(move |_| {
        inner.add_listener(|_| {});
    });
    flag.set_changed();
    flag.notify(&());
    assert_eq!(flag.listener_count(), 2);
}

#[test]
fn test_pipeline_announces_wiring_changes() -> anyhow::Result<()> {
    let mut p = Pipeline::default();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    p.on_change(move |e| sink.lock().push(e.clone()));

    let a = p.add_stage("a", Box::new(RowCollector::new().0))?;
    let b = p.add_stage("b", Box::new(RowCollector::new().0))?;
    p.connect(a, b)?;

    assert_eq!(
        *events.lock(),
        vec![
            PipelineEvent::StageAdded { id: a, name: "a".into() },
            PipelineEvent::StageAdded { id: b, name: "b".into() },
            PipelineEvent::Connected { from: a, to: b },
        ]
    );
    Ok(())
}
