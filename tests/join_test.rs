use bumble::runtime::body::{ScriptBuilder, from_fn};
use bumble::runtime::operation::{deferred, resolved};
use bumble::runtime::{Awaitable, Resume, Step, TaskError, TaskScheduler};
use serde_json::{Value, json};

fn join_script(entries: Vec<Awaitable<Value>>) -> bumble::runtime::body::Script<Value> {
    ScriptBuilder::<Value>::new()
        .step(move |_| Ok(Awaitable::All(entries)))
        .finish(|input| match input {
            Resume::All(values) => Ok(Value::Array(values)),
            other => Err(TaskError::fault(format!("expected join results, got {:?}", other))),
        })
}

#[test]
fn test_join_results_follow_completion_order() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let (o1, r1) = deferred::<Value>();
    let (o2, r2) = deferred::<Value>();
    let (o3, r3) = deferred::<Value>();
    let handle = scheduler.submit(join_script(vec![
        Awaitable::op(o1),
        Awaitable::op(o2),
        Awaitable::op(o3),
    ]));

    scheduler.drive();
    r2.resolve(json!("second"));
    scheduler.drive();
    r1.resolve(json!("first"));
    scheduler.drive();
    assert!(!handle.is_finished(), "Join must wait for every operation");

    r3.resolve(json!("third"));
    let stats = scheduler.drive();
    assert_eq!(stats.completed, 1, "Join completes on the drive observing the last resolution");

    // Completion order, not input order.
    assert_eq!(handle.result(), Some(json!(["second", "first", "third"])));
}

#[test]
fn test_join_waits_for_all_operations() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let pairs: Vec<_> = (0..4).map(|_| deferred::<Value>()).collect();
    let (ops, resolvers): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    let handle = scheduler.submit(join_script(ops.into_iter().map(Awaitable::op).collect()));

    scheduler.drive();
    for (i, resolver) in resolvers.iter().enumerate().take(3) {
        resolver.resolve(json!(i));
        scheduler.drive();
        assert!(!handle.is_finished());
    }

    resolvers[3].resolve(json!(3));
    scheduler.drive();
    assert_eq!(handle.result(), Some(json!([0, 1, 2, 3])));
}

#[test]
fn test_join_resolutions_seen_in_same_drive_keep_input_order() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let (o1, r1) = deferred::<Value>();
    let (o2, r2) = deferred::<Value>();
    let handle = scheduler.submit(join_script(vec![Awaitable::op(o1), Awaitable::op(o2)]));

    scheduler.drive();
    r2.resolve(json!("b"));
    r1.resolve(json!("a"));
    scheduler.drive();

    assert_eq!(handle.result(), Some(json!(["a", "b"])));
}

#[test]
fn test_join_ignores_entries_that_are_not_operations() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let (op, resolver) = deferred::<Value>();
    let nested = from_fn(|_| Ok(Step::Done(json!("never run"))));
    let handle = scheduler.submit(join_script(vec![
        Awaitable::Value(json!("ignored")),
        Awaitable::op(op),
        Awaitable::task(nested),
    ]));

    scheduler.drive();
    assert!(!handle.is_finished());
    resolver.resolve(json!("only"));
    scheduler.drive();

    assert_eq!(handle.result(), Some(json!(["only"])));
}

#[test]
fn test_empty_join_resumes_on_next_drive() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let handle = scheduler.submit(join_script(vec![Awaitable::Value(json!(1))]));

    scheduler.drive();
    assert!(!handle.is_finished());
    scheduler.drive();
    assert_eq!(handle.result(), Some(json!([])));
}

#[test]
fn test_join_fails_fast_on_rejection() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let (o1, _r1) = deferred::<Value>();
    let (o2, r2) = deferred::<Value>();
    let handle = scheduler.submit(join_script(vec![Awaitable::op(o1), Awaitable::op(o2)]));

    scheduler.drive();
    r2.reject("network down");
    let stats = scheduler.drive();

    assert_eq!(stats.failed, 1);
    assert_eq!(
        handle.error(),
        Some(TaskError::OperationRejected("network down".to_string()))
    );
    assert!(scheduler.is_empty());
}

#[test]
fn test_join_over_settled_operations() {
    let mut scheduler = TaskScheduler::<Value>::new();
    let handle = scheduler.submit(
        ScriptBuilder::<Value>::new()
            .step(|_| Ok(Awaitable::all([resolved(json!(1)), resolved(json!(2))])))
            .finish(|input| Ok(Value::Array(input.into_values()))),
    );

    scheduler.drive();
    assert!(!handle.is_finished());
    scheduler.drive();
    assert_eq!(handle.result(), Some(json!([1, 2])));
}
