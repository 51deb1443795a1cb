//! Stress tests for window context and correlation under load

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use spectral_logging::{CorrelationContext, WindowContextGuard};

/// Many threads opening and closing window scopes must never see each
/// other's context.
#[test]
fn test_concurrent_window_contexts() {
    const NUM_THREADS: usize = 32;
    const ITERATIONS: usize = 200;

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    let start = Instant::now();

    for thread_id in 0..NUM_THREADS {
        let barrier = Arc::clone(&barrier);

        handles.push(thread::spawn(move || {
            let window_id = format!("W{}", thread_id);
            barrier.wait();

            for _ in 0..ITERATIONS {
                let _guard = WindowContextGuard::new(window_id.clone(), "calc");
                let ctx = WindowContextGuard::current().unwrap();
                assert_eq!(ctx.window_id, window_id);
            }

            assert!(WindowContextGuard::current().is_none());
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    println!(
        "Completed {} window scopes across {} threads in {:?}",
        NUM_THREADS * ITERATIONS,
        NUM_THREADS,
        start.elapsed()
    );
}

/// Switching windows back and forth on one thread
#[test]
fn test_rapid_window_switching() {
    const NUM_SWITCHES: usize = 10_000;

    for i in 0..NUM_SWITCHES {
        let (window, app) = if i % 2 == 0 { ("W1", "calc") } else { ("W2", "notes") };
        let _guard = WindowContextGuard::new(window, app);
        assert_eq!(WindowContextGuard::current().unwrap().app_id, app);
    }

    assert!(WindowContextGuard::current().is_none());
}

/// A chain of retries and follow-up calls keeps one trace id
#[test]
fn test_deep_correlation_chain() {
    let root = CorrelationContext::new_root().with_call(1, "calc.add");
    let trace_id = root.trace_id;

    let mut contexts = vec![root];
    for level in 1..=100 {
        let child = contexts[level - 1].child();
        assert_eq!(child.parent_span_id, Some(contexts[level - 1].span_id));
        assert_eq!(child.trace_id, trace_id);
        contexts.push(child);
    }

    assert_eq!(contexts[100].tool_id.as_deref(), Some("calc.add"));
}

#[test]
fn test_correlation_serializes_to_json() {
    for call_id in 0..500u64 {
        let ctx = CorrelationContext::new_root().with_call(call_id, "notes.save");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: CorrelationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
