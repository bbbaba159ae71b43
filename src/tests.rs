// glbridge/src/tests.rs
//
//! Unit tests.

use crate::{api, Context, Error, Registry};
use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};
use rand::Rng;
use serial_test::serial;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

// A non-null stand-in for the JS engine instance. The bridge never
// dereferences it.
fn fake_engine() -> *mut c_void {
    Box::into_raw(Box::new(0u8)) as *mut c_void
}

fn test_context(registry: &Registry) -> Context {
    let id = registry.create_context(fake_engine()).unwrap();
    registry.get(id).unwrap()
}

// Captures `warn!` output so tests can assert on bridge diagnostics. The
// logger stays installed for the rest of the test process.
struct WarningRecorder;

static WARNING_RECORDER: WarningRecorder = WarningRecorder;

lazy_static! {
    static ref WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
}

impl Log for WarningRecorder {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Warn {
            WARNINGS.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn record_warnings() {
    let _ = log::set_logger(&WARNING_RECORDER);
    log::set_max_level(LevelFilter::Warn);
    WARNINGS.lock().unwrap().clear();
}

#[test]
fn test_context_creation() {
    let registry = Registry::new();
    let engine = fake_engine();
    let first = registry.create_context(engine).unwrap();
    let second = registry.create_context(engine).unwrap();
    assert_ne!(first.0, 0);
    assert_ne!(second.0, 0);
    assert_ne!(first, second);
    assert_eq!(registry.get(first).unwrap().id(), first);
    assert_eq!(registry.get(first).unwrap().engine_handle(), engine);
    match registry.create_context(ptr::null_mut()) {
        Err(Error::NullEngineHandle) => {}
        _ => panic!(),
    }
}

#[test]
fn test_reuse_after_destroy() {
    let registry = Registry::new();
    let id = registry.create_context(fake_engine()).unwrap();
    let context = registry.get(id).unwrap();
    let object = context.create_object().unwrap();
    context.map_object(object, 7);

    registry.destroy_context(id);
    assert!(registry.get(id).is_none());

    // Destroying again is a no-op.
    registry.destroy_context(id);

    // IDs are not recycled.
    let next = registry.create_context(fake_engine()).unwrap();
    assert_ne!(next, id);
}

#[test]
fn test_object_mapping_round_trip() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let object = context.create_object().unwrap();
        let native = rng.gen_range(1..u32::MAX);
        context.map_object(object, native);
        assert_eq!(context.get_object(object), Some(native));

        // Remapping overwrites.
        context.map_object(object, native ^ 1);
        assert_eq!(context.get_object(object), Some(native ^ 1));
    }
}

#[test]
fn test_unmapped_object() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let object = context.create_object().unwrap();
    assert_ne!(object.0, 0);
    assert_eq!(context.get_object(object), None);
}

#[test]
fn test_destroy_clears_mapping() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let object = context.create_object().unwrap();
    context.map_object(object, 1234);
    assert_eq!(context.get_object(object), Some(1234));
    context.destroy_object(object);
    assert_eq!(context.get_object(object), None);

    // Destroying an unknown object is a no-op.
    context.destroy_object(object);
}

#[test]
fn test_cross_context_isolation() {
    let registry = Registry::new();
    let first = test_context(&registry);
    let second = test_context(&registry);
    let object = first.create_object().unwrap();
    first.map_object(object, 99);
    assert_eq!(second.get_object(object), None);
    assert_eq!(first.get_object(object), Some(99));
}

#[test]
fn test_needs_redraw_cycle() {
    let registry = Registry::new();
    let context = test_context(&registry);
    assert!(!context.needs_redraw());

    let flush_requests = Arc::new(AtomicUsize::new(0));
    {
        let flush_requests = flush_requests.clone();
        context.set_flush_method(move || {
            flush_requests.fetch_add(1, Ordering::SeqCst);
        });
    }

    context.end_frame();
    assert_eq!(flush_requests.load(Ordering::SeqCst), 1);

    // The mark travels with the queued work: it lands only once the render
    // thread has flushed the frame.
    assert!(!context.needs_redraw());
    context.flush();
    assert!(context.needs_redraw());

    context.draw_ended();
    assert!(!context.needs_redraw());
}

#[test]
fn test_flush_empty_queue() {
    let registry = Registry::new();
    let context = test_context(&registry);
    context.flush();
    context.flush();
    context.commit();
    context.flush();
    assert!(!context.needs_redraw());
}

#[test]
fn test_uncommitted_batch_invisible() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        context.enqueue(move || ran.store(true, Ordering::SeqCst));
    }
    context.flush();
    assert!(!ran.load(Ordering::SeqCst));

    context.commit();
    context.flush();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_fifo_order() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let order = Arc::new(Mutex::new(Vec::new()));
    for index in 0..50 {
        let order = order.clone();
        context.enqueue(move || order.lock().unwrap().push(index));
    }
    context.commit();
    for index in 50..100 {
        let order = order.clone();
        context.enqueue(move || order.lock().unwrap().push(index));
    }
    context.commit();

    let render_context = context.clone();
    thread::spawn(move || render_context.flush()).join().unwrap();

    let order = order.lock().unwrap();
    assert_eq!(*order, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_blocking_call() {
    let registry = Registry::new();
    let context = test_context(&registry);

    let (notify, wakeups) = mpsc::channel();
    context.set_flush_method(move || {
        let _ = notify.send(());
    });
    let render_context = context.clone();
    let render_thread = thread::spawn(move || {
        while wakeups.recv().is_ok() {
            render_context.flush();
        }
    });

    assert_eq!(context.call_blocking(|| 40 + 2), 42);

    // Replacing the flush method drops the old one, closing the channel the
    // render loop waits on.
    context.set_flush_method(|| {});
    render_thread.join().unwrap();
}

#[test]
fn test_deferred_object_creation() {
    let registry = Registry::new();
    let context = test_context(&registry);
    let object = context.create_object_with(|| 777).unwrap();
    assert_ne!(object.0, 0);
    assert_eq!(context.get_object(object), None);

    context.commit();
    context.flush();
    assert_eq!(context.get_object(object), Some(777));
}

#[test]
fn test_destroy_while_flushing() {
    let registry = Registry::new();
    let id = registry.create_context(fake_engine()).unwrap();
    let context = registry.get(id).unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    let finished = Arc::new(AtomicBool::new(false));
    {
        let finished = finished.clone();
        context.enqueue(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            finished.store(true, Ordering::SeqCst);
        });
    }
    context.commit();

    let render_context = context.clone();
    drop(context);
    let render_thread = thread::spawn(move || render_context.flush());

    // Destroy while the flush is provably in flight.
    started_rx.recv().unwrap();
    registry.destroy_context(id);
    assert!(registry.get(id).is_none());

    render_thread.join().unwrap();
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn test_default_framebuffer() {
    let registry = Registry::new();
    let context = test_context(&registry);
    assert_eq!(context.default_framebuffer(), 0);
    context.set_default_framebuffer(5);
    assert_eq!(context.default_framebuffer(), 5);
}

#[test]
#[serial]
fn test_bridge_end_to_end() {
    let ctx = api::context_create(fake_engine());
    assert_ne!(ctx, 0);

    let obj = api::context_create_object(ctx);
    assert_ne!(obj, 0);
    assert_eq!(api::context_get_object(ctx, obj), 0);
    api::context_map_object(ctx, obj, 42);
    assert_eq!(api::context_get_object(ctx, obj), 42);
    api::context_destroy_object(ctx, obj);
    assert_eq!(api::context_get_object(ctx, obj), 0);

    let flush_requests = Arc::new(AtomicUsize::new(0));
    {
        let flush_requests = flush_requests.clone();
        api::context_set_flush_method(ctx, move || {
            flush_requests.fetch_add(1, Ordering::SeqCst);
        });
    }
    api::context_set_default_framebuffer(ctx, 3);
    api::context_end_frame(ctx);
    assert_eq!(flush_requests.load(Ordering::SeqCst), 1);
    api::context_flush(ctx);
    assert!(api::context_needs_redraw(ctx));
    api::context_draw_ended(ctx);
    assert!(!api::context_needs_redraw(ctx));

    api::context_destroy(ctx);
    assert_eq!(api::context_get_object(ctx, obj), 0);
    assert_eq!(api::context_create_object(ctx), 0);
    assert!(!api::context_needs_redraw(ctx));
    api::context_flush(ctx);
}

#[test]
#[serial]
fn test_bridge_sentinels() {
    assert_eq!(api::context_create(ptr::null_mut()), 0);

    // An ID the registry never handed out: everything is a no-op at the
    // surface.
    let bogus = 0xDEAD_BEEF;
    assert!(api::context_get(bogus).is_none());
    assert_eq!(api::context_create_object(bogus), 0);
    assert_eq!(api::context_get_object(bogus, 1), 0);
    assert!(!api::context_needs_redraw(bogus));
    api::context_destroy(bogus);
    api::context_destroy_object(bogus, 1);
    api::context_map_object(bogus, 1, 7);
    api::context_flush(bogus);
    api::context_draw_ended(bogus);
    api::context_end_frame(bogus);
    api::context_set_default_framebuffer(bogus, 1);
    api::context_set_flush_method(bogus, || {});

    // 0 is the sentinel itself, never a live ID.
    assert!(api::context_get(0).is_none());
    assert_eq!(api::context_get_object(0, 0), 0);
}

#[test]
#[serial]
fn test_unknown_context_warns() {
    record_warnings();

    let bogus = 0x0BAD_1D;
    assert_eq!(api::context_get_object(bogus, 1), 0);
    api::context_map_object(bogus, 1, 7);
    api::context_flush(bogus);
    api::context_end_frame(bogus);
    assert!(!api::context_needs_redraw(bogus));

    let warnings = WARNINGS.lock().unwrap();
    assert_eq!(warnings.len(), 5);
    assert!(warnings.iter().all(|w| w.contains("unknown context")));
    drop(warnings);

    // Destroys of stale IDs are documented no-ops and stay quiet.
    WARNINGS.lock().unwrap().clear();
    api::context_destroy(bogus);
    api::context_destroy_object(bogus, 1);
    assert!(WARNINGS.lock().unwrap().is_empty());
}
