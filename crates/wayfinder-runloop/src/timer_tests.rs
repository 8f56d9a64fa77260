use super::*;
use std::sync::atomic::AtomicUsize;

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> futures::future::Ready<()> + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let callback = move || {
        c.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(())
    };
    (count, callback)
}

#[tokio::test(start_paused = true)]
async fn test_once_fires_once() {
    let lifecycle = Lifecycle::new("test");
    let (count, callback) = counter();
    let timer = Timer::once(&lifecycle, "auto-start", Duration::from_millis(100), callback);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(timer.fire_count(), 1);
    assert!(!timer.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_repeating_fires_until_cancelled() {
    let lifecycle = Lifecycle::new("test");
    let (count, callback) = counter();
    let timer = Timer::repeating(&lifecycle, "poll", Duration::from_millis(100), callback);
    assert!(timer.is_repeating());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);

    timer.cancel();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(!lifecycle.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_teardown_stops_timer() {
    let lifecycle = Lifecycle::new("test");
    let (count, callback) = counter();
    let timer = Timer::repeating(&lifecycle, "poll", Duration::from_millis(100), callback);

    tokio::time::sleep(Duration::from_millis(150)).await;
    lifecycle.teardown();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!timer.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_timer_on_torn_down_lifecycle_is_invalid() {
    let lifecycle = Lifecycle::new("test");
    lifecycle.teardown();
    let (count, callback) = counter();
    let timer = Timer::once(&lifecycle, "late", Duration::from_millis(10), callback);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!timer.is_valid());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
