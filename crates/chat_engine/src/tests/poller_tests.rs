use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::sleep;

#[derive(Default)]
struct CountingTarget {
    silent: AtomicU32,
    manual: AtomicU32,
}

#[async_trait]
impl PollTarget for CountingTarget {
    async fn poll(&self, kind: FetchKind) {
        match kind {
            FetchKind::Silent => self.silent.fetch_add(1, Ordering::SeqCst),
            FetchKind::Manual => self.manual.fetch_add(1, Ordering::SeqCst),
        };
    }
}

#[tokio::test]
async fn ticks_fire_silent_polls() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = PollingScheduler::new(Duration::from_millis(20));
    scheduler
        .start(Arc::clone(&target) as Arc<dyn PollTarget>)
        .await;

    sleep(Duration::from_millis(110)).await;
    scheduler.stop().await;

    let ticks = target.silent.load(Ordering::SeqCst);
    assert!(ticks >= 3, "expected several ticks, got {ticks}");
    assert_eq!(target.manual.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stop_halts_the_loop() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = PollingScheduler::new(Duration::from_millis(10));
    scheduler
        .start(Arc::clone(&target) as Arc<dyn PollTarget>)
        .await;
    sleep(Duration::from_millis(35)).await;
    scheduler.stop().await;
    assert!(!scheduler.is_running().await);

    let after_stop = target.silent.load(Ordering::SeqCst);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(target.silent.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = PollingScheduler::new(Duration::from_millis(10));
    scheduler
        .start(Arc::clone(&target) as Arc<dyn PollTarget>)
        .await;
    scheduler
        .start(Arc::clone(&target) as Arc<dyn PollTarget>)
        .await;
    sleep(Duration::from_millis(25)).await;
    scheduler.stop().await;

    // A doubled loop would roughly double the tick count.
    let ticks = target.silent.load(Ordering::SeqCst);
    assert!(ticks <= 3, "tick count {ticks} suggests two loops");
}

#[tokio::test]
async fn manual_run_goes_through_the_gate() {
    struct BlockingTarget {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
        concurrent: AtomicU32,
        peak: AtomicU32,
    }

    #[async_trait]
    impl PollTarget for BlockingTarget {
        async fn poll(&self, _kind: FetchKind) {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
        }
    }

    let target = Arc::new(BlockingTarget {
        entered: tokio::sync::Notify::new(),
        release: tokio::sync::Notify::new(),
        concurrent: AtomicU32::new(0),
        peak: AtomicU32::new(0),
    });
    let scheduler = Arc::new(PollingScheduler::new(Duration::from_secs(60)));

    // Occupy the gate with a silent fetch, then race a manual one.
    let silent = {
        let scheduler = Arc::clone(&scheduler);
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            scheduler.run_now(&*target, FetchKind::Silent).await;
        })
    };
    target.entered.notified().await;
    let manual = {
        let scheduler = Arc::clone(&scheduler);
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            scheduler.run_now(&*target, FetchKind::Manual).await;
        })
    };
    sleep(Duration::from_millis(30)).await;
    assert_eq!(
        target.concurrent.load(Ordering::SeqCst),
        1,
        "manual fetch slipped past the gate"
    );
    target.release.notify_one();
    silent.await.expect("silent task");
    target.entered.notified().await;
    target.release.notify_one();
    manual.await.expect("manual task");

    assert_eq!(target.peak.load(Ordering::SeqCst), 1, "polls overlapped");
}
