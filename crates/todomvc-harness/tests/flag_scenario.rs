use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::Instant;
use todomvc_harness::dom::Document;
use todomvc_harness::{PollState, WaitOptions, wait_for, wait_for_with};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Adds `<div id="flag">` to the body after `delay`.
fn inject_flag_after(document: &Document, delay: Duration) {
    let document = document.clone();
    tokio::task::spawn_local(async move {
        tokio::time::sleep(delay).await;
        let flag = document.create_element("div");
        flag.set_attribute("id", "flag");
        document.body().append_child(&flag);
    });
}

#[tokio::test(start_paused = true)]
async fn flag_injected_at_25ms_is_seen_on_the_40ms_check() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = Document::new();
            let start = Instant::now();
            inject_flag_after(&document, Duration::from_millis(25));

            let watched = document.clone();
            let task = wait_for(move || watched.get_element_by_id("flag").is_some());
            assert_eq!(task.state(), PollState::Pending);

            let resolution = task.await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(40));
            assert!(start.elapsed() < Duration::from_millis(60));
            // 0ms and 20ms miss the flag, 40ms sees it.
            assert_eq!(resolution.attempts, 3);
            assert!(document.get_element_by_id("flag").is_some());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn never_resolves_before_injection() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let document = Document::new();
            inject_flag_after(&document, Duration::from_millis(25));

            let watched = document.clone();
            let task = wait_for(move || watched.count("#flag").unwrap_or(0) == 1);
            let early = tokio::time::timeout(Duration::from_millis(24), task).await;
            assert!(early.is_err());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn timeout_ends_a_wait_for_a_flag_that_never_comes() {
    init_logging();
    let document = Document::new();
    let watched = document.clone();
    let options = WaitOptions::default().with_timeout(Duration::from_millis(100));
    let err = wait_for_with(move || watched.count("#flag").unwrap_or(0) > 0, options)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("still false"));
    // 0, 20, 40, 60, 80 and the deadline check at 100
    assert_eq!(err.attempts(), 6);
}
