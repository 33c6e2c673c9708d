//! Wait command - add a flag element after a delay and poll until it shows up

use std::time::Duration;

use anyhow::Result;
use tokio::task::LocalSet;
use tokio::time::Instant;
use todomvc_harness::dom::Document;
use todomvc_harness::{HarnessConfig, Resolution, WaitError, wait_for_with};

pub struct WaitCommand {
    pub inject_after_ms: u64,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

pub struct WaitSummary {
    pub injected_at: Option<Duration>,
    pub outcome: Result<Resolution, WaitError>,
}

/// Runs the scenario in the current `LocalSet`.
pub async fn scenario(config: &HarnessConfig, cmd: &WaitCommand) -> WaitSummary {
    let mut options = config.timing.wait_options();
    if let Some(interval) = cmd.interval_ms {
        options = options.with_interval(Duration::from_millis(interval));
    }
    if let Some(timeout) = cmd.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout));
    }

    let document = Document::new();
    let start = Instant::now();
    let delay = Duration::from_millis(cmd.inject_after_ms);
    let injector = {
        let document = document.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let flag = document.create_element("div");
            flag.set_attribute("id", "flag");
            document.body().append_child(&flag);
            log::debug!("flag injected");
            start.elapsed()
        })
    };

    let watched = document.clone();
    let outcome = wait_for_with(move || watched.get_element_by_id("flag").is_some(), options).await;

    let injected_at = if injector.is_finished() {
        injector.await.ok()
    } else {
        injector.abort();
        None
    };
    WaitSummary {
        injected_at,
        outcome,
    }
}

/// Returns whether the flag was seen.
pub fn run(config: &HarnessConfig, cmd: WaitCommand) -> Result<bool> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = rt.block_on(LocalSet::new().run_until(scenario(config, &cmd)));

    match summary.injected_at {
        Some(at) => println!("Flag injected after {:.0?}", at),
        None => println!("Flag never injected"),
    }
    match summary.outcome {
        Ok(resolution) => {
            println!(
                "[PASS] Resolved after {:.0?} ({} checks)",
                resolution.elapsed, resolution.attempts
            );
            Ok(true)
        }
        Err(e) => {
            println!("[FAIL] {}", e);
            Ok(false)
        }
    }
}
