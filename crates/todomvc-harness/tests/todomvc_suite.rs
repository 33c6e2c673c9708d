use std::time::Duration;

use tokio::task::LocalSet;
use todomvc_harness::todomvc::{self, SuiteContext};
use todomvc_harness::{HarnessConfig, RunOptions};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test(start_paused = true)]
async fn every_case_passes_against_the_demo_app() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut ctx = SuiteContext::launch(HarnessConfig::default());
            let report = todomvc::suite().run(&mut ctx, &RunOptions::default()).await;

            for case in &report.cases {
                assert!(
                    case.passed,
                    "{} failed: error={:?} assertions={:?}",
                    case.name,
                    case.error,
                    case.assertions.iter().filter(|a| !a.passed).collect::<Vec<_>>()
                );
            }
            assert_eq!(report.summary(), "17/17 passed");

            assert!(ctx.time_to_show_todos.unwrap() > Duration::from_millis(20));
            assert_eq!(ctx.fixture.delay(), Duration::from_millis(10));

            // One seed deleted, one created, one completed and cleared.
            let names: Vec<String> = ctx.app.todos().iter().map(|t| t.name.clone()).collect();
            assert_eq!(names, ["laundry", "mow lawn"]);
            assert!(ctx.app.todos().active().len() == 2);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_service_fails_cases_instead_of_hanging() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let config = HarnessConfig::from_str("[timing]\ntimeout = 300\n").unwrap();
            let mut ctx = SuiteContext::launch(config);
            // The first load has not been sent yet; it will find no route.
            ctx.fixture.take_routes();

            let options = RunOptions {
                filter: Some("setup works".into()),
                ..RunOptions::default()
            };
            let report = todomvc::suite().run(&mut ctx, &options).await;
            let case = &report.cases[0];
            assert!(!case.passed);
            let error = case.error.as_deref().unwrap();
            assert!(error.contains("setup failed"), "{}", error);
            assert!(error.contains("waiting for .todo"), "{}", error);
            assert!(ctx.app.is_loaded());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn case_timeout_bounds_a_stuck_setup() {
    init_logging();
    LocalSet::new()
        .run_until(async {
            let mut ctx = SuiteContext::launch(HarnessConfig::default());
            ctx.fixture.take_routes();

            let options = RunOptions {
                filter: Some("Defined Todo".into()),
                case_timeout: Some(Duration::from_secs(1)),
                ..RunOptions::default()
            };
            let report = todomvc::suite().run(&mut ctx, &options).await;
            // "Defined Todo" and "Defined TodoList"
            assert_eq!(report.cases.len(), 2);
            assert_eq!(report.failed(), 2);
            for case in &report.cases {
                assert!(case.error.as_deref().unwrap().contains("timed out"));
            }
        })
        .await;
}
