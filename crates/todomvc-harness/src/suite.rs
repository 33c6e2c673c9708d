//! Ordered async test cases over a shared context, with recorded assertions
//! and a `[PASS]`/`[FAIL]` report.

use std::fmt::Debug;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use tokio::time::Instant;

pub type SetupFn<C> = for<'a> fn(&'a mut C) -> LocalBoxFuture<'a, Result<()>>;
pub type CaseFn<C> = for<'a> fn(&'a mut C, &'a mut Assert) -> LocalBoxFuture<'a, Result<()>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRecord {
    pub passed: bool,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Collects assertion results for one case. A failed assertion is recorded
/// and the case keeps running.
#[derive(Debug, Default)]
pub struct Assert {
    records: Vec<AssertionRecord>,
}

impl Assert {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, record: AssertionRecord) -> bool {
        if record.passed {
            log::trace!("ok: {}", record.message);
        } else {
            log::debug!("assertion failed: {}", record.message);
        }
        let passed = record.passed;
        self.records.push(record);
        passed
    }

    pub fn ok(&mut self, condition: bool, message: impl Into<String>) -> bool {
        self.push(AssertionRecord {
            passed: condition,
            message: message.into(),
            expected: None,
            actual: None,
        })
    }

    pub fn equal<T: PartialEq + Debug>(
        &mut self,
        actual: T,
        expected: T,
        message: impl Into<String>,
    ) -> bool {
        self.push(AssertionRecord {
            passed: actual == expected,
            message: message.into(),
            expected: Some(format!("{:?}", expected)),
            actual: Some(format!("{:?}", actual)),
        })
    }

    /// Structural comparison through JSON, so differently typed values with
    /// the same shape compare equal.
    pub fn deep_equal<A: Serialize, E: Serialize>(
        &mut self,
        actual: &A,
        expected: &E,
        message: impl Into<String>,
    ) -> bool {
        let record = match (serde_json::to_value(actual), serde_json::to_value(expected)) {
            (Ok(actual), Ok(expected)) => AssertionRecord {
                passed: actual == expected,
                message: message.into(),
                expected: Some(expected.to_string()),
                actual: Some(actual.to_string()),
            },
            (Err(e), _) | (_, Err(e)) => AssertionRecord {
                passed: false,
                message: format!("{} (not serializable: {})", message.into(), e),
                expected: None,
                actual: None,
            },
        };
        self.push(record)
    }

    pub fn records(&self) -> &[AssertionRecord] {
        &self.records
    }

    pub fn all_passed(&self) -> bool {
        self.records.iter().all(|record| record.passed)
    }

    pub fn into_records(self) -> Vec<AssertionRecord> {
        self.records
    }
}

enum CaseBody<C> {
    Run(CaseFn<C>),
    Skip(String),
}

struct Case<C> {
    name: String,
    body: CaseBody<C>,
}

pub struct Suite<C> {
    name: String,
    setup: Option<SetupFn<C>>,
    cases: Vec<Case<C>>,
}

/// Options for [`Suite::run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only run cases whose name contains this
    pub filter: Option<String>,
    /// Print every assertion, not only the failing ones
    pub verbose: bool,
    /// Fail a case (setup included) that takes longer than this
    pub case_timeout: Option<Duration>,
    /// Print results to stdout as cases finish
    pub print: bool,
}

#[derive(Debug)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    pub skipped: Option<String>,
    pub duration: Duration,
    pub error: Option<String>,
    pub assertions: Vec<AssertionRecord>,
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| case.passed && case.skipped.is_none())
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.cases.iter().filter(|case| case.skipped.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.iter().filter(|case| !case.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn summary(&self) -> String {
        let run = self.cases.len() - self.skipped();
        if self.skipped() > 0 {
            format!("{}/{} passed ({} skipped)", self.passed(), run, self.skipped())
        } else {
            format!("{}/{} passed", self.passed(), run)
        }
    }
}

impl<C> Suite<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            cases: Vec::new(),
        }
    }

    /// Runs before every case.
    pub fn setup(mut self, setup: SetupFn<C>) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn case(mut self, name: impl Into<String>, case: CaseFn<C>) -> Self {
        self.cases.push(Case {
            name: name.into(),
            body: CaseBody::Run(case),
        });
        self
    }

    pub fn skip(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.cases.push(Case {
            name: name.into(),
            body: CaseBody::Skip(reason.into()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn case_names(&self) -> impl Iterator<Item = &str> {
        self.cases.iter().map(|case| case.name.as_str())
    }

    /// Run the cases in insertion order against `context`.
    pub async fn run(&self, context: &mut C, options: &RunOptions) -> SuiteReport {
        let selected: Vec<&Case<C>> = self
            .cases
            .iter()
            .filter(|case| {
                options
                    .filter
                    .as_ref()
                    .is_none_or(|filter| case.name.contains(filter.as_str()))
            })
            .collect();

        if options.print {
            println!("{}", self.name);
            println!("{}\n", "=".repeat(self.name.len()));
            println!("Running {} case(s)...\n", selected.len());
        }

        let mut report = SuiteReport {
            name: self.name.clone(),
            cases: Vec::new(),
        };
        for case in selected {
            let result = self.run_case(case, context, options.case_timeout).await;
            if options.print {
                print_case_report(&result, options.verbose);
            }
            report.cases.push(result);
        }

        if options.print {
            println!("\n{}", "=".repeat(self.name.len()));
            println!("{}", report.summary());
        }
        log::info!("{}: {}", self.name, report.summary());
        report
    }

    async fn run_case(
        &self,
        case: &Case<C>,
        context: &mut C,
        case_timeout: Option<Duration>,
    ) -> CaseReport {
        let start = Instant::now();
        let body = match &case.body {
            CaseBody::Skip(reason) => {
                return CaseReport {
                    name: case.name.clone(),
                    passed: true,
                    skipped: Some(reason.clone()),
                    duration: Duration::ZERO,
                    error: None,
                    assertions: Vec::new(),
                };
            }
            CaseBody::Run(body) => *body,
        };
        log::debug!("case '{}' starting", case.name);

        let mut assert = Assert::new();
        let run = async {
            if let Some(setup) = self.setup {
                setup(context)
                    .await
                    .map_err(|e| e.context("setup failed"))?;
            }
            body(context, &mut assert).await
        };
        let outcome = match case_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
            },
            None => run.await,
        };

        let error = outcome.err().map(|e| format!("{:#}", e));
        let passed = error.is_none() && assert.all_passed();
        if !passed {
            log::warn!("case '{}' failed", case.name);
        }
        CaseReport {
            name: case.name.clone(),
            passed,
            skipped: None,
            duration: start.elapsed(),
            error,
            assertions: assert.into_records(),
        }
    }
}

pub fn print_case_report(report: &CaseReport, verbose: bool) {
    if let Some(reason) = &report.skipped {
        println!("  [SKIP] {}", report.name);
        println!("         Reason: {}", reason);
        return;
    }
    let status = if report.passed { "[PASS]" } else { "[FAIL]" };
    println!("  {} {} ({:.0?})", status, report.name, report.duration);

    if let Some(error) = &report.error {
        println!("         Error: {}", error);
    }
    if verbose || !report.passed {
        for record in &report.assertions {
            if record.passed && !verbose {
                continue;
            }
            let marker = if record.passed { "|--" } else { "|XX" };
            println!("         {} {}", marker, record.message);
            if !record.passed {
                if let Some(expected) = &record.expected {
                    println!("             Expected: {}", truncate(expected, 60));
                }
                if let Some(actual) = &record.actual {
                    println!("             Actual:   {}", truncate(actual, 60));
                }
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        setups: u32,
        seen: Vec<&'static str>,
    }

    fn count_setup(ctx: &mut Counter) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            ctx.setups += 1;
            Ok(())
        }
        .boxed_local()
    }

    fn first<'a>(ctx: &'a mut Counter, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            ctx.seen.push("first");
            assert.ok(true, "always");
            assert.equal(1 + 1, 2, "math");
            Ok(())
        }
        .boxed_local()
    }

    fn failing_assertion<'a>(
        ctx: &'a mut Counter,
        assert: &'a mut Assert,
    ) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            ctx.seen.push("failing_assertion");
            assert.equal("a", "b", "letters");
            // Keeps going after a failed assertion.
            assert.ok(true, "after");
            Ok(())
        }
        .boxed_local()
    }

    fn erroring<'a>(ctx: &'a mut Counter, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            ctx.seen.push("erroring");
            if ctx.setups > 0 {
                anyhow::bail!("boom");
            }
            assert.ok(true, "never");
            Ok(())
        }
        .boxed_local()
    }

    fn sleepy<'a>(_: &'a mut Counter, _: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
        .boxed_local()
    }

    fn suite() -> Suite<Counter> {
        Suite::new("Counter")
            .setup(count_setup)
            .case("first", first)
            .case("failing assertion", failing_assertion)
            .skip("later", "not ready")
            .case("erroring", erroring)
    }

    #[tokio::test]
    async fn runs_cases_in_order_and_accounts() {
        let mut ctx = Counter::default();
        let report = suite().run(&mut ctx, &RunOptions::default()).await;

        assert_eq!(ctx.seen, ["first", "failing_assertion", "erroring"]);
        assert_eq!(ctx.setups, 3);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.summary(), "1/3 passed (1 skipped)");

        let failing = &report.cases[1];
        assert_eq!(failing.assertions.len(), 2);
        assert_eq!(failing.assertions[0].expected.as_deref(), Some("\"b\""));
        assert!(failing.error.is_none());

        assert_eq!(report.cases[3].error.as_deref(), Some("boom"));
        assert!(report.cases[3].assertions.is_empty());
    }

    #[tokio::test]
    async fn filter_selects_by_substring() {
        let mut ctx = Counter::default();
        let options = RunOptions {
            filter: Some("first".into()),
            ..RunOptions::default()
        };
        let report = suite().run(&mut ctx, &options).await;
        assert_eq!(report.cases.len(), 1);
        assert!(report.all_passed());
        assert_eq!(report.summary(), "1/1 passed");
    }

    #[tokio::test(start_paused = true)]
    async fn case_timeout_fails_the_case() {
        let mut ctx = Counter::default();
        let options = RunOptions {
            case_timeout: Some(Duration::from_millis(100)),
            ..RunOptions::default()
        };
        let report = Suite::new("slow")
            .case("sleepy", sleepy)
            .run(&mut ctx, &options)
            .await;
        let case = &report.cases[0];
        assert!(!case.passed);
        assert!(case.error.as_deref().unwrap().contains("timed out"));
        assert!(case.duration >= Duration::from_millis(100));
    }

    #[test]
    fn deep_equal_compares_structure() {
        let mut assert = Assert::new();
        assert!(assert.deep_equal(&vec!["a", "b"], &json!(["a", "b"]), "same shape"));
        assert!(!assert.deep_equal(&json!({"x": 1}), &json!({"x": 2}), "different"));
        assert!(!assert.all_passed());
        assert_eq!(assert.records().len(), 2);
    }
}
