use anyhow::{Context, Result};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::gateway::WebSearchGateway;
use crate::search::{SearchRequest, SearchResult};

/// Pause between live cases so the upstream rate limiter is not tripped.
pub const CASE_DELAY: Duration = Duration::from_secs(2);

const SAMPLE_SOURCES: usize = 3;
const SINGLE_QUERY_SOURCES: usize = 5;
const SINGLE_QUERY_PREVIEW_CHARS: usize = 500;
const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCase {
    pub name: &'static str,
    pub query: &'static str,
    pub expect_sources: bool,
}

pub const DEFAULT_CASES: [TestCase; 4] = [
    TestCase {
        name: "English current events",
        query: "What happened in tech news today?",
        expect_sources: true,
    },
    TestCase {
        name: "Chinese current events",
        query: "今天有什么重要新闻？",
        expect_sources: true,
    },
    TestCase {
        name: "Technology topic",
        query: "What are the latest developments in AI?",
        expect_sources: true,
    },
    TestCase {
        name: "Specific company",
        query: "What is SpaceX doing recently?",
        expect_sources: true,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub name: String,
    pub query: String,
    pub passed: bool,
    pub duration: Duration,
    pub text_len: usize,
    pub sources_count: usize,
    pub issues: Vec<String>,
    pub error: Option<String>,
}

/// Accumulates case outcomes; each step takes the report and hands it back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn record(mut self, outcome: CaseOutcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }

    /// Mean duration and source count over passed cases.
    pub fn averages(&self) -> Option<(Duration, f64)> {
        let passed: Vec<&CaseOutcome> = self.outcomes.iter().filter(|o| o.passed).collect();
        if passed.is_empty() {
            return None;
        }
        let count = passed.len() as u32;
        let duration = passed.iter().map(|o| o.duration).sum::<Duration>() / count;
        let sources = passed.iter().map(|o| o.sources_count).sum::<usize>() as f64 / count as f64;
        Some((duration, sources))
    }
}

pub fn evaluate(case: &TestCase, result: &SearchResult) -> Vec<String> {
    let mut issues = Vec::new();
    if result.answer.is_empty() {
        issues.push("No text returned".to_string());
    }
    if case.expect_sources && result.sources.is_empty() {
        issues.push("Expected sources but got none".to_string());
    }
    issues
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub async fn run_case<G>(
    gateway: &G,
    cfg: &Config,
    case: &TestCase,
    position: (usize, usize),
    report: SuiteReport,
    out: &mut impl Write,
) -> Result<SuiteReport>
where
    G: WebSearchGateway + ?Sized,
{
    let (index, total) = position;
    writeln!(out, "\nTest {}/{}: {}", index + 1, total, case.name)?;
    writeln!(out, "Query: \"{}\"", case.query)?;

    let request = SearchRequest::from_config(cfg, case.query)?;
    let started = Instant::now();
    let outcome = match gateway.search(&request).await {
        Ok(result) => {
            let duration = started.elapsed();
            let issues = evaluate(case, &result);
            let passed = issues.is_empty();
            let text_len = result.answer.chars().count();
            let sources_count = result.sources.len();

            if passed {
                writeln!(out, "PASSED ({:.2}s)", duration.as_secs_f64())?;
                writeln!(out, "   - Text length: {text_len} characters")?;
                writeln!(out, "   - Sources: {sources_count}")?;
            } else {
                writeln!(out, "FAILED ({:.2}s)", duration.as_secs_f64())?;
                for issue in &issues {
                    writeln!(out, "   - {issue}")?;
                }
            }

            if sources_count > 0 {
                writeln!(out, "   - Sample sources:")?;
                for (idx, source) in result.url_sources().take(SAMPLE_SOURCES).enumerate() {
                    writeln!(out, "     {}. {}", idx + 1, source.url)?;
                }
                if sources_count > SAMPLE_SOURCES {
                    writeln!(out, "     ... and {} more", sources_count - SAMPLE_SOURCES)?;
                }
            }

            CaseOutcome {
                name: case.name.to_string(),
                query: case.query.to_string(),
                passed,
                duration,
                text_len,
                sources_count,
                issues,
                error: None,
            }
        }
        Err(err) => {
            let duration = started.elapsed();
            let message = format!("{err:#}");
            writeln!(out, "FAILED ({:.2}s)", duration.as_secs_f64())?;
            writeln!(out, "   - Error: {message}")?;

            CaseOutcome {
                name: case.name.to_string(),
                query: case.query.to_string(),
                passed: false,
                duration,
                text_len: 0,
                sources_count: 0,
                issues: Vec::new(),
                error: Some(message),
            }
        }
    };
    debug!(case = case.name, passed = outcome.passed, "self-test case finished");

    Ok(report.record(outcome))
}

/// Runs every case in order, pausing `delay` between consecutive cases.
pub async fn run_suite<G>(
    gateway: &G,
    cfg: &Config,
    cases: &[TestCase],
    delay: Duration,
    out: &mut impl Write,
) -> Result<SuiteReport>
where
    G: WebSearchGateway + ?Sized,
{
    cfg.api_key()?;

    writeln!(out, "Grok web search self-test\n")?;
    writeln!(out, "Model: {}", cfg.model)?;
    writeln!(out, "Total Tests: {}\n", cases.len())?;
    writeln!(out, "{}", rule())?;

    let mut report = SuiteReport::default();
    for (index, case) in cases.iter().enumerate() {
        report = run_case(gateway, cfg, case, (index, cases.len()), report, out).await?;

        if index + 1 < cases.len() {
            writeln!(
                out,
                "\nWaiting {} seconds before next test...",
                delay.as_secs()
            )?;
            out.flush().context("Failed to flush stdout")?;
            tokio::time::sleep(delay).await;
        }
    }

    print_summary(&report, out)?;
    info!(
        total = report.total(),
        passed = report.passed(),
        failed = report.failed(),
        "self-test suite finished"
    );
    Ok(report)
}

pub fn print_summary(report: &SuiteReport, out: &mut impl Write) -> Result<()> {
    let total = report.total();
    writeln!(out, "\n{}", rule())?;
    writeln!(out, "\nTest Summary\n")?;
    writeln!(out, "Total Tests: {total}")?;
    writeln!(
        out,
        "Passed: {} ({:.1}%)",
        report.passed(),
        percent(report.passed(), total)
    )?;
    writeln!(
        out,
        "Failed: {} ({:.1}%)",
        report.failed(),
        percent(report.failed(), total)
    )?;

    if let Some((duration, sources)) = report.averages() {
        writeln!(out, "\nPerformance Metrics (successful tests):")?;
        writeln!(out, "   - Average duration: {:.2}s", duration.as_secs_f64())?;
        writeln!(out, "   - Average sources: {sources:.1}")?;
    }

    if report.failed() > 0 {
        writeln!(out, "\nFailed Tests:")?;
        for (idx, outcome) in report.failures().enumerate() {
            writeln!(out, "\n{}. {}", idx + 1, outcome.name)?;
            writeln!(out, "   Query: \"{}\"", outcome.query)?;
            if let Some(error) = &outcome.error {
                writeln!(out, "   Error: {error}")?;
            }
            for issue in &outcome.issues {
                writeln!(out, "   - {issue}")?;
            }
        }
    }

    writeln!(out, "\n{}", rule())?;
    Ok(())
}

/// Runs one ad-hoc query and prints a shortened report of it.
pub async fn run_single_query<G>(
    gateway: &G,
    cfg: &Config,
    query: &str,
    out: &mut impl Write,
) -> Result<SearchResult>
where
    G: WebSearchGateway + ?Sized,
{
    let request = SearchRequest::from_config(cfg, query)?;

    writeln!(out, "Single Query Test\n")?;
    writeln!(out, "Model: {}", cfg.model)?;
    writeln!(out, "Query: \"{query}\"\n")?;

    let started = Instant::now();
    let result = gateway.search(&request).await.with_context(|| {
        format!(
            "Failed ({:.2}s)",
            started.elapsed().as_secs_f64()
        )
    })?;
    let duration = started.elapsed();

    writeln!(out, "Success ({:.2}s)\n", duration.as_secs_f64())?;
    writeln!(out, "Answer:\n")?;
    let text_len = result.answer.chars().count();
    let preview: String = result
        .answer
        .chars()
        .take(SINGLE_QUERY_PREVIEW_CHARS)
        .collect();
    if text_len > SINGLE_QUERY_PREVIEW_CHARS {
        writeln!(out, "{preview}...\n")?;
    } else {
        writeln!(out, "{preview}\n")?;
    }

    let sources_count = result.sources.len();
    if sources_count > 0 {
        writeln!(out, "\nSources ({sources_count} total):\n")?;
        for (idx, source) in result.url_sources().take(SINGLE_QUERY_SOURCES).enumerate() {
            writeln!(out, "{}. {}", idx + 1, source.url)?;
        }
        if sources_count > SINGLE_QUERY_SOURCES {
            writeln!(out, "... and {} more", sources_count - SINGLE_QUERY_SOURCES)?;
        }
    } else {
        writeln!(out, "\nNo sources returned")?;
    }

    writeln!(out, "\nDuration: {:.2}s", duration.as_secs_f64())?;
    writeln!(out, "Text length: {text_len} characters")?;
    writeln!(out, "Sources: {sources_count}")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::{
        CaseOutcome, DEFAULT_CASES, SuiteReport, TestCase, evaluate, run_single_query, run_suite,
    };
    use crate::config::Config;
    use crate::error::SearchError;
    use crate::gateway::{WebSearchFuture, WebSearchGateway};
    use crate::search::{SearchRequest, SearchResult, SourceRef};

    struct ScriptedGateway {
        queries: RefCell<Vec<String>>,
        replies: RefCell<VecDeque<Result<SearchResult, String>>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<SearchResult, String>>) -> Self {
            Self {
                queries: RefCell::new(Vec::new()),
                replies: RefCell::new(replies.into()),
            }
        }
    }

    impl WebSearchGateway for ScriptedGateway {
        fn search<'a>(&'a self, request: &'a SearchRequest) -> WebSearchFuture<'a> {
            self.queries.borrow_mut().push(request.query.clone());
            let reply = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".to_string()));
            Box::pin(async move { reply.map_err(|message| anyhow!(message)) })
        }
    }

    fn keyed_config() -> Config {
        Config::from_env_with(|key| (key == "XAI_API_KEY").then(|| "xai-test".to_string()))
    }

    fn answer_with_sources(count: usize) -> SearchResult {
        SearchResult {
            answer: "Plenty happened.".to_string(),
            sources: (0..count)
                .map(|idx| SourceRef::url(format!("https://news.example/{idx}"), None))
                .collect(),
        }
    }

    fn outcome(passed: bool, secs: u64, sources_count: usize) -> CaseOutcome {
        CaseOutcome {
            name: "case".to_string(),
            query: "query".to_string(),
            passed,
            duration: Duration::from_secs(secs),
            text_len: 10,
            sources_count,
            issues: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn evaluate_flags_missing_text_and_sources() {
        let case = TestCase {
            name: "n",
            query: "q",
            expect_sources: true,
        };
        let issues = evaluate(&case, &SearchResult::default());
        assert_eq!(
            issues,
            vec![
                "No text returned".to_string(),
                "Expected sources but got none".to_string(),
            ]
        );
        assert!(evaluate(&case, &answer_with_sources(1)).is_empty());
    }

    #[test]
    fn evaluate_allows_missing_sources_when_not_expected() {
        let case = TestCase {
            name: "n",
            query: "q",
            expect_sources: false,
        };
        let result = SearchResult {
            answer: "text".to_string(),
            sources: Vec::new(),
        };
        assert!(evaluate(&case, &result).is_empty());
    }

    #[test]
    fn report_averages_only_passed_cases() {
        let report = SuiteReport::default()
            .record(outcome(true, 2, 4))
            .record(outcome(false, 10, 0))
            .record(outcome(true, 4, 2));

        assert_eq!(report.total(), 3);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        let (duration, sources) = report.averages().expect("averages should exist");
        assert_eq!(duration, Duration::from_secs(3));
        assert!((sources - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_has_no_averages_without_passes() {
        let report = SuiteReport::default().record(outcome(false, 1, 0));
        assert!(report.averages().is_none());
    }

    #[tokio::test]
    async fn suite_runs_cases_in_order_and_records_failures() {
        let gateway = ScriptedGateway::new(vec![
            Ok(answer_with_sources(5)),
            Ok(answer_with_sources(0)),
            Err("rate limited".to_string()),
            Ok(answer_with_sources(1)),
        ]);
        let mut out = Vec::new();

        let report = run_suite(
            &gateway,
            &keyed_config(),
            &DEFAULT_CASES,
            Duration::ZERO,
            &mut out,
        )
        .await
        .expect("suite should run");

        let expected_queries: Vec<String> = DEFAULT_CASES
            .iter()
            .map(|case| case.query.to_string())
            .collect();
        assert_eq!(*gateway.queries.borrow(), expected_queries);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(
            report.outcomes[1].issues,
            vec!["Expected sources but got none".to_string()]
        );
        assert_eq!(report.outcomes[2].error.as_deref(), Some("rate limited"));

        let stdout = String::from_utf8(out).expect("output should be utf-8");
        assert_eq!(stdout.matches("before next test").count(), 3);
        assert!(stdout.contains("... and 2 more"), "unexpected output:\n{stdout}");
        assert!(stdout.contains("Passed: 2 (50.0%)"), "unexpected output:\n{stdout}");
        assert!(stdout.contains("Error: rate limited"), "unexpected output:\n{stdout}");
    }

    #[tokio::test]
    async fn suite_requires_api_key() {
        let gateway = ScriptedGateway::new(Vec::new());
        let cfg = Config::from_env_with(|_| None);
        let mut out = Vec::new();

        let err = run_suite(&gateway, &cfg, &DEFAULT_CASES, Duration::ZERO, &mut out)
            .await
            .expect_err("suite should fail without a key");

        assert!(matches!(
            err.downcast_ref::<SearchError>(),
            Some(SearchError::Configuration)
        ));
        assert!(gateway.queries.borrow().is_empty());
    }

    #[tokio::test]
    async fn single_query_truncates_long_answers() {
        let long_answer = "x".repeat(600);
        let gateway = ScriptedGateway::new(vec![Ok(SearchResult {
            answer: long_answer,
            sources: (0..7)
                .map(|idx| SourceRef::url(format!("https://s.example/{idx}"), None))
                .collect(),
        })]);
        let mut out = Vec::new();

        let result = run_single_query(&gateway, &keyed_config(), "spacex", &mut out)
            .await
            .expect("query should succeed");

        assert_eq!(result.sources.len(), 7);
        let stdout = String::from_utf8(out).expect("output should be utf-8");
        assert!(stdout.contains(&format!("{}...", "x".repeat(500))));
        assert!(!stdout.contains(&"x".repeat(501)));
        assert!(stdout.contains("5. https://s.example/4"));
        assert!(!stdout.contains("6. https://s.example/5"));
        assert!(stdout.contains("... and 2 more"));
        assert!(stdout.contains("Text length: 600 characters"));
    }

    #[tokio::test]
    async fn single_query_propagates_service_errors() {
        let gateway = ScriptedGateway::new(vec![Err("unauthorized".to_string())]);
        let mut out = Vec::new();

        let err = run_single_query(&gateway, &keyed_config(), "q", &mut out)
            .await
            .expect_err("query should fail");

        let msg = format!("{err:#}");
        assert!(msg.contains("unauthorized"), "unexpected message: {msg}");
        assert!(msg.starts_with("Failed ("), "unexpected message: {msg}");
    }
}
