//! Suites loaded from disk through to results

mod support;

use keyrun_common::{load_steps, CaseStatus, ExecutionFilter};
use keyrun_runner::{load_base_url, RunnerConfig};

use support::{run_suite, test_config, FakeBrowser};

const SUITE: &str = "\
Test Case ID,Step No,Keyword,Locator,Input Data,Expected Result,Execute,Priority
TC_LOGIN,2,InputText,#password,secret,,Y,High
TC_LOGIN,1,InputText,#username,alice,,Y,High
TC_LOGIN,3,Click,#submit,wait:#dashboard,,Y,High
TC_LOGIN,4,VerifyText,#welcome,Welcome,Greeting shown,Y,High
,,,,,,,
TC_SEARCH,1,InputText,#query,engineer,,N,Low
TC_SEARCH,2,Click,#search,,,N,Low
";

#[tokio::test]
async fn csv_suite_runs_flagged_cases() {
    let dir = tempfile::tempdir().unwrap();
    let suite = dir.path().join("keywords.csv");
    std::fs::write(&suite, SUITE).unwrap();

    let records = load_steps(&suite).unwrap();
    assert_eq!(records.len(), 6);

    let browser = FakeBrowser::new().with_text("#welcome", "Welcome, alice");
    let (outcome, _) = run_suite(
        &test_config(dir.path()),
        &browser,
        &records,
        &ExecutionFilter::new("Y", "high"),
    )
    .await;
    let summary = outcome.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.cases[0].status, CaseStatus::Passed);
    assert_eq!(summary.cases[0].steps.len(), 4);

    let calls = browser.calls();
    let order: Vec<&str> = calls.iter().map(|c| c.as_str()).skip(1).take(4).collect();
    assert_eq!(
        order,
        vec![
            "fill #username=alice",
            "fill #password=secret",
            "click #submit",
            "wait #dashboard",
        ]
    );
}

#[test]
fn config_file_and_base_url() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("keyrun.yaml");
    std::fs::write(
        &config_path,
        "url_file: url.txt\nsession_policy: per-case\nscreenshots:\n  policy: never\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("url.txt"), "https://hire.example.com\n").unwrap();

    let config = RunnerConfig::load_or_default(&config_path).unwrap();
    let url = load_base_url(&dir.path().join(&config.url_file)).unwrap();
    assert_eq!(url, "https://hire.example.com");
}
