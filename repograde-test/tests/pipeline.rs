//! End-to-end pipeline tests over an in-memory store with faked
//! external seams.

use std::sync::Arc;

use repograde_core::analyzer::RepoAnalyzer;
use repograde_core::config::ScannerSection;
use repograde_core::llm::Enricher;
use repograde_core::notify::Notifier;
use repograde_core::report;
use repograde_core::selection::create_selection;
use repograde_core::store::{AnalysisStore, SqliteStore};
use repograde_core::types::{AnalysisState, RepoId, SeverityCounts, UserId};
use repograde_core::{AnalysisPipeline, RepogradeError};

use repograde_test::{
    repository, seed_user, FakeChat, FakeGateway, RecordingNotifier,
};

struct Harness {
    store: Arc<SqliteStore>,
    selection_id: String,
    _tmp: tempfile::TempDir,
    clone_root: std::path::PathBuf,
}

const USER: UserId = UserId(1);

async fn harness(repo_ids: &[i64]) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let clone_root = tmp.path().to_path_buf();
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let repositories: Vec<_> = repo_ids
        .iter()
        .map(|id| repository(*id, &format!("octo/repo{id}")))
        .collect();
    seed_user(&store, &clone_root, USER, &repositories).await;

    let ids: Vec<RepoId> = repo_ids.iter().map(|id| RepoId(*id)).collect();
    let selection = create_selection(store.as_ref(), USER, &ids).await.unwrap();

    Harness {
        store,
        selection_id: selection.id,
        _tmp: tmp,
        clone_root,
    }
}

fn build_pipeline(
    harness: &Harness,
    gateway: FakeGateway,
    enricher: Option<Enricher>,
    notifier: Box<dyn Notifier>,
) -> AnalysisPipeline<FakeGateway> {
    let config = ScannerSection {
        clone_root: harness.clone_root.clone(),
        ..ScannerSection::default()
    };
    AnalysisPipeline::new(
        harness.store.clone() as Arc<dyn AnalysisStore>,
        RepoAnalyzer::new(gateway, config),
        enricher,
        notifier,
    )
}

fn clean_measures(project_key: &str) -> FakeGateway {
    FakeGateway::new().with_measures(project_key, &[("coverage", "80"), ("bugs", "2")])
}

#[tokio::test]
async fn clean_repository_scores_ninety_four() {
    let h = harness(&[1]).await;
    let pipeline = build_pipeline(
        &h,
        clean_measures("octo_repo1"),
        None,
        Box::new(RecordingNotifier::new()),
    );

    let result = pipeline.trigger(USER, &h.selection_id).await.unwrap();

    // coverage 80 → 1.6; bugs 2 → 16·log10(3)/2 ≈ 3.82; 100 − 5.42 → 94
    assert_eq!(result.overall_score, 94);
    assert_eq!(report::grade_letter(result.overall_score), "A+");

    let repo_result = &result.repo_results[0];
    assert!(repo_result.insights.contains("= 94"));
    assert_eq!(repo_result.project_measures["bugs"], "2");
    // 3 seeded commits over 10 days
    assert!((repo_result.commit_frequency - 0.3).abs() < 1e-9);

    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Complete);
}

#[tokio::test]
async fn lint_violations_compound_on_the_generic_score() {
    let h = harness(&[1]).await;
    let gateway = clean_measures("octo_repo1").with_violations(
        "octo_repo1",
        SeverityCounts {
            major: 3,
            ..Default::default()
        },
    );
    let pipeline = build_pipeline(&h, gateway, None, Box::new(RecordingNotifier::new()));

    let result = pipeline.trigger(USER, &h.selection_id).await.unwrap();

    // 94 minus 2.4·ln(4) ≈ 3.33, truncated: the lint penalty comes off
    // the already-penalized generic score.
    assert_eq!(result.overall_score, 90);
    // 90 sits below the A+ cutoff; bands are exclusive at the edge.
    assert_eq!(report::grade_letter(result.overall_score), "A");
    assert!(result.repo_results[0].insights.contains("MAJOR: 3"));
}

#[tokio::test]
async fn multi_repo_selection_aggregates() {
    let h = harness(&[1, 2]).await;
    let gateway = FakeGateway::new()
        .with_measures(
            "octo_repo1",
            &[
                ("coverage", "80"),
                ("bugs", "2"),
                ("ncloc_language_distribution", "xml=9"),
            ],
        )
        .with_measures(
            "octo_repo2",
            &[("coverage", "50"), ("code_smells", "99")],
        )
        .with_violations(
            "octo_repo2",
            SeverityCounts {
                blocker: 1,
                ..Default::default()
            },
        );
    let scanned = gateway.scanned_handle();
    let pipeline = build_pipeline(&h, gateway, None, Box::new(RecordingNotifier::new()));

    let result = pipeline.trigger(USER, &h.selection_id).await.unwrap();

    // repo1: 94. repo2: 100 − (4.0 + 12.0) = 84, then −6·ln(2) ≈ 4.16 → 79.
    assert_eq!(result.repo_results[0].score, 94);
    assert_eq!(result.repo_results[1].score, 79);
    // (94 + 79) / 2 truncated
    assert_eq!(result.overall_score, 86);

    // Sequential scans, selection order.
    assert_eq!(*scanned.lock().unwrap(), vec!["octo_repo1", "octo_repo2"]);

    // Ratios cover all counted lines and sum to 100.
    let total: f64 = result.language_ratios.values().sum();
    assert!((total - 100.0).abs() < 1e-9);
    assert!(result.language_ratios.contains_key("java"));
    assert!(result.language_ratios.contains_key("xml"));

    // Fixture seeds 5 stars, 3 commits, 1 PR, 1 issue per repo.
    assert_eq!(result.activity.total_stars, 10);
    assert_eq!(result.activity.total_commits, 6);
    assert_eq!(result.activity.total_prs, 2);
    assert_eq!(result.activity.total_issues, 2);
}

#[tokio::test]
async fn empty_local_line_count_keeps_reported_distribution() {
    let h = harness(&[1]).await;
    // No lint-language files on disk; the service-reported figure must
    // survive instead of being zeroed out.
    std::fs::remove_file(h.clone_root.join("octo_repo1/src/Main.java")).unwrap();

    let gateway = FakeGateway::new().with_measures(
        "octo_repo1",
        &[("ncloc_language_distribution", "java=1200;xml=100")],
    );
    let pipeline = build_pipeline(&h, gateway, None, Box::new(RecordingNotifier::new()));

    let result = pipeline.trigger(USER, &h.selection_id).await.unwrap();
    let languages = &result.repo_results[0].languages;
    assert_eq!(languages["java"], 1200);
    assert_eq!(languages["xml"], 100);
}

#[tokio::test]
async fn member_failure_fails_the_whole_run() {
    let h = harness(&[1, 2]).await;
    let gateway = FakeGateway::new().failing("octo_repo1");
    let scanned = gateway.scanned_handle();
    let pipeline = build_pipeline(&h, gateway, None, Box::new(RecordingNotifier::new()));

    let err = pipeline.trigger(USER, &h.selection_id).await.unwrap_err();
    assert!(matches!(err, RepogradeError::Scan(_)));

    // The second repository is never reached.
    assert_eq!(*scanned.lock().unwrap(), vec!["octo_repo1"]);

    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Fail);
    assert!(h.store.latest_result(&h.selection_id).await.unwrap().is_none());
}

#[tokio::test]
async fn rerun_appends_to_result_history() {
    let h = harness(&[1]).await;

    let first = build_pipeline(
        &h,
        clean_measures("octo_repo1"),
        None,
        Box::new(RecordingNotifier::new()),
    );
    first.trigger(USER, &h.selection_id).await.unwrap();

    // Second run with different measures; the working copy is reused.
    let second = build_pipeline(
        &h,
        FakeGateway::new().with_measures("octo_repo1", &[("coverage", "100")]),
        None,
        Box::new(RecordingNotifier::new()),
    );
    let rerun = second.trigger(USER, &h.selection_id).await.unwrap();
    assert_eq!(rerun.overall_score, 100);

    let results = h.store.list_results(&h.selection_id).await.unwrap();
    assert_eq!(results.len(), 2);
    let latest = h.store.latest_result(&h.selection_id).await.unwrap().unwrap();
    assert_eq!(latest.overall_score, 100);

    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Complete);
}

#[tokio::test]
async fn failed_run_can_be_retried_to_complete() {
    let h = harness(&[1]).await;

    let failing = build_pipeline(
        &h,
        FakeGateway::new().failing("octo_repo1"),
        None,
        Box::new(RecordingNotifier::new()),
    );
    failing.trigger(USER, &h.selection_id).await.unwrap_err();

    let retry = build_pipeline(
        &h,
        clean_measures("octo_repo1"),
        None,
        Box::new(RecordingNotifier::new()),
    );
    retry.trigger(USER, &h.selection_id).await.unwrap();

    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Complete);
}

#[tokio::test]
async fn enrichment_is_attached_to_the_result() {
    let h = harness(&[1]).await;
    let chat = FakeChat::answering(FakeChat::valid_enrichment_json());
    let exchanges = chat.exchanges_handle();
    let pipeline = build_pipeline(
        &h,
        clean_measures("octo_repo1"),
        Some(Enricher::new(Box::new(chat))),
        Box::new(RecordingNotifier::new()),
    );

    let result = pipeline.trigger(USER, &h.selection_id).await.unwrap();

    // One call; instructions ride the system message, the user message
    // carries only analysis data.
    let exchanges = exchanges.lock().unwrap();
    assert_eq!(exchanges.len(), 1);
    assert!(exchanges[0].system.contains("ONLY a JSON object"));
    assert!(exchanges[0].user.starts_with("Analysis data:"));
    assert!(!exchanges[0].user.contains("recruiter"));
    drop(exchanges);
    let enrichment = result.enrichment.unwrap();
    assert_eq!(enrichment.primary_role, "Backend Developer");
    assert_eq!(enrichment.role_scores, 82);
    assert_eq!(enrichment.ai_analysis.improvement_suggestions.len(), 2);

    // The persisted document carries the enrichment too.
    let stored = h.store.latest_result(&h.selection_id).await.unwrap().unwrap();
    assert!(stored.enrichment.is_some());
}

#[tokio::test]
async fn enrichment_failure_fails_the_run_without_a_result() {
    let h = harness(&[1]).await;
    let pipeline = build_pipeline(
        &h,
        clean_measures("octo_repo1"),
        Some(Enricher::new(Box::new(FakeChat::failing()))),
        Box::new(RecordingNotifier::new()),
    );

    let err = pipeline.trigger(USER, &h.selection_id).await.unwrap_err();
    assert!(matches!(err, RepogradeError::Llm(_)));

    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Fail);
    assert!(h.store.latest_result(&h.selection_id).await.unwrap().is_none());
}

#[tokio::test]
async fn completion_notification_carries_the_grade() {
    let h = harness(&[1]).await;
    h.store.set_device_token(USER, "device-42").await.unwrap();

    let notifier = RecordingNotifier::new();
    let sent = notifier.sent_handle();
    let pipeline = build_pipeline(&h, clean_measures("octo_repo1"), None, Box::new(notifier));

    pipeline.trigger(USER, &h.selection_id).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].device_token, "device-42");
    assert_eq!(sent[0].notification.title, "Analysis complete");
    assert!(sent[0].notification.body.contains(&h.selection_id));
    assert!(sent[0].notification.body.contains("94/100 (A+)"));
    // Clients deep-link off the structured field, not the body text.
    assert_eq!(sent[0].notification.selection_id, h.selection_id);
}

#[tokio::test]
async fn missing_device_token_skips_notification_quietly() {
    let h = harness(&[1]).await;
    let notifier = RecordingNotifier::new();
    let sent = notifier.sent_handle();
    let pipeline = build_pipeline(&h, clean_measures("octo_repo1"), None, Box::new(notifier));

    pipeline.trigger(USER, &h.selection_id).await.unwrap();

    assert!(sent.lock().unwrap().is_empty());
    let status = h
        .store
        .get_status(USER, &h.selection_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, AnalysisState::Complete);
}

#[tokio::test]
async fn scan_failure_is_not_notified() {
    let h = harness(&[1]).await;
    h.store.set_device_token(USER, "device-42").await.unwrap();

    let notifier = RecordingNotifier::new();
    let sent = notifier.sent_handle();
    let pipeline = build_pipeline(
        &h,
        FakeGateway::new().failing("octo_repo1"),
        None,
        Box::new(notifier),
    );

    pipeline.trigger(USER, &h.selection_id).await.unwrap_err();
    assert!(sent.lock().unwrap().is_empty());
}
