use std::time::Duration;

use bengkel_queue::{
    ai::{invoice, Gate, Scanner},
    config,
};

#[tokio::test]
async fn brake_complaint_is_admissible_without_inference() {
    let verdict = Gate::new(None).classify("rem belakang bunyi").await;

    assert!(verdict.admissible);
    assert_eq!(verdict.estimated_mins, 30);
}

#[tokio::test]
async fn keyword_match_is_case_insensitive() {
    let verdict = Gate::new(None).classify("REM blong, tolong cek").await;
    assert!(verdict.admissible);
}

#[tokio::test]
async fn small_talk_is_inadmissible_without_inference() {
    let verdict = Gate::new(None).classify("apa kabar").await;

    assert!(!verdict.admissible);
    assert!(!verdict.summary.is_empty());
}

#[tokio::test]
async fn endpoint_failure_activates_the_fallback() {
    // Port 9 (discard) is never listening; the request fails fast and the
    // keyword heuristic takes over.
    let gate = Gate::new(Some(config::Inference {
        chat_url: "http://127.0.0.1:9/api/chat".to_string(),
        invoice_url: "http://127.0.0.1:9/api/analyze-invoice".to_string(),
        api_key: "test".to_string(),
        timeout: Duration::from_secs(1),
    }));

    let verdict = gate.classify("ganti oli mesin").await;
    assert!(verdict.admissible);
    assert_eq!(verdict.estimated_mins, 30);

    let verdict = gate.classify("apa kabar").await;
    assert!(!verdict.admissible);
}

#[tokio::test]
async fn scanner_reports_missing_configuration() {
    let err = Scanner::new(None)
        .scan("aGVsbG8=", "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, invoice::Error::NotConfigured));
}
