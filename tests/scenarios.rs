//! End-to-end scenarios through the engine on in-memory sources.
#![cfg(feature = "javascript")]

use pretty_assertions::assert_eq;

use sastline::config::Config;
use sastline::engine::{CancellationToken, DiagnosticKind, Engine, Report, ScanInput};
use sastline::ir::Language;
use sastline::rules::Severity;

const TABNABBING: &str = "f097.window_open_tabnabbing";
const JWT_SIGNING: &str = "f309.jwt_insecure_signing";
const JWT_DECODE: &str = "f309.jwt_decode_without_verify";

fn scan(inputs: Vec<ScanInput>) -> Report {
    let engine = Engine::new(&Config::default().scan).unwrap();
    engine.scan(inputs, &CancellationToken::new()).unwrap()
}

fn js(path: &str, src: &str) -> ScanInput {
    ScanInput::new(path, Language::JavaScript, src)
}

fn hits(report: &Report, rule_id: &str) -> usize {
    report.findings.iter().filter(|f| f.rule_id == rule_id).count()
}

#[test]
fn window_open_without_features_is_flagged_once() {
    let report = scan(vec![js(
        "open.js",
        "const url = \"https://partner.example.com/landing\";\nwindow.open(url, \"_blank\");\n",
    )]);
    let tabnabbing: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.rule_id == TABNABBING)
        .collect();
    assert_eq!(tabnabbing.len(), 1);

    let engine = Engine::new(&Config::default().scan).unwrap();
    let expected = engine.catalog().get(TABNABBING).unwrap().metadata.default_severity;
    assert_eq!(tabnabbing[0].severity, expected);
    assert_eq!(tabnabbing[0].severity, Severity::Low);
    assert_eq!(tabnabbing[0].location.line, 2);
}

#[test]
fn window_open_with_noopener_noreferrer_passes() {
    let report = scan(vec![js(
        "open.js",
        "const url = \"https://partner.example.com/landing\";\nwindow.open(url, \"_blank\", \"noopener,noreferrer\");\n",
    )]);
    assert_eq!(hits(&report, TABNABBING), 0);
}

#[test]
fn jwt_sign_with_none_algorithm() {
    let none = scan(vec![js(
        "token.js",
        "const jwt = require('jsonwebtoken');\nconst token = jwt.sign(payload, key, { algorithm: 'none' });\n",
    )]);
    assert_eq!(hits(&none, JWT_SIGNING), 1);

    let hs256 = scan(vec![js(
        "token.js",
        "const jwt = require('jsonwebtoken');\nconst token = jwt.sign(payload, key, { algorithm: 'HS256' });\n",
    )]);
    assert_eq!(hits(&hs256, JWT_SIGNING), 0);
}

#[test]
fn decode_needs_a_preceding_verify_in_the_same_function() {
    let unverified = scan(vec![js(
        "claims.js",
        "function claims(token, key, algos) {\n    return decode(token, key, algos);\n}\n",
    )]);
    assert_eq!(hits(&unverified, JWT_DECODE), 1);

    let verified = scan(vec![js(
        "claims.js",
        "function claims(token, key, algos, config) {\n    verify(token, key, config);\n    return decode(token, key, algos);\n}\n",
    )]);
    assert_eq!(hits(&verified, JWT_DECODE), 0);
}

#[test]
fn broken_file_among_valid_files_is_not_fatal() {
    let report = scan(vec![
        js(
            "a.js",
            "const url = 'https://a.example.com';\nwindow.open(url, '_blank');\n",
        ),
        js("broken.js", "const greeting = 'unterminated;\n"),
        js(
            "b.js",
            "const jwt = require('jsonwebtoken');\njwt.sign(claims, key, { algorithm: 'none' });\n",
        ),
    ]);

    let files: Vec<String> = report
        .findings
        .iter()
        .map(|f| f.location.file.display().to_string())
        .collect();
    assert_eq!(files, vec!["a.js".to_string(), "b.js".to_string()]);

    assert_eq!(report.diagnostics.len(), 1);
    let diag = &report.diagnostics[0];
    assert_eq!(diag.file.display().to_string(), "broken.js");
    assert_eq!(diag.kind, DiagnosticKind::SyntaxRecovered);
    assert!(!report.cancelled);
    assert_eq!(report.stats.files_scanned, 3);
    assert_eq!(report.stats.files_recovered, 1);
}
