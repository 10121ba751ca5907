// tests/report_assembly.rs
use chrono::{TimeZone, Utc};
use docs_monitor::catalog::Catalog;
use docs_monitor::classify::{classify_all, ClassifiedChange, MockClassifier, Severity};
use docs_monitor::config::ReportConfig;
use docs_monitor::fetch::SourceStatus;
use docs_monitor::report::{assemble, ReportInput, HEADER_CHANGED, HEADER_UNCHANGED, NO_CHANGES_SUMMARY};
use docs_monitor::{ChangeKind, ChangeRecord, Entry};

fn record(source: &str, title: &str) -> ChangeRecord {
    let mut e = Entry::new(format!("https://docs.example.com/{title}"), format!("fp-{title}"));
    e.title = title.to_string();
    e.link = Some(e.key.clone());
    e.summary = format!("{title} summary");
    ChangeRecord {
        source: source.to_string(),
        kind: ChangeKind::New,
        old: None,
        new: e,
    }
}

fn render(changes: &[ClassifiedChange], statuses: &[SourceStatus], hour: u32) -> String {
    let report = ReportConfig::default();
    let catalog = Catalog::builtin();
    assemble(&ReportInput {
        generated_at: Utc.with_ymd_and_hms(2025, 10, 1, hour, 0, 0).unwrap(),
        title: &report.title,
        catalog: &catalog,
        changes,
        statuses,
        links: &report.links,
    })
}

fn pos(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` missing from report:\n{haystack}"))
}

#[tokio::test]
async fn changes_are_listed_most_severe_first() {
    let classifier = MockClassifier::default()
        .with_severity("alpha", "Low")
        .with_severity("beta", "Critical")
        .with_severity("gamma", "Medium");
    let classified = classify_all(
        &classifier,
        vec![
            record("agent", "alpha"),
            record("agent", "beta"),
            record("agent", "gamma"),
        ],
    )
    .await;
    let sevs: Vec<Severity> = classified.iter().map(|c| c.severity).collect();
    assert_eq!(sevs, vec![Severity::Low, Severity::Critical, Severity::Medium]);

    let text = render(&classified, &[], 0);
    let critical = pos(&text, "### [Critical] beta");
    let medium = pos(&text, "### [Medium] gamma");
    let low = pos(&text, "### [Low] alpha");
    assert!(critical < medium && medium < low);
    assert!(text.contains(HEADER_CHANGED));
}

#[tokio::test]
async fn sources_follow_catalog_order() {
    let classified = classify_all(
        &MockClassifier::default(),
        vec![record("falco", "rule"), record("agent", "release")],
    )
    .await;
    let text = render(&classified, &[], 0);
    assert!(pos(&text, "## 📡 agent") < pos(&text, "## 📡 falco"));
}

#[tokio::test]
async fn uncatalogued_sources_trail_in_first_seen_order() {
    let classified = classify_all(
        &MockClassifier::default(),
        vec![
            record("zeta_src", "one"),
            record("agent", "release"),
            record("alpha_src", "two"),
            record("zeta_src", "three"),
        ],
    )
    .await;
    let text = render(&classified, &[], 0);
    let agent = pos(&text, "## 📡 agent");
    let zeta = pos(&text, "## 📡 zeta_src（ソース）");
    let alpha = pos(&text, "## 📡 alpha_src（ソース）");
    assert!(agent < zeta && zeta < alpha);
    assert_eq!(text.matches("## 📡 zeta_src").count(), 1);
}

#[tokio::test]
async fn output_is_deterministic_apart_from_the_timestamp() {
    let classified = classify_all(
        &MockClassifier::default().with_severity("beta", "High"),
        vec![record("agent", "alpha"), record("secure", "beta")],
    )
    .await;
    let a = render(&classified, &[], 0);
    let b = render(&classified, &[], 0);
    assert_eq!(a, b);

    let later = render(&classified, &[], 5);
    assert_ne!(a, later);
    let strip = |s: &str| {
        s.lines()
            .filter(|l| !l.starts_with("**レポート日時:**"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip(&a), strip(&later));
}

#[test]
fn empty_change_list_renders_the_no_changes_report() {
    let statuses = vec![SourceStatus {
        source: "agent".into(),
        entries: 5,
        newest: Some("Agent 13.9.0".into()),
        error: None,
    }];
    let text = render(&[], &statuses, 0);
    assert!(text.contains(&format!("**変更検出:** {HEADER_UNCHANGED}")));
    assert!(text.contains(NO_CHANGES_SUMMARY));
    assert!(!text.contains("## 📡"));
    assert!(text.contains("## 📊 監視対象ステータス"));
    assert!(text.contains("## 📎 参考リンク"));
}

#[tokio::test]
async fn unknown_severity_token_becomes_medium_with_a_note() {
    let classified = classify_all(
        &MockClassifier::default().with_severity("alpha", "urgent!!"),
        vec![record("agent", "alpha")],
    )
    .await;
    assert_eq!(classified[0].severity, Severity::Medium);

    let text = render(&classified, &[], 0);
    assert!(text.contains("### [Medium] alpha"));
    assert!(text.contains("> ⚠️ 未知の重要度「urgent!!」を Medium として扱いました"));
}

#[tokio::test]
async fn failed_classification_keeps_the_change_with_a_placeholder() {
    let classified = classify_all(
        &MockClassifier::default().failing_on("beta"),
        vec![record("agent", "alpha"), record("agent", "beta")],
    )
    .await;
    assert_eq!(classified.len(), 2);
    assert_eq!(classified[0].severity, Severity::Low);
    assert_eq!(classified[1].severity, Severity::Unknown);

    let text = render(&classified, &[], 0);
    assert!(text.contains("### [Unknown] beta"));
    assert!(text.contains("分類に失敗しました"));
    assert!(text.contains("（原文抜粋）beta summary"));
    assert!(text.contains("自動分類に失敗"));
}

#[test]
fn failed_sources_are_flagged_in_the_status_section() {
    let statuses = vec![SourceStatus {
        source: "monitor".into(),
        entries: 0,
        newest: None,
        error: Some("HTTP 503".into()),
    }];
    let text = render(&[], &statuses, 0);
    assert!(text.contains("- **monitor**（RSSフィード）: 取得エラー（HTTP 503）"));
}
