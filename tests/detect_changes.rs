// tests/detect_changes.rs
use chrono::{TimeZone, Utc};
use docs_monitor::{detect, ChangeKind, Entry, Snapshot};

fn snap(sources: Vec<(&str, Vec<(&str, &str)>)>) -> Snapshot {
    let mut s = Snapshot::new(Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap());
    for (id, entries) in sources {
        s.insert(id, entries.into_iter().map(|(k, f)| Entry::new(k, f)).collect());
    }
    s
}

#[test]
fn appended_entry_is_reported_as_new() {
    let p = snap(vec![("feedA", vec![("x1", "h1")])]);
    let c = snap(vec![("feedA", vec![("x1", "h1"), ("x2", "h2")])]);

    let out = detect(Some(&p), &c);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source, "feedA");
    assert_eq!(out[0].kind, ChangeKind::New);
    assert_eq!(out[0].new.key, "x2");
    assert!(out[0].old.is_none());
}

#[test]
fn changed_fingerprint_is_reported_as_updated() {
    let p = snap(vec![("feedA", vec![("x1", "h1")])]);
    let c = snap(vec![("feedA", vec![("x1", "h2")])]);

    let out = detect(Some(&p), &c);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, ChangeKind::Updated);
    let old = out[0].old.as_ref().unwrap();
    assert_eq!((old.key.as_str(), old.fingerprint.as_str()), ("x1", "h1"));
    assert_eq!(
        (out[0].new.key.as_str(), out[0].new.fingerprint.as_str()),
        ("x1", "h2")
    );
}

#[test]
fn repeated_key_in_current_is_compared_per_occurrence() {
    let p = snap(vec![("feedA", vec![("x1", "h1")])]);
    let c = snap(vec![("feedA", vec![("x1", "h1"), ("x1", "h2")])]);

    let out = detect(Some(&p), &c);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, ChangeKind::Updated);
    assert_eq!(out[0].new.fingerprint, "h2");
    assert_eq!(out[0].old.as_ref().unwrap().fingerprint, "h1");
}

#[test]
fn bootstrap_reports_every_entry_as_new() {
    let c = snap(vec![
        ("agent", vec![("a1", "f1"), ("a2", "f2")]),
        ("deprecation", vec![("deprecation", "p1")]),
    ]);
    let out = detect(None, &c);
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|r| r.kind == ChangeKind::New));
}

#[test]
fn identical_snapshots_yield_nothing() {
    let p = snap(vec![("agent", vec![("a1", "f1")]), ("falco", vec![("r1", "g1")])]);
    let c = p.clone();
    assert!(detect(Some(&p), &c).is_empty());
}

#[test]
fn unchanged_entries_never_appear() {
    let p = snap(vec![("agent", vec![("a1", "f1"), ("a2", "f2"), ("a3", "f3")])]);
    let c = snap(vec![("agent", vec![("a1", "f1"), ("a2", "CHANGED"), ("a3", "f3"), ("a4", "f4")])]);
    let out = detect(Some(&p), &c);
    let keys: Vec<&str> = out
        .iter()
        .map(|r| r.new.key.as_str())
        .collect();
    assert_eq!(keys, vec!["a2", "a4"]);
}

#[test]
fn detect_is_idempotent() {
    let p = snap(vec![("agent", vec![("a1", "f1")])]);
    let c = snap(vec![("agent", vec![("a0", "f0"), ("a1", "f9")])]);
    assert_eq!(detect(Some(&p), &c), detect(Some(&p), &c));
}

#[test]
fn output_follows_current_source_and_entry_order() {
    let c = snap(vec![
        ("monitor", vec![("m2", "1"), ("m1", "1")]),
        ("agent", vec![("a1", "1")]),
        ("secure", vec![("s1", "1")]),
    ]);
    let out: Vec<(String, String)> = detect(None, &c)
        .into_iter()
        .map(|r| (r.source, r.new.key))
        .collect();
    let expected: Vec<(String, String)> = [
        ("monitor", "m2"),
        ("monitor", "m1"),
        ("agent", "a1"),
        ("secure", "s1"),
    ]
    .iter()
    .map(|(s, k)| (s.to_string(), k.to_string()))
    .collect();
    assert_eq!(out, expected);
}
