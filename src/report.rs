// src/report.rs
//! # Report Assembler
//! Renders classified changes into the Markdown report. Pure: the same input
//! (same order) yields byte-identical output; the timestamp is the only
//! time-dependent part and it is passed in.
//!
//! Section headers are stable so downstream readers can grep for them:
//! `## 📡 <source>`, `### [<Severity>] <title>`, `## 📊 監視対象ステータス`, `## 📎 参考リンク`.

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt::Write as _;

use crate::catalog::{Catalog, SourceKind};
use crate::classify::{ClassifiedChange, Severity};
use crate::config::ReferenceLink;
use crate::detect::ChangeKind;
use crate::fetch::{truncate_chars, SourceStatus};

/// Executive summary when nothing changed. Never produced by the classifier.
pub const NO_CHANGES_SUMMARY: &str =
    "前回の監視以降、変更は検出されませんでした（no changes detected）。監視対象のドキュメントは安定しています。";

pub const HEADER_CHANGED: &str = "あり ⚠️";
pub const HEADER_UNCHANGED: &str = "なし ✓";

const FALLBACK_EXCERPT_CHARS: usize = 300;
const JST_OFFSET_SECS: i32 = 9 * 3600;

pub struct ReportInput<'a> {
    pub generated_at: DateTime<Utc>,
    pub title: &'a str,
    pub catalog: &'a Catalog,
    /// In detection order.
    pub changes: &'a [ClassifiedChange],
    /// Empty when the report is rebuilt from history (no fetch happened).
    pub statuses: &'a [SourceStatus],
    pub links: &'a [ReferenceLink],
}

/// Changes of one source, most severe first, detection order within a severity.
pub struct SourceSection<'a> {
    pub source: &'a str,
    pub changes: Vec<&'a ClassifiedChange>,
}

/// Group by source in catalog order; sources unknown to the catalog follow in first-seen order.
pub fn group_changes<'a>(
    catalog: &'a Catalog,
    changes: &'a [ClassifiedChange],
) -> Vec<SourceSection<'a>> {
    let mut order: Vec<&'a str> = catalog.sources().iter().map(|s| s.id.as_str()).collect();
    for c in changes {
        if !order.contains(&c.record.source.as_str()) {
            order.push(c.record.source.as_str());
        }
    }

    order
        .into_iter()
        .filter_map(|source| {
            let mut group: Vec<&ClassifiedChange> = changes
                .iter()
                .filter(|c| c.record.source == source)
                .collect();
            if group.is_empty() {
                return None;
            }
            // sort_by_key is stable: equal severities keep detection order.
            group.sort_by_key(|c| c.severity.rank());
            Some(SourceSection {
                source,
                changes: group,
            })
        })
        .collect()
}

/// Deterministic summary paragraph synthesized from counts.
pub fn executive_summary(sections: &[SourceSection<'_>]) -> String {
    let total: usize = sections.iter().map(|s| s.changes.len()).sum();
    if total == 0 {
        return NO_CHANGES_SUMMARY.to_string();
    }

    let count = |sev: Severity| {
        sections
            .iter()
            .flat_map(|s| s.changes.iter())
            .filter(|c| c.severity == sev)
            .count()
    };
    let names: Vec<&str> = sections.iter().map(|s| s.source).collect();

    let mut out = format!(
        "{} 件の変更を検出しました（対象: {}、{} ソース）。",
        total,
        names.join(", "),
        sections.len()
    );

    let breakdown: Vec<String> = Severity::ALL
        .iter()
        .filter_map(|&sev| {
            let n = count(sev);
            (n > 0).then(|| format!("{sev} {n} 件"))
        })
        .collect();
    let _ = write!(out, "重要度別の内訳は {} です。", breakdown.join("、"));

    if count(Severity::Critical) + count(Severity::High) > 0 {
        out.push_str("Critical / High の変更が含まれているため、内容を優先的に確認してください。");
    }
    let unknown = count(Severity::Unknown);
    if unknown > 0 {
        let _ = write!(
            out,
            "{unknown} 件は自動分類に失敗したため、原文を直接確認してください。"
        );
    }
    out
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).expect("JST offset in range");
    ts.with_timezone(&jst)
        .format("%Y年%m月%d日 %H:%M:%S (JST)")
        .to_string()
}

fn kind_label(kind: Option<SourceKind>) -> &'static str {
    match kind {
        Some(SourceKind::Feed) => "RSSフィード",
        Some(SourceKind::Page) => "Webページ",
        None => "ソース",
    }
}

fn change_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::New => "新規",
        ChangeKind::Updated => "更新",
    }
}

fn render_change(out: &mut String, c: &ClassifiedChange) {
    let entry = &c.record.new;
    let _ = writeln!(out, "### [{}] {}\n", c.severity, entry.label());
    let _ = writeln!(out, "- **種別:** {}", change_label(c.record.kind));
    if let Some(link) = &entry.link {
        let _ = writeln!(out, "- **リンク:** {link}");
    }
    if let Some(p) = &entry.published {
        let _ = writeln!(out, "- **公開日:** {p}");
    }
    out.push('\n');

    out.push_str("**概要:**\n");
    if !c.summary.is_empty() {
        let _ = writeln!(out, "{}\n", c.summary);
    } else {
        let raw = if entry.summary.is_empty() {
            &entry.text_preview
        } else {
            &entry.summary
        };
        if raw.is_empty() {
            out.push_str("（要約なし）\n\n");
        } else {
            let _ = writeln!(
                out,
                "（原文抜粋）{}\n",
                truncate_chars(raw, FALLBACK_EXCERPT_CHARS).replace('\n', " ")
            );
        }
    }

    if !c.impact.is_empty() {
        let _ = writeln!(out, "**お客様への影響:**\n{}\n", c.impact);
    }

    if !c.actions.is_empty() {
        out.push_str("**推奨アクション:**\n");
        for a in &c.actions {
            let _ = writeln!(out, "- {a}");
        }
        out.push('\n');
    }

    if let Some(note) = &c.note {
        let _ = writeln!(out, "> ⚠️ {note}\n");
    }
}

fn render_status(out: &mut String, catalog: &Catalog, st: &SourceStatus) {
    let kind = kind_label(catalog.get(&st.source).map(|s| s.kind));
    let detail = match (&st.error, &st.newest) {
        (Some(err), _) => format!("取得エラー（{err}）。前回の内容を維持しました"),
        (None, Some(newest)) => format!("正常に取得（{} 件、最新:「{newest}」）", st.entries),
        (None, None) => "正常に取得（エントリーなし）".to_string(),
    };
    let _ = writeln!(out, "- **{}**（{kind}）: {detail}", st.source);
}

/// Render the full report.
pub fn assemble(input: &ReportInput<'_>) -> String {
    let sections = group_changes(input.catalog, input.changes);
    let has_changes = !sections.is_empty();

    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", input.title);
    let _ = writeln!(
        out,
        "**レポート日時:** {}  ",
        format_timestamp(input.generated_at)
    );
    let _ = writeln!(
        out,
        "**変更検出:** {}\n",
        if has_changes {
            HEADER_CHANGED
        } else {
            HEADER_UNCHANGED
        }
    );
    out.push_str("---\n\n");

    out.push_str("## エグゼクティブサマリー\n\n");
    let _ = writeln!(out, "{}\n", executive_summary(&sections));
    out.push_str("---\n\n");

    for section in &sections {
        let kind = kind_label(input.catalog.get(section.source).map(|s| s.kind));
        let _ = writeln!(out, "## 📡 {}（{kind}）\n", section.source);
        for c in &section.changes {
            render_change(&mut out, c);
        }
    }

    if !input.statuses.is_empty() {
        out.push_str("## 📊 監視対象ステータス\n\n");
        for st in input.statuses {
            render_status(&mut out, input.catalog, st);
        }
        out.push('\n');
    }

    if !input.links.is_empty() {
        out.push_str("---\n\n## 📎 参考リンク\n\n");
        for l in input.links {
            let _ = writeln!(out, "- [{}]({})", l.label, l.url);
        }
        out.push('\n');
    }

    out.push_str("---\n\n*このレポートは自動生成されました*\n");
    out
}
