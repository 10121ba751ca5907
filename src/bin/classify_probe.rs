//! One-off smoke test of the configured classifier: classifies a sample change
//! and logs the result. Never writes snapshots or reports.

use docs_monitor::classify::{build_classifier, ClassifiedChange, ClassifyRequest};
use docs_monitor::config::load_default;
use docs_monitor::detect::{ChangeKind, ChangeRecord};
use docs_monitor::snapshot::{fingerprint, Entry};
use docs_monitor::telemetry;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = load_default()?;
    // Safe diagnostics only: never log the key itself.
    info!(
        provider = %cfg.classifier.provider,
        enabled = cfg.classifier.enabled,
        model = %cfg.classifier.model,
        "classifier config loaded"
    );
    if !cfg.classifier.enabled {
        warn!("probe skipped: classifier is disabled in config");
        return Ok(());
    }

    let classifier = build_classifier(&cfg.classifier)?;

    let title = "Agent 13.9.0 released";
    let summary = "Drops support for kernel 3.10. Older agents reach end of life on 2025-12-31.";
    let mut entry = Entry::new(
        "https://docs.sysdig.com/en/release-notes/agent/13.9.0",
        fingerprint(&format!("{title}\n{summary}")),
    );
    entry.title = title.to_string();
    entry.summary = summary.to_string();
    let record = ChangeRecord {
        source: "agent".to_string(),
        kind: ChangeKind::New,
        old: None,
        new: entry,
    };

    let resp = classifier
        .classify(&ClassifyRequest::from_record(&record))
        .await?;
    let c = ClassifiedChange::from_response(record, resp);
    info!(
        provider = classifier.provider_name(),
        severity = %c.severity,
        summary = %c.summary,
        "probe finished"
    );
    Ok(())
}
