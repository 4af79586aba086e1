use std::fmt::Write as _;
use std::path::Path;

#[cfg(not(all(feature = "with-serde", feature = "with-csv")))]
use anyhow::bail;
use anyhow::{Context, Result};

use crate::args::{Cli, Format};
use mailprobe_lib::{BatchItem, BatchOutcome, Verdict};

/// One line of the machine-readable reports.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[cfg_attr(not(feature = "with-serde"), allow(dead_code))]
pub struct ReportRow<'a> {
    pub address: &'a str,
    pub status: &'static str,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub reason: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub verdict: Option<&'a Verdict>,
}

impl<'a> From<&'a BatchItem> for ReportRow<'a> {
    fn from(item: &'a BatchItem) -> Self {
        Self {
            address: &item.address,
            status: status_label(item),
            reason: match &item.outcome {
                BatchOutcome::Verified(verdict) => verdict.reason.as_ref().map(ToString::to_string),
                BatchOutcome::Failed { message } => Some(message.clone()),
                BatchOutcome::Cancelled => None,
            },
            verdict: item.verdict(),
        }
    }
}

fn status_label(item: &BatchItem) -> &'static str {
    match &item.outcome {
        BatchOutcome::Verified(verdict) if verdict.is_valid() => "valid",
        BatchOutcome::Verified(_) => "invalid",
        BatchOutcome::Cancelled => "cancelled",
        BatchOutcome::Failed { .. } => "failed",
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(items: &[BatchItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match &item.outcome {
                BatchOutcome::Verified(verdict) if verdict.is_valid() => summary.valid += 1,
                BatchOutcome::Verified(_) => summary.invalid += 1,
                BatchOutcome::Cancelled => summary.cancelled += 1,
                BatchOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn all_valid(&self) -> bool {
        self.valid == self.total
    }
}

pub fn write_report(items: &[BatchItem], cli: &Cli) -> Result<()> {
    match cli.format {
        Format::Human => emit(render_human(items, cli.transcript).as_bytes(), cli),
        Format::Json => write_json(items, cli),
        Format::Ndjson => write_ndjson(items, cli),
        Format::Csv => write_csv(items, cli),
    }
}

/// Per-address lines in input order, then the summary block.
pub fn render_human(items: &[BatchItem], transcript: bool) -> String {
    let mut out = String::new();
    for item in items {
        match &item.outcome {
            BatchOutcome::Verified(verdict) => {
                let _ = writeln!(out, "{verdict}");
                if transcript {
                    render_transcript(&mut out, verdict);
                }
            }
            BatchOutcome::Cancelled => {
                let _ = writeln!(out, "{} -> CANCELLED", item.address);
            }
            BatchOutcome::Failed { message } => {
                let _ = writeln!(out, "{} -> FAILED ({message})", item.address);
            }
        }
    }

    let summary = Summary::of(items);
    let _ = writeln!(out, "\n--- Summary ---");
    let _ = writeln!(out, "Total emails processed: {}", summary.total);
    let _ = writeln!(out, "Valid: {}", summary.valid);
    let _ = writeln!(out, "Invalid: {}", summary.invalid);
    if summary.cancelled > 0 {
        let _ = writeln!(out, "Cancelled: {}", summary.cancelled);
    }
    if summary.failed > 0 {
        let _ = writeln!(out, "Failed: {}", summary.failed);
    }
    out
}

fn render_transcript(out: &mut String, verdict: &Verdict) {
    for attempt in &verdict.attempts {
        match &attempt.address {
            Some(peer) => {
                let _ = writeln!(out, "    [{} {peer}] {}", attempt.exchange, attempt.outcome);
            }
            None => {
                let _ = writeln!(out, "    [{}] {}", attempt.exchange, attempt.outcome);
            }
        }
        for event in &attempt.events {
            for line in event.to_string().lines() {
                let _ = writeln!(out, "        {line}");
            }
        }
    }
}

#[cfg(feature = "with-serde")]
fn write_json(items: &[BatchItem], cli: &Cli) -> Result<()> {
    let rows: Vec<ReportRow<'_>> = items.iter().map(ReportRow::from).collect();
    let mut s = serde_json::to_string_pretty(&rows)?;
    s.push('\n');
    emit(s.as_bytes(), cli)
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_: &[BatchItem], _: &Cli) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(items: &[BatchItem], cli: &Cli) -> Result<()> {
    let mut buf = Vec::new();
    for item in items {
        let line = serde_json::to_string(&ReportRow::from(item))?;
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    emit(&buf, cli)
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_: &[BatchItem], _: &Cli) -> Result<()> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-csv")]
fn write_csv(items: &[BatchItem], cli: &Cli) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["address", "status", "reason", "mx_hosts", "hosts_tried"])?;
    for item in items {
        wtr.write_record(csv_record(item))?;
    }
    let data = wtr.into_inner()?;
    emit(&data, cli)
}

#[cfg(not(feature = "with-csv"))]
fn write_csv(_: &[BatchItem], _: &Cli) -> Result<()> {
    bail!("format=csv nécessite la feature 'with-csv'")
}

#[cfg(feature = "with-csv")]
fn csv_record(item: &BatchItem) -> [String; 5] {
    let row = ReportRow::from(item);
    let (mx_hosts, hosts_tried) = match row.verdict {
        Some(verdict) => (
            verdict
                .mx_hosts
                .iter()
                .map(|host| host.exchange.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            verdict.hosts_tried().join("|"),
        ),
        None => (String::new(), String::new()),
    };
    [
        row.address.to_string(),
        row.status.to_string(),
        row.reason.unwrap_or_default(),
        mx_hosts,
        hosts_tried,
    ]
}

fn emit(bytes: &[u8], cli: &Cli) -> Result<()> {
    use std::io::Write;

    match &cli.out {
        Some(path) => write_all_atomically(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
