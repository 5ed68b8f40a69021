use chrono::Local;
use pingboard_client::DashboardView;
use pingboard_common::protocol::HostRecord;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

pub(crate) const COLUMNS: [&str; 6] = ["IP", "Status", "RTT, ms", "Delivered", "Loss", "Last ping"];

const NOT_AVAILABLE: &str = "N/A";

pub(crate) fn rtt_cell(record: &HostRecord) -> String {
    match record.round_trip_ms {
        Some(rtt) => format!("{rtt:.1}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub(crate) fn pct_cell(value: f64) -> String {
    format!("{value:.1}%")
}

/// Local time, the way an operator reads it.
pub(crate) fn checked_cell(record: &HostRecord) -> String {
    match record.last_checked_at {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub(crate) fn cells(record: &HostRecord) -> [String; 6] {
    [
        record.address.clone(),
        record.status.to_string(),
        rtt_cell(record),
        pct_cell(record.delivered_pct),
        pct_cell(record.loss_pct),
        checked_cell(record),
    ]
}

/// Renders the whole view: status line, notices, then the host table.
/// Rows that differ from `previous` (the hosts of the last frame) are
/// marked with `*`.
pub(crate) fn view(view: &DashboardView, previous: Option<&[HostRecord]>) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "pingboard | {} hosts | push channel {}",
        view.hosts.len(),
        view.connection
    );
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {error}");
    }
    if let Some(success) = &view.success {
        let _ = writeln!(out, "+ {success}");
    }
    out.push('\n');

    if view.hosts.is_empty() {
        out.push_str("no hosts to show\n");
        return out;
    }

    let changed = changed_addresses(&view.hosts, previous);
    out.push_str(&render_table(&view.hosts, Some(&changed)));
    out
}

pub(crate) fn table(hosts: &[HostRecord]) -> String {
    render_table(hosts, None)
}

/// Addresses that are new or whose record changed since `previous`.
/// Nothing is marked on the first frame.
fn changed_addresses<'a>(
    hosts: &'a [HostRecord],
    previous: Option<&[HostRecord]>,
) -> HashSet<&'a str> {
    let Some(previous) = previous else {
        return HashSet::new();
    };

    let before: HashMap<&str, &HostRecord> =
        previous.iter().map(|r| (r.address.as_str(), r)).collect();

    hosts
        .iter()
        .filter(|r| before.get(r.address.as_str()).copied() != Some(r))
        .map(|r| r.address.as_str())
        .collect()
}

fn render_table(hosts: &[HostRecord], marks: Option<&HashSet<&str>>) -> String {
    let rows: Vec<[String; 6]> = hosts.iter().map(cells).collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let marker = |address: Option<&str>| match (marks, address) {
        (None, _) => "",
        (Some(marks), Some(address)) if marks.contains(address) => "* ",
        (Some(_), _) => "  ",
    };

    let mut out = String::new();
    write_row(&mut out, marker(None), &COLUMNS.map(str::to_string), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}{}", marker(None), rule.join("-+-"));
    for row in &rows {
        write_row(&mut out, marker(Some(row[0].as_str())), row, &widths);
    }
    out
}

fn write_row(out: &mut String, marker: &str, row: &[String; 6], widths: &[usize; 6]) {
    let padded: Vec<String> = row
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{marker}{}", padded.join(" | ").trim_end());
}
