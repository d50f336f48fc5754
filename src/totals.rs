use crate::models::{Tab, TabPersonTotal};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Default)]
struct Running {
    total: f64,
    bill_count: u32,
}

/// Aggregates per-person balances across every bill in a tab.
///
/// Names are merged case-insensitively; the displayed name is rebuilt from
/// the lower-cased key with only its first character upper-cased, so the
/// original casing of later words is not preserved. Output is ordered by
/// descending total (highest balance first).
pub fn compute_tab_person_totals(tab: &Tab) -> Vec<TabPersonTotal> {
    let mut totals: BTreeMap<String, Running> = BTreeMap::new();

    for bill in &tab.bills {
        for share in &bill.person_shares {
            let entry = totals.entry(share.person_name.to_lowercase()).or_default();
            entry.total += share.total;
            // One increment per share, i.e. per bill the person appears in;
            // the backend never emits the same person twice in one bill.
            entry.bill_count += 1;
        }
    }

    let mut result: Vec<TabPersonTotal> = totals
        .into_iter()
        .map(|(key, running)| TabPersonTotal {
            person_name: display_name(&key),
            total: running.total,
            bill_count: running.bill_count,
        })
        .collect();

    result.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    result
}

fn display_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
