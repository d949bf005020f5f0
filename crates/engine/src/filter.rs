//! In-memory predicate evaluation over a cached entry snapshot.
//!
//! Filtering never touches the store: it narrows the latest snapshot for
//! instant search UX. A filter with every field unset (or a blank
//! description) is "no filter" and returns the input unchanged.

use chrono::NaiveDate;

use crate::{Category, Entry, EntryKind};

/// Criteria for narrowing a cached entry list.
///
/// All present criteria are AND-combined. Date bounds are inclusive on both
/// sides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Case-insensitive substring match on the description.
    pub description: Option<String>,
    pub kind: Option<EntryKind>,
    pub category: Option<Category>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EntryFilter {
    /// Returns `true` when no criterion is set.
    ///
    /// A blank (empty or whitespace-only) description counts as unset.
    pub fn is_blank(&self) -> bool {
        self.description
            .as_deref()
            .is_none_or(|text| text.trim().is_empty())
            && self.kind.is_none()
            && self.category.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Returns `true` if the entry satisfies every present criterion.
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(needle) = self.description.as_deref() {
            let needle = needle.trim();
            if !needle.is_empty()
                && !entry
                    .description
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(kind) = self.kind
            && entry.kind != kind
        {
            return false;
        }
        if let Some(category) = self.category
            && entry.category != category
        {
            return false;
        }
        if let Some(start) = self.start_date
            && entry.date < start
        {
            return false;
        }
        if let Some(end) = self.end_date
            && entry.date > end
        {
            return false;
        }
        true
    }
}

/// Narrows a snapshot to the entries matching the filter.
///
/// The result preserves snapshot order; filtering implies no sort. A blank
/// filter short-circuits to a copy of the full input.
pub fn filter_entries(entries: &[Entry], filter: &EntryFilter) -> Vec<Entry> {
    if filter.is_blank() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|entry| filter.matches(entry))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::MoneyCents;

    fn entry(id: i64, description: &str, kind: EntryKind, category: Category, date: &str) -> Entry {
        Entry {
            id,
            budget_id: 1,
            amount: MoneyCents::new(10_000),
            description: description.to_string(),
            kind,
            category,
            date: date.parse::<NaiveDate>().unwrap(),
            invoice: None,
            is_synced: false,
            remote_id: None,
            created_by_email: None,
            updated_by_email: None,
            updated_at: Utc::now(),
        }
    }

    fn snapshot() -> Vec<Entry> {
        vec![
            entry(
                1,
                "Weekly shop",
                EntryKind::Outcome,
                Category::Groceries,
                "2025-01-15",
            ),
            entry(
                2,
                "Refund",
                EntryKind::Income,
                Category::Groceries,
                "2025-01-15",
            ),
            entry(
                3,
                "Bus ticket",
                EntryKind::Outcome,
                Category::Transportation,
                "2025-02-01",
            ),
        ]
    }

    #[test]
    fn blank_filter_is_identity() {
        let entries = snapshot();
        assert_eq!(filter_entries(&entries, &EntryFilter::default()), entries);

        let blank_description = EntryFilter {
            description: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_entries(&entries, &blank_description), entries);
    }

    #[test]
    fn kind_and_category_are_and_combined() {
        let entries = snapshot();
        let filter = EntryFilter {
            kind: Some(EntryKind::Outcome),
            category: Some(Category::Groceries),
            ..Default::default()
        };
        let result = filter_entries(&entries, &filter);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
    }

    #[test]
    fn description_match_is_case_insensitive() {
        let entries = snapshot();
        let filter = EntryFilter {
            description: Some("weekly".to_string()),
            ..Default::default()
        };
        let result = filter_entries(&entries, &filter);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 1);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let entries = snapshot();
        let filter = EntryFilter {
            start_date: Some("2025-01-15".parse().unwrap()),
            end_date: Some("2025-01-15".parse().unwrap()),
            ..Default::default()
        };
        let result = filter_entries(&entries, &filter);
        assert_eq!(
            result.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let open_start = EntryFilter {
            end_date: Some("2025-01-31".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(filter_entries(&entries, &open_start).len(), 2);
    }

    #[test]
    fn result_preserves_snapshot_order() {
        let entries = snapshot();
        let filter = EntryFilter {
            kind: Some(EntryKind::Outcome),
            ..Default::default()
        };
        let ids: Vec<i64> = filter_entries(&entries, &filter)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
