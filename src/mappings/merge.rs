//! Merging freshly harvested values with previously mapped entries.

use super::MappingEntry;
use std::collections::BTreeMap;

/// Frequency counter for harvested metadata values.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    counts: BTreeMap<String, u32>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of a value.
    pub fn add(&mut self, name: impl Into<String>) {
        *self.counts.entry(name.into()).or_insert(0) += 1;
    }

    /// Count one occurrence of each value in a list.
    pub fn add_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add(name);
        }
    }

    /// All values with their counts, most frequent first, ties by name.
    pub fn most_common(&self) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> =
            self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }
}

/// Build the merged list entry for one value.
///
/// A value seen in this batch (`frequency > 0`) reuses its previous mapping
/// when one exists; new data for it wins over previous data field by field.
/// A value not seen in this batch survives only if its previous mapping
/// actually mapped something.
pub fn make_entry(
    name: &str,
    entry: Option<MappingEntry>,
    frequency: u32,
    previous: Option<MappingEntry>,
) -> Option<MappingEntry> {
    if frequency > 0 {
        let merged = match entry {
            None => match previous {
                Some(mut prev) => {
                    prev.frequency = frequency;
                    prev
                }
                None => MappingEntry::new(name, frequency),
            },
            Some(mut entry) => {
                entry.name = name.to_string();
                entry.frequency = frequency;
                if let Some(prev) = previous {
                    entry.fill_from(&prev);
                }
                entry
            }
        };
        return Some(merged);
    }
    previous.filter(|prev| prev.is_mapped())
}

/// Merge a batch's (value, frequency) list with an existing mapping list.
///
/// Returns the new mapping data as (frequency, entry) tuples plus the
/// previously mapped entries that this batch no longer uses.
pub fn merge_mappings(
    need_mapping: Vec<(String, Option<MappingEntry>, u32)>,
    old_mapping: Vec<MappingEntry>,
) -> (Vec<(u32, MappingEntry)>, Vec<MappingEntry>) {
    // reset frequencies and key by name
    let mut previous: BTreeMap<String, MappingEntry> = BTreeMap::new();
    for mut entry in old_mapping {
        entry.frequency = 0;
        previous.insert(entry.name.clone(), entry);
    }

    let mut new_mapping = Vec::new();
    for (name, entry, freq) in need_mapping {
        let prev = previous.remove(&name);
        if let Some(merged) = make_entry(&name, entry, freq, prev) {
            new_mapping.push((freq, merged));
        }
    }

    let preserved = previous
        .into_values()
        .filter_map(|prev| make_entry(&prev.name.clone(), None, 0, Some(prev)))
        .collect();

    (new_mapping, preserved)
}

/// Merge several counters against one existing mapping list, one table each.
///
/// Used when several value types share a single list page as separate
/// tables. An old entry is preserved only when no table uses it.
pub fn merge_mapping_tables(
    need_mapping: &BTreeMap<String, Counter>,
    old_mapping: &[MappingEntry],
) -> (
    BTreeMap<String, Vec<(u32, MappingEntry)>>,
    Vec<MappingEntry>,
) {
    let mut merged_data = BTreeMap::new();
    let mut preserved_data: Option<BTreeMap<String, MappingEntry>> = None;

    for (section, counter) in need_mapping {
        let need = counter
            .most_common()
            .into_iter()
            .map(|(name, freq)| (name, None, freq))
            .collect();
        let (merged, preserved) = merge_mappings(need, old_mapping.to_vec());
        merged_data.insert(section.clone(), merged);

        let preserved_names: Vec<&str> =
            preserved.iter().map(|e| e.name.as_str()).collect();
        match preserved_data.as_mut() {
            None => {
                preserved_data = Some(
                    preserved
                        .into_iter()
                        .map(|e| (e.name.clone(), e))
                        .collect(),
                );
            }
            Some(kept) => {
                kept.retain(|name, _| preserved_names.contains(&name.as_str()));
            }
        }
    }

    let preserved = preserved_data
        .map(|kept| kept.into_values().collect())
        .unwrap_or_default();
    (merged_data, preserved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(name: &str, category: &str) -> MappingEntry {
        let mut entry = MappingEntry::new(name, 0);
        entry.category = vec![category.to_string()];
        entry
    }

    // ---- Counter ----

    #[test]
    fn counter_orders_by_count_then_name() {
        let mut counter = Counter::new();
        counter.add_all(["b", "a", "b", "c"]);
        assert_eq!(
            counter.most_common(),
            vec![
                ("b".to_string(), 2),
                ("a".to_string(), 1),
                ("c".to_string(), 1),
            ]
        );
    }

    // ---- make_entry ----

    #[test]
    fn make_entry_fresh() {
        let result = make_entry("new name", None, 4, None);
        assert_eq!(result, Some(MappingEntry::new("new name", 4)));
    }

    #[test]
    fn make_entry_reuses_previous() {
        let previous = mapped("known", "Cat");
        let result = make_entry("known", None, 7, Some(previous)).expect("entry");
        assert_eq!(result.frequency, 7);
        assert_eq!(result.category, vec!["Cat".to_string()]);
    }

    #[test]
    fn make_entry_data_wins_over_previous() {
        let mut entry = MappingEntry::default();
        entry.creator = "New creator".to_string();
        let mut previous = mapped("known", "Cat");
        previous.creator = "Old creator".to_string();

        let result = make_entry("known", Some(entry), 2, Some(previous)).expect("entry");
        assert_eq!(result.name, "known");
        assert_eq!(result.creator, "New creator");
        assert_eq!(result.category, vec!["Cat".to_string()]);
    }

    #[test]
    fn make_entry_unused_and_unmapped_is_dropped() {
        let previous = MappingEntry::new("stale", 3);
        assert_eq!(make_entry("stale", None, 0, Some(previous)), None);
        assert_eq!(make_entry("unknown", None, 0, None), None);
    }

    #[test]
    fn make_entry_unused_but_mapped_is_kept() {
        let previous = mapped("stale", "Cat");
        let result = make_entry("stale", None, 0, Some(previous.clone()));
        assert_eq!(result, Some(previous));
    }

    // ---- merge_mappings ----

    #[test]
    fn merge_matches_and_preserves() {
        let old = vec![mapped("seen", "Cat A"), mapped("unseen", "Cat B")];
        let need = vec![
            ("seen".to_string(), None, 3),
            ("fresh".to_string(), None, 1),
        ];
        let (new_mapping, preserved) = merge_mappings(need, old);

        assert_eq!(new_mapping.len(), 2);
        assert_eq!(new_mapping[0].0, 3);
        assert_eq!(new_mapping[0].1.name, "seen");
        assert_eq!(new_mapping[0].1.category, vec!["Cat A".to_string()]);
        assert_eq!(new_mapping[1].1, MappingEntry::new("fresh", 1));

        assert_eq!(preserved.len(), 1);
        assert_eq!(preserved[0].name, "unseen");
    }

    #[test]
    fn merge_drops_stale_unmapped_entries() {
        let old = vec![MappingEntry::new("stale", 9)];
        let (new_mapping, preserved) = merge_mappings(Vec::new(), old);
        assert!(new_mapping.is_empty());
        assert!(preserved.is_empty());
    }

    // ---- merge_mapping_tables ----

    #[test]
    fn table_merge_preserves_intersection() {
        // "shared" is unused by both tables, "taken" only by the second
        let old = vec![mapped("shared", "Cat A"), mapped("taken", "Cat B")];

        let mut first = Counter::new();
        first.add("fresh");
        let mut second = Counter::new();
        second.add("taken");

        let mut need = BTreeMap::new();
        need.insert("first".to_string(), first);
        need.insert("second".to_string(), second);

        let (merged, preserved) = merge_mapping_tables(&need, &old);

        assert_eq!(merged["first"].len(), 1);
        assert_eq!(merged["first"][0].1.name, "fresh");
        assert_eq!(merged["second"][0].1.name, "taken");
        assert_eq!(merged["second"][0].1.category, vec!["Cat B".to_string()]);

        assert_eq!(preserved.len(), 1);
        assert_eq!(preserved[0].name, "shared");
    }
}
