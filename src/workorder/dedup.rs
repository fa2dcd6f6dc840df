use crate::workorder::model::RecoveredCandidate;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Deduped {
    /// One candidate per id, ascending.
    pub records: Vec<RecoveredCandidate>,
    pub max_id: Option<u32>,
    /// Candidates that lost to another document with the same id.
    pub dropped: usize,
}

/// Collapse candidates sharing an id. The first candidate seen wins unless it
/// only carries the placeholder client and a later one names a real client.
pub fn dedup(candidates: Vec<RecoveredCandidate>) -> Deduped {
    let mut by_id: BTreeMap<u32, RecoveredCandidate> = BTreeMap::new();
    let mut dropped = 0usize;

    for candidate in candidates {
        match by_id.entry(candidate.id) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                dropped += 1;
                if !slot.get().has_resolved_client() && candidate.has_resolved_client() {
                    debug!(
                        id = candidate.id,
                        kept = %candidate.source_file.display(),
                        replaced = %slot.get().source_file.display(),
                        "preferring document with a resolved client"
                    );
                    slot.insert(candidate);
                }
            }
        }
    }

    let max_id = by_id.keys().next_back().copied();
    Deduped {
        records: by_id.into_values().collect(),
        max_id,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::model::{Field, MinedDocument};

    fn candidate(id: u32, file: &str, client: Option<&str>) -> RecoveredCandidate {
        let mut mined = MinedDocument::fallback(file);
        if let Some(client) = client {
            mined.client = Field::content(client);
        }
        RecoveredCandidate::from_mined(id, mined, "01/01/2024".into(), file.into(), 0)
    }

    #[test]
    fn resolved_client_replaces_placeholder() {
        let out = dedup(vec![
            candidate(7, "7.docx", None),
            candidate(7, "OS 7 - Bruno.docx", Some("Bruno")),
        ]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].client.value, "Bruno");
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn first_resolved_candidate_is_kept() {
        let out = dedup(vec![
            candidate(7, "7 - Ana.docx", Some("Ana")),
            candidate(7, "7 - Bruno.docx", Some("Bruno")),
            candidate(7, "7.docx", None),
        ]);
        assert_eq!(out.records[0].client.value, "Ana");
        assert_eq!(out.dropped, 2);
    }

    #[test]
    fn output_is_ordered_with_max_id() {
        let out = dedup(vec![
            candidate(30, "30.docx", None),
            candidate(4, "4.docx", None),
            candidate(12, "12.docx", None),
        ]);
        let ids = out.records.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![4, 12, 30]);
        assert_eq!(out.max_id, Some(30));
        assert_eq!(dedup(Vec::new()).max_id, None);
    }
}
