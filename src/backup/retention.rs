use crate::backup::naming::BackupId;
use getset::Getters;
use itertools::Itertools;

/// Split of the recognized remote backups into the ones to keep and the ones to prune.
///
/// Both lists are ordered oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RetentionPlan {
    keep: Vec<BackupId>,
    delete: Vec<BackupId>,
}

impl RetentionPlan {
    /// Keeps the newest `retention_count` backups (at least one) and marks the rest.
    pub fn new<I>(backups: I, retention_count: u32) -> Self
    where
        I: IntoIterator<Item = BackupId>,
    {
        let mut sorted = backups.into_iter().sorted_unstable().dedup().collect_vec();
        let retention_count = usize::try_from(retention_count.max(1)).unwrap_or(usize::MAX);
        let excess = sorted.len().saturating_sub(retention_count);
        let keep = sorted.split_off(excess);

        Self {
            keep,
            delete: sorted,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ids(days: &[u32]) -> Vec<BackupId> {
        days.iter()
            .map(|d| BackupId::new("b-", Utc.with_ymd_and_hms(2024, 1, *d, 0, 0, 0).unwrap()))
            .collect()
    }

    #[test]
    fn test_deletes_oldest_excess() {
        let plan = RetentionPlan::new(ids(&[4, 1, 3, 2, 5]), 2);

        assert_eq!(plan.delete(), &ids(&[1, 2, 3]));
        assert_eq!(plan.keep(), &ids(&[4, 5]));
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_nothing_to_delete_within_limit() {
        for count in [3, 4, 100] {
            let plan = RetentionPlan::new(ids(&[1, 2, 3]), count);
            assert!(plan.is_noop());
            assert_eq!(plan.keep(), &ids(&[1, 2, 3]));
        }
    }

    #[test]
    fn test_removes_exactly_k_for_any_excess() {
        for k in 0..5u32 {
            let days = (1..=(3 + k)).collect_vec();
            let plan = RetentionPlan::new(ids(&days), 3);
            assert_eq!(plan.delete().len(), k as usize);
            assert_eq!(plan.keep(), &ids(&days[k as usize..]));
        }
    }

    #[test]
    fn test_zero_retention_still_keeps_newest() {
        let plan = RetentionPlan::new(ids(&[1, 2]), 0);
        assert_eq!(plan.keep(), &ids(&[2]));
        assert_eq!(plan.delete(), &ids(&[1]));
    }

    #[test]
    fn test_empty_set() {
        let plan = RetentionPlan::new(Vec::new(), 1);
        assert!(plan.is_noop());
        assert!(plan.keep().is_empty());
    }

    #[test]
    fn test_duplicates_are_counted_once() {
        let mut backups = ids(&[1, 2]);
        backups.extend(ids(&[2]));
        let plan = RetentionPlan::new(backups, 2);
        assert!(plan.is_noop());
    }
}
