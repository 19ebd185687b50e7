use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::security::SecurityId;

/// Tradable security set for one evaluation date. Built fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseSnapshot {
    pub date: NaiveDate,
    members: BTreeSet<SecurityId>,
}

impl UniverseSnapshot {
    pub fn new(date: NaiveDate, members: impl IntoIterator<Item = SecurityId>) -> Self {
        Self {
            date,
            members: members.into_iter().collect(),
        }
    }

    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            members: BTreeSet::new(),
        }
    }

    pub fn contains(&self, id: &SecurityId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityId> {
        self.members.iter()
    }
}
