use std::collections::{HashMap, HashSet};

use crate::chat_ref::ChatRef;

/// Last-observed membership for one chat: the full member-id set where
/// enumeration succeeded, or just the reported participant count where it
/// did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Members(HashSet<u64>),
    Count(u32),
}

/// Outcome of recording one observation against the stored baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    /// First usable observation in this mode; nothing to report.
    Baseline,
    /// Member ids present now but not in the previous set, in enumeration
    /// order.
    NewMembers(Vec<u64>),
    /// Count-mode fallback: the participant count grew.
    CountIncrease { delta: u32, total: u32 },
    Unchanged,
}

/// In-memory only; restarts start over from a fresh baseline.
#[derive(Default)]
pub struct SnapshotStore {
    chats: HashMap<ChatRef, Membership>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful member enumeration. A chat previously tracked
    /// by count only (or not at all) starts a fresh set baseline without
    /// reporting anyone as new.
    pub fn record_members(&mut self, chat: ChatRef, current: &[u64]) -> MembershipChange {
        let change = match self.chats.get(&chat) {
            Some(Membership::Members(previous)) => {
                let mut emitted = HashSet::new();
                let new: Vec<u64> = current
                    .iter()
                    .copied()
                    .filter(|id| !previous.contains(id) && emitted.insert(*id))
                    .collect();
                if new.is_empty() {
                    MembershipChange::Unchanged
                } else {
                    MembershipChange::NewMembers(new)
                }
            }
            _ => MembershipChange::Baseline,
        };

        self.chats
            .insert(chat, Membership::Members(current.iter().copied().collect()));
        change
    }

    /// Records a participant count for a chat whose members could not be
    /// enumerated. Only growth is reported; the new count becomes the
    /// baseline either way.
    pub fn record_count(&mut self, chat: ChatRef, count: u32) -> MembershipChange {
        let change = match self.chats.get(&chat) {
            Some(Membership::Count(previous)) if count > *previous => {
                MembershipChange::CountIncrease {
                    delta: count - previous,
                    total: count,
                }
            }
            Some(Membership::Count(_)) => MembershipChange::Unchanged,
            // No prior count: either never observed, or the set baseline
            // is no longer comparable because enumeration stopped working.
            _ => MembershipChange::Baseline,
        };

        self.chats.insert(chat, Membership::Count(count));
        change
    }

    pub fn get(&self, chat: &ChatRef) -> Option<&Membership> {
        self.chats.get(chat)
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
