use chrono::{DateTime, Utc};

/// How a join was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSource {
    /// Service message: an existing member added them.
    Added,
    /// Service message: they joined through an invite link.
    InviteLink,
    /// Polling cycle: present in the current enumeration, absent from the
    /// previous snapshot.
    PollDiff,
}

/// Identity of one joining member, as far as the backend reported it.
#[derive(Debug, Clone, Default)]
pub struct Joiner {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Joiner {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !self.first_name.is_empty() => {
                format!("{} {last}", self.first_name)
            }
            Some(last) => last.clone(),
            None => self.first_name.clone(),
        }
    }
}

/// One detected join. Constructed, formatted, sent, discarded.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub group_name: String,
    pub joiner: Joiner,
    pub when: DateTime<Utc>,
    pub source: JoinSource,
}
