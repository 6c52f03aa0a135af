use std::fmt;

/// Telegram distinguishes basic groups from supergroups, and each kind has
/// its own surface encoding for the same underlying numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Group,
    Supergroup,
}

/// A chat identifier with its kind resolved.
///
/// The wire id (`api_id`) is the canonical form: `-100…` for supergroups,
/// plain negative for basic groups. The bare positive form that older
/// registry files and raw peer ids use is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef {
    kind: ChatKind,
    api_id: i64,
}

impl ChatRef {
    /// Builds a reference from a wire chat id. Returns `None` if the id
    /// does not have the shape the kind implies.
    pub fn from_api(api_id: i64, kind: ChatKind) -> Option<Self> {
        if api_id >= 0 {
            return None;
        }
        if kind == ChatKind::Supergroup && !api_id.to_string().starts_with("-100") {
            return None;
        }
        Some(Self { kind, api_id })
    }

    /// Parses a stored encoding. Bare positive forms are ambiguous without
    /// a kind and yield `None`; they exist in the registry only as probe
    /// aliases for the canonical entry.
    pub fn parse(encoding: &str) -> Option<Self> {
        let api_id: i64 = encoding.parse().ok()?;
        if let Some(rest) = encoding.strip_prefix("-100") {
            if !rest.is_empty() {
                return Self::from_api(api_id, ChatKind::Supergroup);
            }
        }
        if api_id < 0 {
            return Self::from_api(api_id, ChatKind::Group);
        }
        None
    }

    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    pub fn api_id(&self) -> i64 {
        self.api_id
    }

    pub fn canonical(&self) -> String {
        self.api_id.to_string()
    }

    /// The positive internal id, without the kind prefix.
    pub fn bare(&self) -> String {
        let canonical = self.canonical();
        let stripped = match self.kind {
            ChatKind::Supergroup => canonical.strip_prefix("-100"),
            ChatKind::Group => canonical.strip_prefix('-'),
        };
        stripped.unwrap_or(&canonical).to_string()
    }

    /// Every encoding under which this chat may appear, canonical first.
    /// Lookups probe all of them; the registry persists all of them.
    pub fn encodings(&self) -> [String; 2] {
        [self.canonical(), self.bare()]
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supergroup_encodings() {
        let chat = ChatRef::from_api(-100555, ChatKind::Supergroup).unwrap();
        assert_eq!(chat.canonical(), "-100555");
        assert_eq!(chat.bare(), "555");
        assert_eq!(chat.encodings(), ["-100555".to_string(), "555".to_string()]);
    }

    #[test]
    fn basic_group_encodings() {
        let chat = ChatRef::from_api(-42, ChatKind::Group).unwrap();
        assert_eq!(chat.canonical(), "-42");
        assert_eq!(chat.bare(), "42");
    }

    #[test]
    fn rejects_mismatched_shapes() {
        assert!(ChatRef::from_api(555, ChatKind::Supergroup).is_none());
        assert!(ChatRef::from_api(-42, ChatKind::Supergroup).is_none());
        assert!(ChatRef::from_api(42, ChatKind::Group).is_none());
    }

    #[test]
    fn parse_canonical_forms() {
        let sg = ChatRef::parse("-100123").unwrap();
        assert_eq!(sg.kind(), ChatKind::Supergroup);
        assert_eq!(sg.api_id(), -100123);

        let group = ChatRef::parse("-42").unwrap();
        assert_eq!(group.kind(), ChatKind::Group);
        assert_eq!(group.api_id(), -42);
    }

    #[test]
    fn parse_rejects_bare_and_garbage() {
        assert!(ChatRef::parse("555").is_none());
        assert!(ChatRef::parse("").is_none());
        assert!(ChatRef::parse("abc").is_none());
        // "-100" alone has no internal id left after the prefix, so it can
        // only be a basic group that happens to sit at -100.
        assert_eq!(ChatRef::parse("-100").unwrap().kind(), ChatKind::Group);
    }

    #[test]
    fn parse_round_trips_canonical() {
        for encoding in ["-100987654321", "-777"] {
            let chat = ChatRef::parse(encoding).unwrap();
            assert_eq!(chat.canonical(), encoding);
            assert_eq!(ChatRef::parse(&chat.canonical()), Some(chat));
        }
    }
}
