use std::collections::HashMap;
use std::path::PathBuf;

use crate::chat_ref::ChatRef;

/// The persisted set of chats to watch.
///
/// On disk this is a plain JSON array of encoding strings, overwritten on
/// every mutation. Display names live only in memory; they are refreshed
/// from chat metadata whenever a chat is resolved.
pub struct GroupRegistry {
    path: PathBuf,
    ids: Vec<String>,
    names: HashMap<String, String>,
}

impl GroupRegistry {
    /// Reads the registry file, creating an empty one if it does not
    /// exist. Read or parse failures are logged and leave the registry
    /// empty; startup continues either way.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let mut registry = Self {
            path: path.into(),
            ids: Vec::new(),
            names: HashMap::new(),
        };

        match tokio::fs::read_to_string(&registry.path).await {
            Ok(text) => match serde_json::from_str::<Vec<String>>(&text) {
                Ok(ids) => {
                    for id in ids {
                        registry.insert_id(id);
                    }
                    log::info!(
                        "Loaded {} monitored group entries from {}",
                        registry.ids.len(),
                        registry.path.display()
                    );
                }
                Err(e) => log::error!(
                    "Registry file {} is not a JSON string array: {e}",
                    registry.path.display()
                ),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Created new registry file at {}", registry.path.display());
                registry.save().await;
            }
            Err(e) => log::error!(
                "Cannot read registry file {}: {e}",
                registry.path.display()
            ),
        }

        registry
    }

    /// Overwrites the registry file with the current identifier set.
    /// Write failures are logged and swallowed.
    pub async fn save(&self) {
        let json = match serde_json::to_string_pretty(&self.ids) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Cannot serialize registry: {e}");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, json).await {
            log::error!("Cannot write registry file {}: {e}", self.path.display());
        }
    }

    fn insert_id(&mut self, id: String) -> bool {
        if self.ids.iter().any(|existing| *existing == id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Registers a chat under all of its encodings. Returns true if any
    /// encoding was new. Does not persist; callers decide when to save.
    pub fn insert(&mut self, chat: &ChatRef, title: &str) -> bool {
        let mut added = false;
        for encoding in chat.encodings() {
            self.names.insert(encoding.clone(), title.to_string());
            added |= self.insert_id(encoding);
        }
        added
    }

    /// Drops the whole registry and name map in favor of `groups`.
    pub fn replace_all(&mut self, groups: &[(ChatRef, String)]) {
        self.ids.clear();
        self.names.clear();
        for (chat, title) in groups {
            self.insert(chat, title);
        }
    }

    /// First stored encoding among the candidates, if any. Callers must
    /// probe every encoding a chat may appear under before concluding the
    /// chat is not monitored.
    pub fn find_monitored<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates
            .iter()
            .find(|candidate| self.ids.iter().any(|id| id == *candidate))
            .map(|candidate| candidate.as_str())
    }

    pub fn name_of(&self, encoding: &str) -> Option<&str> {
        self.names.get(encoding).map(String::as_str)
    }

    /// Records a fresher display name without touching the identifier set.
    pub fn set_name(&mut self, chat: &ChatRef, title: &str) {
        for encoding in chat.encodings() {
            self.names.insert(encoding, title.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All entries in insertion order, with their names where known.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.ids
            .iter()
            .map(|id| (id.as_str(), self.names.get(id).map(String::as_str)))
    }

    /// The distinct chats behind the stored encodings, in insertion order.
    /// Bare entries are probe aliases and resolve to the same chat as
    /// their canonical sibling.
    pub fn chats(&self) -> Vec<ChatRef> {
        let mut seen = std::collections::HashSet::new();
        self.ids
            .iter()
            .filter_map(|id| ChatRef::parse(id))
            .filter(|chat| seen.insert(chat.api_id()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_ref::ChatKind;

    fn tmp_registry_path(tag: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/joinwatch-{tag}-{pid}-{ts}.json"))
    }

    fn supergroup(api_id: i64) -> ChatRef {
        ChatRef::from_api(api_id, ChatKind::Supergroup).unwrap()
    }

    #[tokio::test]
    async fn insert_stores_canonical_and_bare() {
        let mut registry = GroupRegistry::load(tmp_registry_path("insert")).await;
        assert!(registry.insert(&supergroup(-100123), "Test Group"));

        let stored: Vec<_> = registry.entries().map(|(id, _)| id.to_string()).collect();
        assert_eq!(stored, vec!["-100123".to_string(), "123".to_string()]);
        assert_eq!(registry.name_of("-100123"), Some("Test Group"));
        assert_eq!(registry.name_of("123"), Some("Test Group"));

        // Re-inserting is a no-op on the identifier set.
        assert!(!registry.insert(&supergroup(-100123), "Test Group"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn probes_all_candidate_encodings() {
        let mut registry = GroupRegistry::load(tmp_registry_path("probe")).await;
        registry.insert(&supergroup(-100123), "Test Group");

        let candidates = ["123".to_string(), "-100123".to_string()];
        assert_eq!(registry.find_monitored(&candidates), Some("123"));

        let misses = ["999".to_string(), "-100999".to_string()];
        assert_eq!(registry.find_monitored(&misses), None);
    }

    #[tokio::test]
    async fn replace_all_is_destructive() {
        let mut registry = GroupRegistry::load(tmp_registry_path("replace")).await;
        registry.replace_all(&[(supergroup(-100111), "First".to_string())]);
        registry.replace_all(&[(supergroup(-100222), "Second".to_string())]);

        let stored: Vec<_> = registry.entries().map(|(id, _)| id.to_string()).collect();
        assert_eq!(stored, vec!["-100222".to_string(), "222".to_string()]);
        assert_eq!(registry.name_of("-100111"), None);
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let path = tmp_registry_path("roundtrip");
        {
            let mut registry = GroupRegistry::load(&path).await;
            registry.insert(&supergroup(-100123), "One");
            registry.insert(
                &ChatRef::from_api(-42, ChatKind::Group).unwrap(),
                "Two",
            );
            registry.save().await;
        }

        let reloaded = GroupRegistry::load(&path).await;
        let mut stored: Vec<_> = reloaded.entries().map(|(id, _)| id.to_string()).collect();
        stored.sort();
        assert_eq!(stored, vec!["-100123", "-42", "123", "42"]);
        // Names are not persisted.
        assert_eq!(reloaded.name_of("-100123"), None);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_leaves_registry_empty() {
        let path = tmp_registry_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();

        let registry = GroupRegistry::load(&path).await;
        assert!(registry.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn chats_deduplicates_probe_aliases() {
        let mut registry = GroupRegistry::load(tmp_registry_path("chats")).await;
        registry.insert(&supergroup(-100123), "One");
        registry.insert(&ChatRef::from_api(-42, ChatKind::Group).unwrap(), "Two");

        let chats = registry.chats();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].api_id(), -100123);
        assert_eq!(chats[1].api_id(), -42);
    }
}
