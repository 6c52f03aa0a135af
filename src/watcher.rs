use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::backend::Backend;
use crate::chat_ref::ChatRef;
use crate::event::{JoinEvent, JoinSource, Joiner};
use crate::messages;
use crate::registry::GroupRegistry;
use crate::snapshot::{MembershipChange, SnapshotStore};

/// Participant enumeration cap per chat and cycle.
pub const MEMBER_ENUM_LIMIT: usize = 100;
/// A refresh never considers more than this many known chats.
const REFRESH_PAGE_LIMIT: usize = 500;
/// Pause between chats while refreshing or polling, to stay friendly with
/// the backend's rate limits. Policy, not correctness.
const INTER_CHAT_DELAY: Duration = Duration::from_millis(100);

lazy_static! {
    static ref USER_ID_REGEX: Regex = Regex::new("^[0-9]{1,20}$").unwrap();
}

/// The service object owning all watcher state: the persisted registry,
/// the in-memory membership snapshots and the chats discovered from the
/// update stream this run. One instance behind a mutex; handlers and the
/// poller borrow it in turn.
pub struct Watcher {
    backend: Arc<dyn Backend>,
    registry: GroupRegistry,
    snapshots: SnapshotStore,
    discovered: HashMap<i64, ChatRef>,
    me: u64,
}

impl Watcher {
    pub async fn initialize(
        backend: Arc<dyn Backend>,
        registry_path: impl Into<PathBuf>,
        me: u64,
    ) -> Self {
        Self {
            backend,
            registry: GroupRegistry::load(registry_path).await,
            snapshots: SnapshotStore::new(),
            discovered: HashMap::new(),
            me,
        }
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Remembers a group chat seen in the update stream. These are the
    /// refresh candidates beyond what the registry already holds.
    pub fn note_seen(&mut self, chat: ChatRef) {
        if self.discovered.len() < REFRESH_PAGE_LIMIT {
            self.discovered.insert(chat.api_id(), chat);
        }
    }

    /// Registers a chat and persists immediately. Additive; used when the
    /// account is added to a new group.
    pub async fn add_group(&mut self, chat: ChatRef, title: &str) {
        self.note_seen(chat);
        if self.registry.insert(&chat, title) {
            self.registry.save().await;
            log::info!("Added to new group: {title} ({chat})");
        }
    }

    /// Handles one "new chat members" service message. The chat is
    /// matched against the registry under every encoding it may appear
    /// as; unmonitored chats are dropped silently.
    pub async fn handle_new_members(
        &mut self,
        chat: ChatRef,
        title: Option<&str>,
        sender: Option<u64>,
        joined: Vec<Joiner>,
    ) {
        self.note_seen(chat);

        if joined.iter().any(|joiner| joiner.id == self.me) {
            let title = title.unwrap_or("Unknown Group");
            self.add_group(chat, title).await;
            self.backend
                .notify_operator(messages::monitoring_started(title));
        }

        let candidates = chat.encodings();
        let Some(matched) = self.registry.find_monitored(&candidates) else {
            log::debug!("Ignoring join event in unmonitored chat {chat}");
            return;
        };

        let group_name = title
            .map(str::to_string)
            .or_else(|| self.registry.name_of(matched).map(str::to_string))
            .unwrap_or_else(|| "Unknown Group".to_string());
        if let Some(title) = title {
            self.registry.set_name(&chat, title);
        }

        for joiner in joined {
            if joiner.id == self.me {
                continue;
            }

            // The backend folds "added" and "joined via link" into one
            // service message; a member who authored it joined themself.
            let source = if sender == Some(joiner.id) {
                JoinSource::InviteLink
            } else {
                JoinSource::Added
            };

            let event = JoinEvent {
                group_name: group_name.clone(),
                joiner,
                when: Utc::now(),
                source,
            };

            log::info!(
                "New member {} in {} ({:?})",
                event.joiner.id,
                event.group_name,
                event.source
            );
            self.backend.notify_operator(messages::new_member(&event));
        }
    }

    /// Executes one plain-text operator command. Unknown text is ignored;
    /// every reply goes through the operator notification channel.
    pub async fn handle_command(&mut self, text: &str) {
        let lowered = text.trim().to_lowercase();

        if lowered.starts_with("list") {
            self.backend
                .notify_operator(messages::group_list(self.registry.entries()));
        } else if lowered.starts_with("refresh") {
            self.backend.notify_operator(messages::refresh_started());
            let count = self.refresh_all().await;
            self.backend.notify_operator(messages::refresh_done(count));
        } else if lowered.starts_with("copy") {
            let reply = match shlex::split(text.trim()) {
                Some(args) if args.len() == 3 && USER_ID_REGEX.is_match(&args[2]) => {
                    messages::copy_info(&args[1], &args[2])
                }
                _ => messages::copy_usage(),
            };
            self.backend.notify_operator(reply);
        } else if lowered.starts_with("help") {
            self.backend.notify_operator(messages::help());
        }
    }

    /// Re-validates every known chat (registry entries plus chats seen in
    /// the update stream) and replaces the whole registry with the ones
    /// that still resolve as groups. Destructive: anything that fails to
    /// resolve is dropped. Returns the number of monitored groups.
    pub async fn refresh_all(&mut self) -> usize {
        let mut candidates = self.registry.chats();
        for chat in self.discovered.values() {
            if !candidates.contains(chat) {
                candidates.push(*chat);
            }
        }
        candidates.truncate(REFRESH_PAGE_LIMIT);

        let mut groups = Vec::new();
        for chat in candidates {
            match self.backend.chat_info(chat.api_id()).await {
                Ok(info) => {
                    if info.kind != chat.kind() {
                        // Kind transitions (group upgraded to supergroup)
                        // arrive under a new id; the stale entry ages out
                        // here once it stops resolving.
                        log::warn!("Chat {chat} reports a different kind now, keeping it as-is");
                    }
                    log::info!("Monitoring: {} ({chat})", info.title);
                    groups.push((chat, info.title));
                }
                Err(e) => log::warn!("Dropping {chat} from monitoring: {e}"),
            }
            tokio::time::sleep(INTER_CHAT_DELAY).await;
        }

        self.registry.replace_all(&groups);
        self.registry.save().await;
        log::info!("Refresh complete, monitoring {} groups", groups.len());

        groups.len()
    }

    /// One polling cycle over the registry in insertion order. Failures
    /// never escalate past the chat being processed.
    pub async fn poll_cycle(&mut self) {
        let chats = self.registry.chats();
        log::debug!("Polling {} chats", chats.len());

        for chat in chats {
            self.poll_chat(chat).await;
            tokio::time::sleep(INTER_CHAT_DELAY).await;
        }
    }

    async fn poll_chat(&mut self, chat: ChatRef) {
        let info = match self.backend.chat_info(chat.api_id()).await {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Cannot resolve chat {chat}: {e}");
                return;
            }
        };
        self.registry.set_name(&chat, &info.title);

        match self.backend.list_members(chat.api_id(), MEMBER_ENUM_LIMIT).await {
            Ok(members) => {
                let ids: Vec<u64> = members.iter().map(|member| member.id).collect();
                if let MembershipChange::NewMembers(new) = self.snapshots.record_members(chat, &ids)
                {
                    for id in new {
                        let joiner = members
                            .iter()
                            .find(|member| member.id == id)
                            .cloned()
                            .unwrap_or(Joiner {
                                id,
                                ..Joiner::default()
                            });

                        let event = JoinEvent {
                            group_name: info.title.clone(),
                            joiner,
                            when: Utc::now(),
                            source: JoinSource::PollDiff,
                        };
                        log::info!("Poll found new member {id} in {}", info.title);
                        self.backend.notify_operator(messages::new_member(&event));
                    }
                }
            }
            Err(e) => {
                log::debug!("Member list unavailable for {chat}, using count: {e}");
                match self.backend.member_count(chat.api_id()).await {
                    Ok(count) => {
                        if let MembershipChange::CountIncrease { delta, total } =
                            self.snapshots.record_count(chat, count)
                        {
                            log::info!("Poll found {delta} new members in {}", info.title);
                            self.backend.notify_operator(messages::member_surge(
                                &info.title,
                                delta,
                                total,
                                &Utc::now(),
                            ));
                        }
                    }
                    Err(e) => log::warn!("Cannot get member count for {chat}: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ChatInfo};
    use crate::chat_ref::ChatKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        chats: Mutex<HashMap<i64, ChatInfo>>,
        members: Mutex<HashMap<i64, Vec<Joiner>>>,
        counts: Mutex<HashMap<i64, u32>>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn add_chat(&self, chat: &ChatRef, title: &str) {
            self.chats.lock().unwrap().insert(
                chat.api_id(),
                ChatInfo {
                    kind: chat.kind(),
                    title: title.to_string(),
                },
            );
        }

        fn remove_chat(&self, chat: &ChatRef) {
            self.chats.lock().unwrap().remove(&chat.api_id());
        }

        fn set_members(&self, chat: &ChatRef, ids: &[u64]) {
            let members = ids
                .iter()
                .map(|id| Joiner {
                    id: *id,
                    username: Some(format!("user{id}")),
                    first_name: format!("User {id}"),
                    last_name: None,
                })
                .collect();
            self.members.lock().unwrap().insert(chat.api_id(), members);
        }

        fn set_count(&self, chat: &ChatRef, count: u32) {
            self.counts.lock().unwrap().insert(chat.api_id(), count);
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn clear_sent(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn chat_info(&self, chat_id: i64) -> Result<ChatInfo, BackendError> {
            self.chats
                .lock()
                .unwrap()
                .get(&chat_id)
                .cloned()
                .ok_or(BackendError::NotAGroup)
        }

        async fn list_members(
            &self,
            chat_id: i64,
            limit: usize,
        ) -> Result<Vec<Joiner>, BackendError> {
            self.members
                .lock()
                .unwrap()
                .get(&chat_id)
                .map(|members| members.iter().take(limit).cloned().collect())
                .ok_or(BackendError::Unsupported)
        }

        async fn member_count(&self, chat_id: i64) -> Result<u32, BackendError> {
            self.counts
                .lock()
                .unwrap()
                .get(&chat_id)
                .copied()
                .ok_or(BackendError::Unsupported)
        }

        fn notify_operator(&self, text: String) {
            self.sent.lock().unwrap().push(text);
        }
    }

    const ME: u64 = 42;

    fn supergroup() -> ChatRef {
        ChatRef::from_api(-100555, ChatKind::Supergroup).unwrap()
    }

    fn tmp_registry_path(tag: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        PathBuf::from(format!(
            "/tmp/joinwatch-watcher-{tag}-{}-{ts}.json",
            std::process::id()
        ))
    }

    async fn watcher(tag: &str) -> (Arc<FakeBackend>, Watcher) {
        let backend = Arc::new(FakeBackend::default());
        let watcher = Watcher::initialize(backend.clone(), tmp_registry_path(tag), ME).await;
        (backend, watcher)
    }

    fn joiner(id: u64) -> Joiner {
        Joiner {
            id,
            username: Some(format!("user{id}")),
            first_name: format!("User {id}"),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn poll_baseline_then_single_join() {
        let (backend, mut watcher) = watcher("poll").await;
        let chat = supergroup();
        backend.add_chat(&chat, "Rust Hub");
        backend.set_members(&chat, &[1, 2]);
        watcher.add_group(chat, "Rust Hub").await;

        watcher.poll_cycle().await;
        assert!(backend.sent().is_empty(), "first observation is a baseline");

        backend.set_members(&chat, &[1, 2, 3]);
        watcher.poll_cycle().await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 1, "exactly one join event for the new member");
        assert!(sent[0].contains("`3`"));
        assert!(sent[0].contains("Rust Hub"));
    }

    #[tokio::test]
    async fn poll_falls_back_to_count_tracking() {
        let (backend, mut watcher) = watcher("count").await;
        let chat = supergroup();
        backend.add_chat(&chat, "Big Group");
        backend.set_count(&chat, 10);
        watcher.add_group(chat, "Big Group").await;

        watcher.poll_cycle().await;
        assert!(backend.sent().is_empty());

        backend.set_count(&chat, 13);
        watcher.poll_cycle().await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains('3'));
        assert!(sent[0].contains("13"));

        backend.clear_sent();
        backend.set_count(&chat, 12);
        watcher.poll_cycle().await;
        assert!(backend.sent().is_empty(), "shrinking counts stay silent");
    }

    #[tokio::test]
    async fn poll_survives_unresolvable_chats() {
        let (backend, mut watcher) = watcher("survive").await;
        let gone = supergroup();
        let alive = ChatRef::from_api(-100777, ChatKind::Supergroup).unwrap();
        watcher.add_group(gone, "Gone").await;
        watcher.add_group(alive, "Alive").await;
        backend.add_chat(&alive, "Alive");
        backend.set_members(&alive, &[1]);

        watcher.poll_cycle().await;
        backend.set_members(&alive, &[1, 2]);
        watcher.poll_cycle().await;

        assert_eq!(backend.sent().len(), 1, "later chats still get polled");
    }

    #[tokio::test]
    async fn refresh_keeps_only_resolvable_chats() {
        let (backend, mut watcher) = watcher("refresh").await;
        let first = supergroup();
        let second = ChatRef::from_api(-100777, ChatKind::Supergroup).unwrap();
        watcher.add_group(first, "First").await;
        backend.add_chat(&first, "First");

        assert_eq!(watcher.refresh_all().await, 1);

        // The remote picture changes: first is gone, second appears.
        backend.remove_chat(&first);
        backend.add_chat(&second, "Second");
        watcher.note_seen(second);

        assert_eq!(watcher.refresh_all().await, 1);

        let stored: Vec<_> = watcher
            .registry()
            .entries()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(stored, vec!["-100777".to_string(), "777".to_string()]);
    }

    #[tokio::test]
    async fn service_join_in_monitored_chat_notifies() {
        let (backend, mut watcher) = watcher("service").await;
        let chat = supergroup();
        watcher.add_group(chat, "Rust Hub").await;

        // Added by someone else.
        watcher
            .handle_new_members(chat, Some("Rust Hub"), Some(99), vec![joiner(7)])
            .await;
        // Joined via link: sender is the joining member.
        watcher
            .handle_new_members(chat, Some("Rust Hub"), Some(8), vec![joiner(8)])
            .await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].contains("via link"));
        assert!(sent[1].contains("via link"));
    }

    #[tokio::test]
    async fn service_join_in_unmonitored_chat_is_dropped() {
        let (backend, mut watcher) = watcher("dropped").await;
        watcher
            .handle_new_members(supergroup(), Some("Elsewhere"), Some(99), vec![joiner(7)])
            .await;
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn being_added_registers_the_chat() {
        let (backend, mut watcher) = watcher("selfadd").await;
        let chat = supergroup();

        watcher
            .handle_new_members(chat, Some("Fresh Group"), Some(99), vec![joiner(ME)])
            .await;

        assert!(watcher
            .registry()
            .find_monitored(&chat.encodings())
            .is_some());
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Fresh Group"));
    }

    #[tokio::test]
    async fn commands_reply_through_the_operator_channel() {
        let (backend, mut watcher) = watcher("commands").await;
        let chat = supergroup();
        watcher.add_group(chat, "Rust Hub").await;

        watcher.handle_command("list").await;
        watcher.handle_command("copy alice 123").await;
        watcher.handle_command("copy alice").await;
        watcher.handle_command("help").await;
        watcher.handle_command("something else").await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 4, "unknown text is ignored");
        assert!(sent[0].contains("Rust Hub"));
        assert!(sent[1].contains("alice"));
        assert!(sent[2].contains("Usage"));
        assert!(sent[3].contains("Available Commands"));
    }

    #[tokio::test]
    async fn copy_rejects_non_numeric_ids() {
        let (backend, mut watcher) = watcher("copyid").await;
        watcher.handle_command("copy alice notanid").await;
        assert!(backend.sent()[0].contains("Usage"));
    }
}
