mod backend;
mod chat_ref;
mod config;
mod event;
mod health;
mod messages;
mod poller;
mod registry;
mod reply_queue;
mod snapshot;
mod telegram;
mod watcher;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::User;
use tokio::sync::Mutex;

use crate::chat_ref::{ChatKind, ChatRef};
use crate::config::Config;
use crate::event::Joiner;
use crate::reply_queue::ReplyQueue;
use crate::telegram::TelegramBackend;
use crate::watcher::Watcher;

fn chat_ref_of(chat: &teloxide::types::Chat) -> Option<ChatRef> {
    if chat.is_supergroup() {
        ChatRef::from_api(chat.id.0, ChatKind::Supergroup)
    } else if chat.is_group() {
        ChatRef::from_api(chat.id.0, ChatKind::Group)
    } else {
        None
    }
}

fn joiner_of(user: &User) -> Joiner {
    Joiner {
        id: user.id.0,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

async fn on_message(
    msg: Message,
    watcher: Arc<Mutex<Watcher>>,
    config: Arc<Config>,
) -> ResponseResult<()> {
    if let Some(joined) = msg.new_chat_members() {
        if let Some(chat) = chat_ref_of(&msg.chat) {
            let joined: Vec<Joiner> = joined.iter().map(joiner_of).collect();
            let sender = msg.from.as_ref().map(|user| user.id.0);
            watcher
                .lock()
                .await
                .handle_new_members(chat, msg.chat.title(), sender, joined)
                .await;
        }
    } else if msg.chat.id == config.operator_chat {
        if let Some(text) = msg.text() {
            watcher.lock().await.handle_command(text).await;
        }
    } else if let Some(chat) = chat_ref_of(&msg.chat) {
        watcher.lock().await.note_seen(chat);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("❌ ERROR: {e}");
            eprintln!();
            eprintln!("Set BOT_TOKEN to your bot's API token and OPERATOR_CHAT_ID to the");
            eprintln!("private chat that should receive notifications, then restart.");
            std::process::exit(1);
        }
    };

    log::info!("Starting group join watcher...");

    let bot = Bot::new(config.bot_token.clone());
    let me = match bot.get_me().await {
        Ok(me) => me,
        Err(e) => {
            eprintln!("❌ Failed to connect: {e}");
            eprintln!();
            eprintln!("Your BOT_TOKEN may be invalid or revoked. Get a fresh token from");
            eprintln!("@BotFather and update the environment.");
            std::process::exit(1);
        }
    };
    log::info!("Logged in as {}", me.user.first_name);

    let queue = ReplyQueue::new(bot.clone(), config.operator_chat);
    let backend = Arc::new(TelegramBackend::new(bot.clone(), queue));
    let watcher = Arc::new(Mutex::new(
        Watcher::initialize(backend, &config.registry_file, me.user.id.0).await,
    ));

    // Re-validate whatever the registry file still holds before the
    // update stream starts delivering.
    {
        let mut watcher = watcher.lock().await;
        watcher.refresh_all().await;
        log::info!("Monitoring {} group entries", watcher.registry().len());
    }

    tokio::spawn(health::serve(config.health_port));
    if let Some(url) = config.external_url.clone() {
        tokio::spawn(health::keep_alive(url));
    }
    if let Some(period) = config.poll_interval {
        tokio::spawn(poller::run(watcher.clone(), period));
    }

    Dispatcher::builder(bot, Update::filter_message().endpoint(on_message))
        .dependencies(dptree::deps![watcher, config])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await
}
