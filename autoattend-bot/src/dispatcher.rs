//! Long-polling update loop

use autoattend_core::{ChatId, RetryPolicy};
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::controller::{Controller, Reply};
use crate::registry::SessionLauncher;
use crate::telegram::{CallbackQuery, Message, TelegramClient, Update};

/// Feeds Telegram updates to the controller, one at a time
pub struct Dispatcher<L: SessionLauncher> {
    client: TelegramClient,
    controller: Controller<L>,
    offset: i64,
    backoff: RetryPolicy,
}

impl<L: SessionLauncher> Dispatcher<L> {
    pub fn new(client: TelegramClient, controller: Controller<L>) -> Self {
        Self {
            client,
            controller,
            offset: 0,
            backoff: RetryPolicy {
                max_retries: u32::MAX,
                initial_delay_ms: 1000,
                max_delay_ms: 60_000,
                backoff_multiplier: 2.0,
                jitter: true,
            },
        }
    }

    /// Poll until `shutdown` resolves, then stop every running session
    pub async fn run<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut failures: u32 = 0;
        info!("Bot is polling for updates");

        loop {
            let updates = tokio::select! {
                updates = self.client.get_updates(self.offset) => updates,
                _ = &mut shutdown => break,
            };

            match updates {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        self.offset = self.offset.max(update.update_id + 1);
                        self.dispatch(update).await;
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.delay_for(failures);
                    warn!(error = %e, failures, delay_ms = delay.as_millis() as u64, "Polling failed");
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = &mut shutdown => break,
                    }
                }
            }
        }

        info!("Shutting down");
        self.controller.shutdown().await;
    }

    async fn dispatch(&mut self, update: Update) {
        if let Some(message) = update.message {
            self.on_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.on_callback(callback).await;
        } else {
            debug!(update_id = update.update_id, "Ignoring update");
        }
    }

    async fn on_message(&mut self, message: Message) {
        let (Some(from), Some(text)) = (message.from, message.text) else {
            return;
        };

        let chat = ChatId::Id(message.chat.id);
        let replies = self.controller.handle_text(from.id, &text).await;
        for reply in replies {
            self.send(&chat, reply).await;
        }
    }

    async fn on_callback(&mut self, callback: CallbackQuery) {
        let data = callback.data.unwrap_or_default();
        let answer = self.controller.handle_callback(callback.from.id, &data).await;

        if let Err(e) = self
            .client
            .answer_callback_query(&callback.id, &answer.toast)
            .await
        {
            warn!(error = %e, "Failed to answer callback query");
        }

        if let Some(reply) = answer.reply {
            self.send(&ChatId::Id(callback.from.id), reply).await;
        }
    }

    async fn send(&self, chat: &ChatId, reply: Reply) {
        let markup = reply
            .keyboard
            .map(|keyboard| keyboard.render(self.controller.messages()));

        if let Err(e) = self
            .client
            .send_message(chat, &reply.text, markup.as_ref())
            .await
        {
            warn!(chat = %chat, error = %e, "Failed to send reply");
        }
    }
}
