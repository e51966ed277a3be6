use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use teloxide::{
    prelude::*,
    types::{AllowedUpdate, BotCommand, UpdateKind},
    ApiError, RequestError,
};
use tracing::{debug, error, info, warn};

use super::{
    event::{ButtonAction, Inbound, InboundKind},
    membership::ChannelMembership,
    orchestrator::{Adapters, Orchestrator},
    outbound::TelegramOutbound,
};
use crate::{
    config::Config,
    media::{self, FfmpegTranscoder, ScratchSpace, Transcriber, WhisperTranscriber, YtDlp},
};

// Longer than the long-polling timeout, and long enough for 50MB uploads.
const HTTP_TIMEOUT: Duration = Duration::from_secs(180);
const POLL_TIMEOUT_SECS: u32 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TelegramBot {
    bot: Bot,
    orchestrator: Arc<Orchestrator>,
}

impl TelegramBot {
    pub async fn new(config: &Config) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let bot = Bot::with_client(config.telegram.token.clone(), client);

        let me = bot.get_me().await.context("Failed to authenticate bot token")?;
        info!(username = ?me.username, "telegram bot connected");

        // Long polling only works without a webhook.
        bot.delete_webhook().send().await?;

        let commands = vec![
            BotCommand::new("start", "Join prompt and verification"),
            BotCommand::new("help", "How to use the bot"),
        ];
        if let Err(e) = bot.set_my_commands(commands).await {
            warn!("failed to register bot commands: {e}");
        }

        if let Err(e) = media::test_setup(&config.media).await {
            warn!("Media tool test failed: {}", e);
        }

        let scratch = ScratchSpace::new(&config.media.download_dir).with_context(|| {
            format!(
                "Failed to create download directory {}",
                config.media.download_dir.display()
            )
        })?;
        info!("Scratch space at {}", scratch.root().display());
        let ytdlp = Arc::new(YtDlp::new(&config.media));

        let transcriber = WhisperTranscriber::new(&config.media, &config.transcript)?
            .map(|t| Arc::new(t) as Arc<dyn Transcriber>);
        match &transcriber {
            Some(_) => info!(model = %config.transcript.model, "video transcripts enabled"),
            None => info!("video transcripts disabled, no API key configured"),
        }

        let adapters = Adapters {
            membership: Arc::new(ChannelMembership::new(
                bot.clone(),
                &config.telegram.required_channel,
            )),
            fetcher: ytdlp.clone(),
            transcoder: Arc::new(FfmpegTranscoder::new(&config.media)),
            searcher: ytdlp,
            outbound: Arc::new(TelegramOutbound::new(bot.clone())),
            transcriber,
        };

        Ok(Self {
            bot,
            orchestrator: Arc::new(Orchestrator::new(config, adapters, scratch)),
        })
    }

    pub async fn run(self) -> Result<()> {
        info!("Telegram bot starting...");
        let mut offset: i32 = 0;

        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let result = tokio::select! {
                result = request.send() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
            };

            let updates = match result {
                Ok(updates) => updates,
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    return Err(anyhow::anyhow!(
                        "another bot instance is already polling with this token"
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            debug!(count = updates.len(), "got telegram updates");
            for update in updates {
                offset = update.id.as_offset();
                let Some(event) = inbound_from_update(update.kind) else {
                    continue;
                };

                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    orchestrator.handle(event).await;
                });
            }
        }
    }
}

/// Keeps text messages and button presses from humans; drops everything else.
fn inbound_from_update(kind: UpdateKind) -> Option<Inbound> {
    match kind {
        UpdateKind::Message(msg) => {
            let from = msg.from.as_ref()?;
            if from.is_bot {
                return None;
            }
            let text = msg.text()?;
            debug!(user_id = from.id.0, chat_id = msg.chat.id.0, "received message");
            Some(Inbound {
                user: from.id,
                chat: msg.chat.id,
                first_name: from.first_name.clone(),
                kind: InboundKind::from_text(text),
            })
        }
        UpdateKind::CallbackQuery(query) => {
            let data = query.data.as_deref()?;
            // Private chat ids equal the user id.
            let chat = query
                .message
                .as_ref()
                .map(|m| m.chat().id)
                .unwrap_or(ChatId(query.from.id.0 as i64));
            debug!(user_id = query.from.id.0, callback_data = %data, "received button press");
            Some(Inbound {
                user: query.from.id,
                chat,
                first_name: query.from.first_name.clone(),
                kind: InboundKind::Button {
                    callback_id: query.id.clone(),
                    action: ButtonAction::parse(data),
                },
            })
        }
        other => {
            debug!("ignoring update: {other:?}");
            None
        }
    }
}

pub async fn run(config: &Config) -> Result<()> {
    match TelegramBot::new(config).await {
        Ok(bot) => bot.run().await,
        Err(e) => {
            error!("Failed to start telegram bot: {e:#}");
            Err(e)
        }
    }
}
