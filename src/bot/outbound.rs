use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
};

use super::event::ButtonAction;
use crate::media::{MediaKind, MediaResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    Link(String),
    Action(ButtonAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
}

impl Button {
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Link(url.into()),
        }
    }

    pub fn action(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Action(action),
        }
    }
}

pub type Keyboard = Vec<Vec<Button>>;

/// Everything the orchestrator sends back to a chat.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;

    async fn send_keyboard(&self, chat: ChatId, text: &str, keyboard: Keyboard) -> Result<()>;

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaResult,
        caption: &str,
        keyboard: Keyboard,
    ) -> Result<()>;

    /// Sends `contents` as a file attachment named `file_name`.
    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<()>;

    /// Dismisses the loading spinner on a pressed button.
    async fn answer_button(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: Keyboard) -> Result<InlineKeyboardMarkup> {
    let mut rows = Vec::with_capacity(keyboard.len());
    for row in keyboard {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            buttons.push(match button.target {
                ButtonTarget::Link(url) => InlineKeyboardButton::url(
                    button.label,
                    url.parse::<url::Url>()
                        .with_context(|| format!("Invalid button URL {}", url))?,
                ),
                ButtonTarget::Action(action) => {
                    InlineKeyboardButton::callback(button.label, action.encode())
                }
            });
        }
        rows.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(chat, text).await?;
        Ok(())
    }

    async fn send_keyboard(&self, chat: ChatId, text: &str, keyboard: Keyboard) -> Result<()> {
        self.bot
            .send_message(chat, text)
            .reply_markup(markup(keyboard)?)
            .await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaResult,
        caption: &str,
        keyboard: Keyboard,
    ) -> Result<()> {
        let input = InputFile::file(media.path.clone());
        let markup = if keyboard.is_empty() {
            None
        } else {
            Some(markup(keyboard)?)
        };

        match media.kind {
            MediaKind::Video => {
                let mut req = self
                    .bot
                    .send_video(chat, input)
                    .caption(caption)
                    .supports_streaming(true);
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("Failed to upload video")?;
            }
            MediaKind::Audio => {
                let mut req = self
                    .bot
                    .send_audio(chat, input)
                    .caption(caption)
                    .title(media.title.clone());
                if let Some(uploader) = &media.uploader {
                    req = req.performer(uploader.clone());
                }
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("Failed to upload audio")?;
            }
            MediaKind::Image => {
                let mut req = self.bot.send_photo(chat, input).caption(caption);
                if let Some(markup) = markup {
                    req = req.reply_markup(markup);
                }
                req.await.context("Failed to upload photo")?;
            }
        }
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let input = InputFile::memory(contents).file_name(file_name.to_string());
        self.bot
            .send_document(chat, input)
            .caption(caption)
            .await
            .context("Failed to upload document")?;
        Ok(())
    }

    async fn answer_button(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await?;
        Ok(())
    }
}
