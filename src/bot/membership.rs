use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{Recipient, UserId},
    ApiError, RequestError,
};
use tracing::{debug, warn};

use crate::error::{BotError, Result};

#[async_trait]
pub trait MembershipVerifier: Send + Sync {
    /// Whether `user` currently belongs to the required channel. Never cached.
    async fn is_member(&self, user: UserId) -> Result<bool>;
}

/// Asks Telegram for the user's status in the required channel. The bot must
/// be an administrator there for the lookup to succeed.
pub struct ChannelMembership {
    bot: Bot,
    channel: Recipient,
}

impl ChannelMembership {
    pub fn new(bot: Bot, channel: &str) -> Self {
        Self {
            bot,
            channel: parse_channel(channel),
        }
    }
}

/// Numeric ids (`-100…`) address the chat directly, anything else is a public username.
pub fn parse_channel(channel: &str) -> Recipient {
    let channel = channel.trim();
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if channel.starts_with('@') => Recipient::ChannelUsername(channel.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{channel}")),
    }
}

#[async_trait]
impl MembershipVerifier for ChannelMembership {
    async fn is_member(&self, user: UserId) -> Result<bool> {
        match self.bot.get_chat_member(self.channel.clone(), user).await {
            Ok(member) => {
                let present = member.kind.is_present();
                debug!(user_id = user.0, present, "membership checked");
                Ok(present)
            }
            Err(RequestError::Api(ApiError::UserNotFound)) => Ok(false),
            Err(e) => {
                warn!(user_id = user.0, error = %e, "membership lookup failed");
                Err(BotError::VerificationUnavailable(e.to_string()))
            }
        }
    }
}
