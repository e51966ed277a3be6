use teloxide::types::{ChatId, UserId};

/// Telegram rejects callback payloads longer than this.
pub const MAX_CALLBACK_BYTES: usize = 64;

/// One inbound update, reduced to what the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user: UserId,
    pub chat: ChatId,
    pub first_name: String,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Command(Command),
    Text(String),
    Button {
        callback_id: String,
        action: ButtonAction,
    },
}

impl InboundKind {
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => Self::Command(command),
            None => Self::Text(text.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Unknown(String),
}

impl Command {
    /// `/start`, `/start@SomeBot` and `/start payload` all yield `Start`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

        Some(match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            _ => Self::Unknown(name),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Verify,
    /// Token of a delivered video kept for follow-up.
    ConvertToAudio(String),
    /// Video id of a search candidate.
    PickTrack(String),
    Unknown(String),
}

impl ButtonAction {
    pub fn parse(data: &str) -> Self {
        if data == "verify" {
            Self::Verify
        } else if let Some(token) = data.strip_prefix("mp3:").filter(|t| !t.is_empty()) {
            Self::ConvertToAudio(token.to_string())
        } else if let Some(id) = data.strip_prefix("track:").filter(|t| !t.is_empty()) {
            Self::PickTrack(id.to_string())
        } else {
            Self::Unknown(data.to_string())
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Verify => "verify".to_string(),
            Self::ConvertToAudio(token) => format!("mp3:{token}"),
            Self::PickTrack(id) => format!("track:{id}"),
            Self::Unknown(data) => data.clone(),
        }
    }

    pub fn fits_callback(&self) -> bool {
        self.encode().len() <= MAX_CALLBACK_BYTES
    }
}
