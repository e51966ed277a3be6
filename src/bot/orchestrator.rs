use std::path::Path;
use std::sync::Arc;

use teloxide::types::{ChatId, UserId};
use tracing::{debug, error, info, warn};

use super::{
    event::{ButtonAction, Command, Inbound, InboundKind},
    followup::FollowUps,
    membership::MembershipVerifier,
    outbound::{Button, Keyboard, Outbound},
    session::{InFlight, SessionState, Sessions},
};
use crate::{
    config::{Config, JoinLink},
    error::{BotError, Result},
    media::{
        transcript_document, youtube_watch_url, Fetcher, Input, MediaKind, MediaResult, Platform,
        ScratchSpace, Searcher, Transcoder, Transcriber,
    },
    utils::{bytes_to_mb, format_duration, truncate},
};

const BUSY_TEXT: &str = "⏳ I'm still working on your previous request.";

/// States that are not in the middle of a request.
const SETTLED: [SessionState; 3] = [
    SessionState::AwaitingStart,
    SessionState::AwaitingVerification,
    SessionState::Ready,
];

const HELP_TEXT: &str = "Send me a link from YouTube, Instagram, TikTok, Facebook, Pinterest or Twitter/X and I'll send the media back.\n\nSend any other text to search for a song.\n\n/start - join prompt and verification\n/help - this message";

/// A gated action, classified but not yet dispatched.
#[derive(Debug, Clone, PartialEq)]
enum Request {
    Download { url: String, platform: Platform },
    ConvertToAudio { token: String },
    Search { query: String },
    PickTrack { id: String },
}

/// The external collaborators a dispatch cycle may call.
pub struct Adapters {
    pub membership: Arc<dyn MembershipVerifier>,
    pub fetcher: Arc<dyn Fetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub searcher: Arc<dyn Searcher>,
    pub outbound: Arc<dyn Outbound>,
    /// Transcripts are skipped when unset.
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

struct Settings {
    channel_url: Option<String>,
    join_links: Vec<JoinLink>,
    max_upload_mb: u64,
    search_limit: usize,
}

/// Routes every inbound event through the membership gate and the media adapters.
pub struct Orchestrator {
    adapters: Adapters,
    scratch: ScratchSpace,
    sessions: Sessions,
    follow_ups: FollowUps,
    settings: Settings,
}

impl Orchestrator {
    pub fn new(config: &Config, adapters: Adapters, scratch: ScratchSpace) -> Self {
        Self {
            adapters,
            scratch,
            sessions: Sessions::new(config.session.idle_ttl()),
            follow_ups: FollowUps::new(
                config.session.follow_up_ttl(),
                config.session.follow_up_capacity,
            ),
            settings: Settings {
                channel_url: config.telegram.channel_url.clone(),
                join_links: config.telegram.join_links.clone(),
                max_upload_mb: config.media.max_upload_mb,
                search_limit: config.media.search_limit,
            },
        }
    }

    #[cfg(test)]
    pub fn session_state(&self, user: UserId) -> SessionState {
        self.sessions.state(user)
    }

    /// Handles one inbound event to completion. Failures are reported to the
    /// chat and logged, never returned.
    pub async fn handle(&self, event: Inbound) {
        let Inbound {
            user,
            chat,
            first_name,
            kind,
        } = event;

        match kind {
            InboundKind::Command(Command::Start) => self.on_start(user, chat, &first_name).await,
            InboundKind::Command(Command::Help) => self.say(chat, HELP_TEXT).await,
            InboundKind::Command(Command::Unknown(name)) => {
                debug!(user_id = user.0, command = %name, "unknown command");
                self.say(chat, "Unknown command. Try /help.").await;
            }
            InboundKind::Text(text) => self.on_text(user, chat, &text).await,
            InboundKind::Button {
                callback_id,
                action,
            } => self.on_button(user, chat, &callback_id, action).await,
        }
    }

    async fn on_start(&self, user: UserId, chat: ChatId, first_name: &str) {
        let state = self.sessions.state(user);
        info!(user_id = user.0, ?state, "start command");

        if state.is_busy() {
            self.say(chat, BUSY_TEXT).await;
            return;
        }

        if state == SessionState::Ready {
            match self.adapters.membership.is_member(user).await {
                Ok(true) => {
                    self.say(
                        chat,
                        &format!(
                            "Welcome back, {first_name}! 👋\n\n✅ You are verified.\nSend me a link or a song name to get started."
                        ),
                    )
                    .await;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    self.say(chat, &e.user_message()).await;
                }
            }
        }

        // A request may have started while membership was being checked.
        if !self
            .sessions
            .transition(user, &SETTLED, SessionState::AwaitingVerification)
        {
            self.say(chat, BUSY_TEXT).await;
            return;
        }
        let greeting = format!(
            "Hello {first_name}! 👋\n\nTo use this bot you must join our channel.\n\n👇 Join with the button below, then press \"✅ I have joined\" to unlock the bot."
        );
        self.send_join_prompt(chat, &greeting).await;
    }

    async fn on_verify(&self, user: UserId, chat: ChatId) {
        let state = self.sessions.state(user);
        if state == SessionState::Ready || state.is_busy() {
            self.say(chat, "✅ You are already verified.").await;
            return;
        }

        match self.adapters.membership.is_member(user).await {
            Ok(true) => {
                let idle = [
                    SessionState::AwaitingStart,
                    SessionState::AwaitingVerification,
                ];
                if self.sessions.transition(user, &idle, SessionState::Ready) {
                    info!(user_id = user.0, "user verified");
                }
                self.say(
                    chat,
                    "🎉 Verification successful!\n\nYou now have full access. Send me a link or a song name.",
                )
                .await;
            }
            Ok(false) => {
                info!(user_id = user.0, "verification refused, not a member");
                self.sessions
                    .transition(user, &SETTLED, SessionState::AwaitingVerification);
                self.send_join_prompt(
                    chat,
                    "❌ You haven't joined the channel yet.\n\nJoin with the button below, then press \"✅ I have joined\" again.",
                )
                .await;
            }
            Err(e) => {
                self.sessions
                    .transition(user, &SETTLED, SessionState::AwaitingVerification);
                self.say(chat, &e.user_message()).await;
            }
        }
    }

    async fn on_text(&self, user: UserId, chat: ChatId, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.accepts_requests(user, chat).await {
            return;
        }

        let request = match classify(text) {
            Ok(request) => request,
            Err(e) => {
                info!(user_id = user.0, input = %text, "rejected input: {}", e);
                self.say(chat, &e.user_message()).await;
                return;
            }
        };

        self.dispatch(user, chat, request).await;
    }

    async fn on_button(&self, user: UserId, chat: ChatId, callback_id: &str, action: ButtonAction) {
        let toast = match &action {
            ButtonAction::Verify => Some("Checking membership..."),
            ButtonAction::ConvertToAudio(_) => Some("Converting..."),
            ButtonAction::PickTrack(_) => Some("Downloading..."),
            ButtonAction::Unknown(_) => None,
        };
        if let Err(e) = self.adapters.outbound.answer_button(callback_id, toast).await {
            warn!(user_id = user.0, "failed to answer button: {e:#}");
        }

        match action {
            ButtonAction::Verify => self.on_verify(user, chat).await,
            ButtonAction::ConvertToAudio(token) => {
                if self.accepts_requests(user, chat).await {
                    self.dispatch(user, chat, Request::ConvertToAudio { token })
                        .await;
                }
            }
            ButtonAction::PickTrack(id) => {
                if self.accepts_requests(user, chat).await {
                    self.dispatch(user, chat, Request::PickTrack { id }).await;
                }
            }
            ButtonAction::Unknown(data) => {
                debug!(user_id = user.0, data = %data, "ignoring unknown button");
            }
        }
    }

    /// Tells the user why a request can't be taken when they are not `Ready`.
    async fn accepts_requests(&self, user: UserId, chat: ChatId) -> bool {
        let state = self.sessions.state(user);
        if state.is_locked() {
            self.say(
                chat,
                "🔒 Access locked.\nPlease run /start and join our channel to unlock the bot.",
            )
            .await;
            false
        } else if state.is_busy() {
            self.say(chat, BUSY_TEXT).await;
            false
        } else {
            true
        }
    }

    async fn dispatch(&self, user: UserId, chat: ChatId, request: Request) {
        let mut flight = match self.sessions.begin(user) {
            Ok(flight) => flight,
            Err(state) if state.is_busy() => {
                self.say(chat, BUSY_TEXT).await;
                return;
            }
            Err(_) => {
                self.say(chat, "🔒 Access locked.\nPlease run /start and join our channel to unlock the bot.")
                    .await;
                return;
            }
        };

        match self.adapters.membership.is_member(user).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id = user.0, "membership lapsed");
                flight.lapse();
                self.send_join_prompt(
                    chat,
                    "🔒 You are no longer a member of our channel.\n\nJoin again, then press \"✅ I have joined\".",
                )
                .await;
                return;
            }
            Err(e) => {
                flight.lapse();
                self.say(chat, &e.user_message()).await;
                return;
            }
        }

        flight.advance(SessionState::AwaitingResult);
        info!(user_id = user.0, chat_id = chat.0, ?request, "dispatching request");

        let outcome = match request {
            Request::Download { url, platform } => {
                self.download(user, chat, &url, platform, &flight).await
            }
            Request::ConvertToAudio { token } => {
                self.convert(user, chat, &token, &flight).await
            }
            Request::Search { query } => self.search(chat, &query, &flight).await,
            Request::PickTrack { id } => self.pick_track(chat, &id, &flight).await,
        };

        if let Err(e) = outcome {
            warn!(user_id = user.0, error = %e, "request failed");
            self.say(chat, &e.user_message()).await;
        }
    }

    async fn download(
        &self,
        user: UserId,
        chat: ChatId,
        url: &str,
        platform: Platform,
        flight: &InFlight,
    ) -> Result<()> {
        self.say(chat, &format!("⏳ Processing link from {platform}...")).await;

        let scratch = self.scratch.allocate()?;
        let media = self.fetch_with_retry(url, scratch.path()).await?;
        flight.advance(SessionState::Responding);
        self.check_size(&media.path).await?;

        info!(
            user_id = user.0,
            platform = %platform,
            fetcher = self.adapters.fetcher.name(),
            source = %media.source_url,
            title = %media.title,
            path = %media.path.display(),
            "download complete"
        );

        match media.kind {
            MediaKind::Video => {
                let caption = format!("🎥 {}", media.title);
                let token = self.follow_ups.insert(user, media.clone(), scratch);
                let keyboard = vec![vec![Button::action(
                    "🎵 Download as MP3",
                    ButtonAction::ConvertToAudio(token.clone()),
                )]];
                if self.deliver(chat, &media, &caption, keyboard).await {
                    self.send_transcript(chat, &media).await;
                } else {
                    self.follow_ups.remove(&token);
                }
            }
            MediaKind::Image => {
                self.deliver(chat, &media, &format!("📸 {}", media.title), Vec::new())
                    .await;
            }
            MediaKind::Audio => {
                self.deliver(chat, &media, &format!("🎵 {}", media.title), Vec::new())
                    .await;
            }
        }
        Ok(())
    }

    async fn convert(&self, user: UserId, chat: ChatId, token: &str, flight: &InFlight) -> Result<()> {
        let Some(follow_up) = self.follow_ups.get(token, user) else {
            self.say(chat, "❌ This file has expired. Please send the link again.")
                .await;
            return Ok(());
        };

        self.say(chat, "⏳ Converting to MP3...").await;
        let audio = self.adapters.transcoder.to_audio(&follow_up.media).await?;
        flight.advance(SessionState::Responding);

        let result = self.deliver_audio(chat, &audio).await;
        remove_quietly(&audio.path).await;
        result
    }

    async fn search(&self, chat: ChatId, query: &str, flight: &InFlight) -> Result<()> {
        self.say(chat, &format!("🔎 Searching for '{query}'...")).await;

        let results = self
            .adapters
            .searcher
            .search(query, self.settings.search_limit)
            .await?;
        flight.advance(SessionState::Responding);

        if results.is_empty() {
            self.say(chat, &format!("🤷 No results found for '{}'.", results.query))
                .await;
            return Ok(());
        }

        let mut text = format!("🎵 Results for '{}':\n", results.query);
        let mut keyboard: Keyboard = Vec::new();
        for (index, candidate) in results.candidates.iter().enumerate() {
            let position = index + 1;
            text.push_str(&format!("\n{position}. {}", candidate.title));
            if let Some(uploader) = &candidate.uploader {
                text.push_str(&format!(" by {uploader}"));
            }
            if let Some(duration) = candidate.duration {
                text.push_str(&format!(" ({})", format_duration(duration)));
            }

            let label = format!("{position}. {}", truncate(&candidate.title, 40));
            let action = ButtonAction::PickTrack(candidate.id.clone());
            if action.fits_callback() {
                keyboard.push(vec![Button::action(label, action)]);
            } else {
                keyboard.push(vec![Button::link(label, candidate.url.clone())]);
            }
        }

        text.push_str("\n\nTap a track to get it as MP3.");
        if let Err(e) = self
            .adapters
            .outbound
            .send_keyboard(chat, &text, keyboard)
            .await
        {
            error!(chat_id = chat.0, "failed to send search results: {e:#}");
        }
        Ok(())
    }

    async fn pick_track(&self, chat: ChatId, id: &str, flight: &InFlight) -> Result<()> {
        self.say(chat, "⏳ Downloading track...").await;

        let scratch = self.scratch.allocate()?;
        let media = self
            .fetch_with_retry(&youtube_watch_url(id), scratch.path())
            .await?;
        let audio = match media.kind {
            MediaKind::Audio => media,
            _ => self.adapters.transcoder.to_audio(&media).await?,
        };
        flight.advance(SessionState::Responding);

        self.deliver_audio(chat, &audio).await
    }

    /// One retry, and only for transient network failures.
    async fn fetch_with_retry(&self, url: &str, dest: &Path) -> Result<MediaResult> {
        match self.adapters.fetcher.fetch(url, dest).await {
            Err(e) if e.is_retryable() => {
                warn!(url = %url, error = %e, "fetch failed, retrying once");
                self.adapters.fetcher.fetch(url, dest).await
            }
            other => other,
        }
    }

    async fn deliver_audio(&self, chat: ChatId, audio: &MediaResult) -> Result<()> {
        self.check_size(&audio.path).await?;
        self.deliver(chat, audio, &format!("🎵 {}", audio.title), Vec::new())
            .await;
        Ok(())
    }

    async fn check_size(&self, path: &Path) -> Result<()> {
        let size = tokio::fs::metadata(path).await?.len();
        let size_mb = bytes_to_mb(size);
        if size_mb > self.settings.max_upload_mb as f64 {
            return Err(BotError::FileTooLarge {
                size_mb,
                limit_mb: self.settings.max_upload_mb,
            });
        }
        Ok(())
    }

    /// Uploads `media`; on failure the user is told and `false` is returned.
    async fn deliver(
        &self,
        chat: ChatId,
        media: &MediaResult,
        caption: &str,
        keyboard: Keyboard,
    ) -> bool {
        match self
            .adapters
            .outbound
            .send_media(chat, media, caption, keyboard)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(chat_id = chat.0, "upload failed: {e:#}");
                self.say(chat, "❌ Failed to upload the file to Telegram.").await;
                false
            }
        }
    }

    /// Best effort. A missing transcript never fails the delivered video.
    async fn send_transcript(&self, chat: ChatId, media: &MediaResult) {
        let Some(transcriber) = &self.adapters.transcriber else {
            return;
        };

        match transcriber.transcribe(media).await {
            Ok(Some(text)) => {
                let document = transcript_document(&media.title, &text);
                match self
                    .adapters
                    .outbound
                    .send_document(
                        chat,
                        "Transcript.txt",
                        document.into_bytes(),
                        "📝 Auto-generated transcript",
                    )
                    .await
                {
                    Ok(()) => info!(chat_id = chat.0, "transcript sent"),
                    Err(e) => error!(chat_id = chat.0, "failed to send transcript: {e:#}"),
                }
            }
            Ok(None) => info!(chat_id = chat.0, "no speech detected, transcript skipped"),
            Err(e) => warn!(chat_id = chat.0, error = %e, "transcript failed"),
        }
    }

    async fn send_join_prompt(&self, chat: ChatId, text: &str) {
        let keyboard = join_keyboard(self.settings.channel_url.as_deref(), &self.settings.join_links);
        if let Err(e) = self.adapters.outbound.send_keyboard(chat, text, keyboard).await {
            error!(chat_id = chat.0, "failed to send join prompt: {e:#}");
        }
    }

    async fn say(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.adapters.outbound.send_text(chat, text).await {
            warn!(chat_id = chat.0, "failed to send message: {e:#}");
        }
    }
}

/// Turns free text into a request. Unknown domains are rejected here, before
/// anything external is called.
fn classify(text: &str) -> Result<Request> {
    match Input::parse(text) {
        Input::Link(url) => match Platform::detect(&url) {
            Some(platform) => Ok(Request::Download {
                url: url.to_string(),
                platform,
            }),
            None => Err(BotError::UnsupportedPlatform(
                url.host_str().unwrap_or("this site").to_string(),
            )),
        },
        Input::MalformedLink(raw) => Err(BotError::UnsupportedPlatform(raw)),
        Input::Search(query) => Ok(Request::Search { query }),
    }
}

fn join_keyboard(channel_url: Option<&str>, join_links: &[JoinLink]) -> Keyboard {
    let mut keyboard: Keyboard = Vec::new();
    if let Some(url) = channel_url {
        keyboard.push(vec![Button::link("📢 Join channel", url)]);
    }
    for pair in join_links.chunks(2) {
        keyboard.push(
            pair.iter()
                .map(|link| Button::link(link.label.clone(), link.url.clone()))
                .collect(),
        );
    }
    keyboard.push(vec![Button::action("✅ I have joined", ButtonAction::Verify)]);
    keyboard
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!("could not remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::outbound::ButtonTarget;
    use crate::media::{SearchCandidate, SearchResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const USER: UserId = UserId(42);
    const CHAT: ChatId = ChatId(42);

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        Keyboard(String, Keyboard),
        Media {
            path: PathBuf,
            kind: MediaKind,
            keyboard: Keyboard,
        },
        Document {
            name: String,
            body: String,
        },
        Answer(Option<String>),
    }

    #[derive(Default)]
    struct FakeOutbound {
        sent: Mutex<Vec<Sent>>,
        fail_media: AtomicBool,
    }

    impl FakeOutbound {
        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[async_trait]
    impl Outbound for FakeOutbound {
        async fn send_text(&self, _chat: ChatId, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
            Ok(())
        }

        async fn send_keyboard(
            &self,
            _chat: ChatId,
            text: &str,
            keyboard: Keyboard,
        ) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Keyboard(text.to_string(), keyboard));
            Ok(())
        }

        async fn send_media(
            &self,
            _chat: ChatId,
            media: &MediaResult,
            _caption: &str,
            keyboard: Keyboard,
        ) -> anyhow::Result<()> {
            assert!(media.path.exists(), "delivered file must exist at upload");
            if self.fail_media.load(Ordering::SeqCst) {
                anyhow::bail!("Request Entity Too Large");
            }
            self.sent.lock().unwrap().push(Sent::Media {
                path: media.path.clone(),
                kind: media.kind,
                keyboard,
            });
            Ok(())
        }

        async fn send_document(
            &self,
            _chat: ChatId,
            file_name: &str,
            contents: Vec<u8>,
            _caption: &str,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Document {
                name: file_name.to_string(),
                body: String::from_utf8(contents).unwrap(),
            });
            Ok(())
        }

        async fn answer_button(&self, _callback_id: &str, text: Option<&str>) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Answer(text.map(str::to_string)));
            Ok(())
        }
    }

    struct FakeMembership {
        member: AtomicBool,
        unavailable: AtomicBool,
        calls: AtomicUsize,
        /// The next check parks here until notified.
        hold: Mutex<Option<Arc<Notify>>>,
        held: Notify,
    }

    impl FakeMembership {
        fn new(member: bool) -> Self {
            Self {
                member: AtomicBool::new(member),
                unavailable: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                hold: Mutex::new(None),
                held: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl MembershipVerifier for FakeMembership {
        async fn is_member(&self, _user: UserId) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hold = self.hold.lock().unwrap().take();
            if let Some(release) = hold {
                self.held.notify_one();
                release.notified().await;
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(BotError::VerificationUnavailable("bot is not admin".into()));
            }
            Ok(self.member.load(Ordering::SeqCst))
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        failures: Mutex<VecDeque<BotError>>,
        gate: Option<Arc<Notify>>,
        started: Option<Arc<Notify>>,
        extension: &'static str,
    }

    impl FakeFetcher {
        fn video() -> Self {
            Self {
                extension: "mp4",
                ..Self::default()
            }
        }

        fn failing(errors: Vec<BotError>) -> Self {
            Self {
                extension: "mp4",
                failures: Mutex::new(errors.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, url: &str, dest: &Path) -> Result<MediaResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(started) = &self.started {
                started.notify_one();
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(error) = self.failures.lock().unwrap().pop_front() {
                return Err(error);
            }

            let path = dest.join(format!("clip.{}", self.extension));
            std::fs::write(&path, b"media bytes")?;
            Ok(MediaResult {
                source_url: url.to_string(),
                path: path.clone(),
                title: "Clip".to_string(),
                uploader: Some("Uploader".to_string()),
                duration: Some(12),
                kind: MediaKind::from_extension(self.extension),
            })
        }
    }

    #[derive(Default)]
    struct FakeTranscoder {
        inputs: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn to_audio(&self, media: &MediaResult) -> Result<MediaResult> {
            self.inputs.lock().unwrap().push(media.path.clone());
            if self.fail {
                return Err(BotError::TranscodeFailure("ffmpeg missing".into()));
            }
            let path = media.path.with_extension("mp3");
            std::fs::write(&path, b"audio bytes")?;
            Ok(MediaResult {
                path,
                kind: MediaKind::Audio,
                ..media.clone()
            })
        }
    }

    #[derive(Default)]
    struct FakeTranscriber {
        inputs: Mutex<Vec<PathBuf>>,
        speech: Option<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, media: &MediaResult) -> Result<Option<String>> {
            self.inputs.lock().unwrap().push(media.path.clone());
            if self.fail {
                return Err(BotError::TranscriptFailure("HTTP 500".into()));
            }
            Ok(self.speech.map(str::to_string))
        }
    }

    #[derive(Default)]
    struct FakeSearcher {
        candidates: Vec<SearchCandidate>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Searcher for FakeSearcher {
        async fn search(&self, query: &str, limit: usize) -> Result<SearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResult {
                query: query.to_string(),
                candidates: self.candidates.iter().take(limit).cloned().collect(),
            })
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        membership: Arc<FakeMembership>,
        fetcher: Arc<FakeFetcher>,
        transcoder: Arc<FakeTranscoder>,
        searcher: Arc<FakeSearcher>,
        transcriber: Arc<FakeTranscriber>,
        outbound: Arc<FakeOutbound>,
        _root: tempfile::TempDir,
    }

    struct Parts {
        member: bool,
        fetcher: FakeFetcher,
        transcoder: FakeTranscoder,
        searcher: FakeSearcher,
        transcriber: FakeTranscriber,
        config: Config,
    }

    impl Default for Parts {
        fn default() -> Self {
            let mut config = Config::default();
            config.telegram.channel_url = Some("https://t.me/my_channel".to_string());
            Self {
                member: true,
                fetcher: FakeFetcher::video(),
                transcoder: FakeTranscoder::default(),
                searcher: FakeSearcher::default(),
                transcriber: FakeTranscriber::default(),
                config,
            }
        }
    }

    fn harness(parts: Parts) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let membership = Arc::new(FakeMembership::new(parts.member));
        let fetcher = Arc::new(parts.fetcher);
        let transcoder = Arc::new(parts.transcoder);
        let searcher = Arc::new(parts.searcher);
        let transcriber = Arc::new(parts.transcriber);
        let outbound = Arc::new(FakeOutbound::default());

        let adapters = Adapters {
            membership: membership.clone(),
            fetcher: fetcher.clone(),
            transcoder: transcoder.clone(),
            searcher: searcher.clone(),
            outbound: outbound.clone(),
            transcriber: Some(transcriber.clone()),
        };
        let scratch = ScratchSpace::new(root.path().join("downloads")).unwrap();
        let orchestrator = Arc::new(Orchestrator::new(&parts.config, adapters, scratch));

        Harness {
            orchestrator,
            membership,
            fetcher,
            transcoder,
            searcher,
            transcriber,
            outbound,
            _root: root,
        }
    }

    fn event(kind: InboundKind) -> Inbound {
        Inbound {
            user: USER,
            chat: CHAT,
            first_name: "Ada".to_string(),
            kind,
        }
    }

    fn text(body: &str) -> Inbound {
        event(InboundKind::from_text(body))
    }

    fn press(action: ButtonAction) -> Inbound {
        event(InboundKind::Button {
            callback_id: "cb-1".to_string(),
            action,
        })
    }

    impl Harness {
        async fn verified(self) -> Self {
            self.orchestrator.handle(text("/start")).await;
            self.orchestrator.handle(press(ButtonAction::Verify)).await;
            assert_eq!(self.orchestrator.session_state(USER), SessionState::Ready);
            self.outbound.take();
            self.membership.calls.store(0, Ordering::SeqCst);
            self
        }

        fn state(&self) -> SessionState {
            self.orchestrator.session_state(USER)
        }
    }

    fn texts(sent: &[Sent]) -> Vec<&str> {
        sent.iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t.as_str()),
                Sent::Keyboard(t, _) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn convert_token(sent: &[Sent]) -> String {
        sent.iter()
            .find_map(|s| match s {
                Sent::Media { keyboard, .. } => keyboard.iter().flatten().find_map(|b| match &b.target {
                    ButtonTarget::Action(ButtonAction::ConvertToAudio(token)) => Some(token.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .expect("video should carry a convert button")
    }

    fn candidate(id: &str, title: &str) -> SearchCandidate {
        SearchCandidate {
            id: id.to_string(),
            title: title.to_string(),
            url: youtube_watch_url(id),
            uploader: Some("Artist".to_string()),
            duration: Some(225),
        }
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("https://youtu.be/abc"),
            Ok(Request::Download {
                platform: Platform::YouTube,
                ..
            })
        ));
        assert!(matches!(
            classify("https://vimeo.com/1"),
            Err(BotError::UnsupportedPlatform(host)) if host == "vimeo.com"
        ));
        assert_eq!(
            classify("Despacito").unwrap(),
            Request::Search {
                query: "Despacito".to_string()
            }
        );
    }

    #[test]
    fn test_join_keyboard_layout() {
        let links = vec![
            JoinLink {
                label: "YouTube".to_string(),
                url: "https://youtube.com/@me".to_string(),
            },
            JoinLink {
                label: "Instagram".to_string(),
                url: "https://instagram.com/me".to_string(),
            },
            JoinLink {
                label: "TikTok".to_string(),
                url: "https://tiktok.com/@me".to_string(),
            },
        ];
        let keyboard = join_keyboard(Some("https://t.me/c"), &links);
        assert_eq!(keyboard.len(), 4);
        assert_eq!(keyboard[1].len(), 2);
        assert_eq!(keyboard[2].len(), 1);
        assert_eq!(
            keyboard.last().unwrap()[0].target,
            ButtonTarget::Action(ButtonAction::Verify)
        );

        let bare = join_keyboard(None, &[]);
        assert_eq!(bare.len(), 1);
    }

    #[tokio::test]
    async fn test_start_then_verify_flow() {
        let h = harness(Parts {
            member: false,
            ..Parts::default()
        });
        assert_eq!(h.state(), SessionState::AwaitingStart);

        h.orchestrator.handle(text("/start")).await;
        assert_eq!(h.state(), SessionState::AwaitingVerification);
        let sent = h.outbound.take();
        assert!(matches!(&sent[0], Sent::Keyboard(t, kb) if t.contains("Ada") && kb.len() == 2));

        h.orchestrator.handle(press(ButtonAction::Verify)).await;
        assert_eq!(h.state(), SessionState::AwaitingVerification);
        let sent = h.outbound.take();
        assert_eq!(sent[0], Sent::Answer(Some("Checking membership...".to_string())));
        assert!(texts(&sent).iter().any(|t| t.contains("haven't joined")));

        h.membership.member.store(true, Ordering::SeqCst);
        h.orchestrator.handle(press(ButtonAction::Verify)).await;
        assert_eq!(h.state(), SessionState::Ready);
        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("Verification successful")));
    }

    #[tokio::test]
    async fn test_verification_unavailable_fails_closed() {
        let h = harness(Parts::default());
        h.membership.unavailable.store(true, Ordering::SeqCst);

        h.orchestrator.handle(text("/start")).await;
        h.orchestrator.handle(press(ButtonAction::Verify)).await;

        assert_eq!(h.state(), SessionState::AwaitingVerification);
        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("couldn't verify")));
    }

    #[tokio::test]
    async fn test_locked_user_cannot_request() {
        let h = harness(Parts::default());

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.membership.calls.load(Ordering::SeqCst), 0);
        assert!(texts(&h.outbound.take())[0].contains("Access locked"));
    }

    #[tokio::test]
    async fn test_video_then_convert_reuses_fetched_file() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator.handle(text("https://www.youtube.com/watch?v=abc")).await;
        assert_eq!(h.state(), SessionState::Ready);
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.membership.calls.load(Ordering::SeqCst), 1);

        let sent = h.outbound.take();
        let video_path = sent
            .iter()
            .find_map(|s| match s {
                Sent::Media {
                    path,
                    kind: MediaKind::Video,
                    ..
                } => Some(path.clone()),
                _ => None,
            })
            .expect("video delivered");
        assert!(video_path.exists(), "video retained for follow-up");

        let token = convert_token(&sent);
        h.orchestrator
            .handle(press(ButtonAction::ConvertToAudio(token)))
            .await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1, "no second fetch");
        assert_eq!(h.membership.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*h.transcoder.inputs.lock().unwrap(), vec![video_path.clone()]);

        let sent = h.outbound.take();
        let audio_path = sent
            .iter()
            .find_map(|s| match s {
                Sent::Media {
                    path,
                    kind: MediaKind::Audio,
                    ..
                } => Some(path.clone()),
                _ => None,
            })
            .expect("audio delivered");
        assert!(!audio_path.exists(), "audio removed after delivery");
        assert!(video_path.exists(), "input left untouched");
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_unsupported_platform_makes_no_external_calls() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator.handle(text("https://vimeo.com/12345")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.membership.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 0);
        let sent = h.outbound.take();
        assert_eq!(sent.len(), 1);
        assert!(texts(&sent)[0].contains("vimeo.com"));
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_lapsed_membership_returns_to_verification() {
        let h = harness(Parts::default()).verified().await;
        h.membership.member.store(false, Ordering::SeqCst);

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.state(), SessionState::AwaitingVerification);
        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("no longer a member")));
    }

    #[tokio::test]
    async fn test_membership_error_during_dispatch_fails_closed() {
        let h = harness(Parts::default()).verified().await;
        h.membership.unavailable.store(true, Ordering::SeqCst);

        h.orchestrator.handle(text("Despacito")).await;

        assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.state(), SessionState::AwaitingVerification);
    }

    #[tokio::test]
    async fn test_search_lists_candidates_in_order() {
        let h = harness(Parts {
            searcher: FakeSearcher {
                candidates: vec![
                    candidate("kJQP7kiw5Fk", "Despacito"),
                    candidate("72UO0v5ESUo", "Despacito (Remix)"),
                ],
                ..FakeSearcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("Despacito")).await;

        let sent = h.outbound.take();
        let (body, keyboard) = sent
            .iter()
            .find_map(|s| match s {
                Sent::Keyboard(t, kb) => Some((t.clone(), kb.clone())),
                _ => None,
            })
            .expect("result list");
        let first = body.find("1. Despacito").unwrap();
        let second = body.find("2. Despacito (Remix)").unwrap();
        assert!(first < second);
        assert!(body.contains("3:45"));
        assert_eq!(
            keyboard[0][0].target,
            ButtonTarget::Action(ButtonAction::PickTrack("kJQP7kiw5Fk".to_string()))
        );
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_empty_search_is_explicit_response() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator.handle(text("zzqqxx nothing matches")).await;

        let sent = h.outbound.take();
        assert!(texts(&sent).iter().any(|t| t.contains("No results found")));
        assert!(!texts(&sent).iter().any(|t| t.starts_with('❌')));
    }

    #[tokio::test]
    async fn test_pick_track_delivers_audio_and_cleans_up() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator
            .handle(press(ButtonAction::PickTrack("kJQP7kiw5Fk".to_string())))
            .await;

        let sent = h.outbound.take();
        let audio_path = sent
            .iter()
            .find_map(|s| match s {
                Sent::Media {
                    path,
                    kind: MediaKind::Audio,
                    ..
                } => Some(path.clone()),
                _ => None,
            })
            .expect("audio delivered");
        assert!(!audio_path.exists(), "scratch removed after delivery");
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.transcoder.inputs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_retried_once() {
        let h = harness(Parts {
            fetcher: FakeFetcher::failing(vec![BotError::NetworkFailure("reset".into())]),
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(h
            .outbound
            .take()
            .iter()
            .any(|s| matches!(s, Sent::Media { .. })));
    }

    #[tokio::test]
    async fn test_persistent_network_failure_gives_up() {
        let h = harness(Parts {
            fetcher: FakeFetcher::failing(vec![
                BotError::NetworkFailure("reset".into()),
                BotError::NetworkFailure("reset".into()),
                BotError::NetworkFailure("reset".into()),
            ]),
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("Network error")));
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_private_media_not_retried() {
        let h = harness(Parts {
            fetcher: FakeFetcher::failing(vec![BotError::PrivateOrUnavailable("private".into())]),
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://www.instagram.com/p/xyz/")).await;

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("private")));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_scratch_files() {
        let h = harness(Parts {
            fetcher: FakeFetcher::failing(vec![BotError::UnsupportedFormat("nope".into())]),
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://x.com/u/status/1")).await;

        let root = h.orchestrator.scratch.root().to_path_buf();
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_and_removed() {
        let mut config = Parts::default().config;
        config.media.max_upload_mb = 0;
        let h = harness(Parts {
            config,
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        let sent = h.outbound.take();
        assert!(!sent.iter().any(|s| matches!(s, Sent::Media { .. })));
        assert!(texts(&sent).iter().any(|t| t.contains("too large")));
        let root = h.orchestrator.scratch.root().to_path_buf();
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_is_reported() {
        let h = harness(Parts {
            transcoder: FakeTranscoder {
                fail: true,
                ..FakeTranscoder::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;
        let token = convert_token(&h.outbound.take());
        h.orchestrator
            .handle(press(ButtonAction::ConvertToAudio(token)))
            .await;

        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("convert")));
        assert_eq!(h.transcoder.inputs.lock().unwrap().len(), 1);
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_expired_token_is_reported() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator
            .handle(press(ButtonAction::ConvertToAudio("deadbeef".to_string())))
            .await;

        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("expired")));
        assert!(h.transcoder.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_image_has_no_convert_button() {
        let h = harness(Parts {
            fetcher: FakeFetcher {
                extension: "jpg",
                ..FakeFetcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://pin.it/abc")).await;

        let sent = h.outbound.take();
        assert!(sent.iter().any(|s| matches!(
            s,
            Sent::Media { kind: MediaKind::Image, keyboard, .. } if keyboard.is_empty()
        )));
    }

    #[tokio::test]
    async fn test_one_request_in_flight_per_user() {
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let h = harness(Parts {
            fetcher: FakeFetcher {
                extension: "mp4",
                gate: Some(gate.clone()),
                started: Some(started.clone()),
                ..FakeFetcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator.handle(text("https://youtu.be/first")).await;
        });
        started.notified().await;
        assert_eq!(h.state(), SessionState::AwaitingResult);

        h.orchestrator.handle(text("https://youtu.be/second")).await;
        h.orchestrator.handle(text("Despacito")).await;
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.searcher.calls.load(Ordering::SeqCst), 0);

        gate.notify_one();
        first.await.unwrap();

        let sent = h.outbound.take();
        let busy = texts(&sent)
            .iter()
            .filter(|t| t.contains("still working"))
            .count();
        assert_eq!(busy, 2);
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_start_when_ready_rechecks_membership() {
        let h = harness(Parts::default()).verified().await;

        h.orchestrator.handle(text("/start")).await;
        assert_eq!(h.state(), SessionState::Ready);
        assert!(texts(&h.outbound.take())[0].contains("Welcome back"));

        h.membership.member.store(false, Ordering::SeqCst);
        h.orchestrator.handle(text("/start")).await;
        assert_eq!(h.state(), SessionState::AwaitingVerification);
    }

    #[tokio::test]
    async fn test_start_during_request_keeps_single_flight() {
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let h = harness(Parts {
            fetcher: FakeFetcher {
                extension: "mp4",
                gate: Some(gate.clone()),
                started: Some(started.clone()),
                ..FakeFetcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        // /start reads Ready, then parks inside its membership check.
        let release = Arc::new(Notify::new());
        *h.membership.hold.lock().unwrap() = Some(release.clone());
        let orchestrator = h.orchestrator.clone();
        let start = tokio::spawn(async move {
            orchestrator.handle(text("/start")).await;
        });
        h.membership.held.notified().await;

        let orchestrator = h.orchestrator.clone();
        let first = tokio::spawn(async move {
            orchestrator.handle(text("https://youtu.be/first")).await;
        });
        started.notified().await;
        assert_eq!(h.state(), SessionState::AwaitingResult);

        h.membership.member.store(false, Ordering::SeqCst);
        release.notify_one();
        start.await.unwrap();
        assert_eq!(h.state(), SessionState::AwaitingResult);

        h.membership.member.store(true, Ordering::SeqCst);
        h.orchestrator.handle(press(ButtonAction::Verify)).await;
        assert_eq!(h.state(), SessionState::AwaitingResult);

        h.orchestrator.handle(text("https://youtu.be/second")).await;
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_transcript_follows_video() {
        let h = harness(Parts {
            transcriber: FakeTranscriber {
                speech: Some("hello there"),
                ..FakeTranscriber::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        let sent = h.outbound.take();
        let video_at = sent
            .iter()
            .position(|s| matches!(s, Sent::Media { kind: MediaKind::Video, .. }))
            .expect("video delivered");
        let (doc_at, name, body) = sent
            .iter()
            .enumerate()
            .find_map(|(i, s)| match s {
                Sent::Document { name, body } => Some((i, name.clone(), body.clone())),
                _ => None,
            })
            .expect("transcript delivered");
        assert!(doc_at > video_at);
        assert_eq!(name, "Transcript.txt");
        assert!(body.starts_with("Transcript for: Clip"));
        assert!(body.contains("hello there"));

        let inputs = h.transcriber.inputs.lock().unwrap().clone();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].ends_with("clip.mp4"));
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_transcript_failure_is_quiet() {
        let h = harness(Parts {
            transcriber: FakeTranscriber {
                fail: true,
                ..FakeTranscriber::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        let sent = h.outbound.take();
        assert!(sent.iter().any(|s| matches!(s, Sent::Media { .. })));
        assert!(!sent.iter().any(|s| matches!(s, Sent::Document { .. })));
        assert!(!texts(&sent).iter().any(|t| t.starts_with('❌')));
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_images_and_silence_get_no_transcript() {
        let h = harness(Parts {
            fetcher: FakeFetcher {
                extension: "jpg",
                ..FakeFetcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("https://pin.it/abc")).await;

        assert!(h.transcriber.inputs.lock().unwrap().is_empty());
        assert!(!h
            .outbound
            .take()
            .iter()
            .any(|s| matches!(s, Sent::Document { .. })));
    }

    #[tokio::test]
    async fn test_failed_upload_releases_retained_video() {
        let h = harness(Parts {
            transcriber: FakeTranscriber {
                speech: Some("hello"),
                ..FakeTranscriber::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;
        h.outbound.fail_media.store(true, Ordering::SeqCst);

        h.orchestrator.handle(text("https://youtu.be/abc")).await;

        assert!(texts(&h.outbound.take())
            .iter()
            .any(|t| t.contains("Failed to upload")));
        assert!(h.transcriber.inputs.lock().unwrap().is_empty());
        let root = h.orchestrator.scratch.root().to_path_buf();
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
        assert_eq!(h.state(), SessionState::Ready);
    }

    #[test]
    fn test_pinterest_lookalike_is_unsupported() {
        assert!(matches!(
            classify("https://pinterest.attacker.example/x"),
            Err(BotError::UnsupportedPlatform(host)) if host == "pinterest.attacker.example"
        ));
    }

    #[tokio::test]
    async fn test_search_listing_names_uploader() {
        let h = harness(Parts {
            searcher: FakeSearcher {
                candidates: vec![candidate("kJQP7kiw5Fk", "Despacito")],
                ..FakeSearcher::default()
            },
            ..Parts::default()
        })
        .verified()
        .await;

        h.orchestrator.handle(text("Despacito")).await;

        let sent = h.outbound.take();
        assert!(texts(&sent)
            .iter()
            .any(|t| t.contains("1. Despacito by Artist (3:45)")));
    }
}
