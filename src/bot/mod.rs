use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::TelegramSettings;
use crate::handlers::types::ComposedResponse;

const START_TEXT: &str = "Hello, I will tell you whether what you heard is fake news or not. \
                          Send me what you heard with /verify";
const HELP_TEXT: &str = "add /verify to the text you want to send";
const PROMPT_TEXT: &str = "Provide text to verify";

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    text: Option<String>,
    reply_to_message: Option<Box<TgMessage>>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

/// What a chat message asks the bot to do.
#[derive(Debug, PartialEq)]
pub enum Command {
    Start,
    Help,
    Clear,
    /// `/verify` with inline arguments, or bare (text may come from a reply).
    Verify(Option<String>),
    Other,
}

pub fn parse_command(text: &str) -> Command {
    let trimmed = text.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    // Commands may carry the bot's username suffix in group chats.
    let head = head.split('@').next().unwrap_or(head);

    match head {
        "/start" => Command::Start,
        "/help" => Command::Help,
        "/clear" => Command::Clear,
        "/verify" => {
            if rest.is_empty() {
                Command::Verify(None)
            } else {
                Command::Verify(Some(rest.to_string()))
            }
        }
        _ => Command::Other,
    }
}

/// Picks the claim to verify: inline arguments win, otherwise the text of
/// the replied-to message. `None` means the bot prompts and makes no
/// backend call.
fn resolve_claim(args: Option<String>, reply_text: Option<&str>) -> Option<String> {
    args.or_else(|| reply_text.map(|t| t.to_string()))
}

/// Long-polling Telegram dispatcher. Each update is handled in its own task
/// so one chat's backend round-trip never blocks another chat.
pub struct TelegramBot {
    client: Client,
    api_base: String,
    settings: TelegramSettings,
    voice_dir: PathBuf,
    /// Last answer per chat. Ephemeral; dropped by /clear and on restart.
    sessions: Mutex<HashMap<i64, String>>,
}

impl TelegramBot {
    pub fn new(settings: TelegramSettings, voice_dir: impl Into<PathBuf>) -> Self {
        let api_base = format!("https://api.telegram.org/bot{}", settings.token);
        Self {
            client: Client::new(),
            api_base,
            settings,
            voice_dir: voice_dir.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("Telegram bot polling started");
        let mut offset: i64 = 0;
        loop {
            match self.poll_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            let bot = self.clone();
                            tokio::spawn(async move {
                                bot.handle_message(message).await;
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("getUpdates failed: {:#}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                }
            }
        }
    }

    async fn poll_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
        let resp = self
            .client
            .get(format!("{}/getUpdates", self.api_base))
            .query(&[("timeout", 30i64), ("offset", offset)])
            // Longer than the long-poll window so Telegram closes first.
            .timeout(std::time::Duration::from_secs(40))
            .send()
            .await
            .context("Failed to poll Telegram updates")?;

        let updates: UpdatesResponse = resp
            .json()
            .await
            .context("Failed to parse Telegram updates")?;
        if !updates.ok {
            anyhow::bail!("Telegram getUpdates returned ok=false");
        }
        Ok(updates.result)
    }

    async fn handle_message(&self, message: TgMessage) {
        let chat_id = message.chat.id;
        let Some(text) = message.text.as_deref() else {
            return;
        };

        match parse_command(text) {
            Command::Start => self.reply(chat_id, START_TEXT).await,
            Command::Help => self.reply(chat_id, HELP_TEXT).await,
            Command::Clear => {
                self.sessions.lock().unwrap().remove(&chat_id);
                self.reply(chat_id, "Chat context has been cleared.").await;
            }
            Command::Verify(args) => {
                let reply_text = message
                    .reply_to_message
                    .as_ref()
                    .and_then(|m| m.text.as_deref());
                match resolve_claim(args, reply_text) {
                    Some(claim) => self.verify(chat_id, claim).await,
                    None => self.reply(chat_id, PROMPT_TEXT).await,
                }
            }
            Command::Other => {}
        }
    }

    /// Forwards the claim to the backend and delivers text plus (if present)
    /// a voice message. No automatic retry; the user re-issues the command.
    async fn verify(&self, chat_id: i64, claim: String) {
        self.send_chat_action(chat_id, "typing").await;

        let body = json!({
            "model_name": self.settings.model_name,
            "model_provider": self.settings.model_provider,
            "system_prompt": self.settings.system_prompt,
            "messages": [claim],
            "allow_search": true,
            "tts_enabled": true,
            "voice_name": self.settings.voice_name,
        });

        let resp = match self
            .client
            .post(&self.settings.backend_url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Backend call failed: {:#}", e);
                self.reply(chat_id, &format!("Error connecting to server: {}", e))
                    .await;
                return;
            }
        };

        if !resp.status().is_success() {
            warn!("Backend returned status {}", resp.status());
            self.reply(chat_id, "Sorry, something went wrong").await;
            return;
        }

        let result: ComposedResponse = match resp.json().await {
            Ok(result) => result,
            Err(e) => {
                warn!("Backend response was not a composed response: {:#}", e);
                self.reply(chat_id, "Sorry, something went wrong").await;
                return;
            }
        };

        self.reply(chat_id, &result.text).await;
        self.sessions
            .lock()
            .unwrap()
            .insert(chat_id, result.text.clone());

        if let Some(encoded) = result.audio {
            if let Err(e) = self.send_voice(chat_id, &encoded).await {
                warn!("Failed to deliver voice message: {:#}", e);
            }
        }
    }

    /// Decodes the base64 audio to a transient local file, ships it as a
    /// voice message, then removes the file. One file per chat, overwritten
    /// on each invocation, so nothing accumulates.
    async fn send_voice(&self, chat_id: i64, encoded: &str) -> anyhow::Result<()> {
        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .context("Backend audio was not valid base64")?;

        tokio::fs::create_dir_all(&self.voice_dir)
            .await
            .context("Failed to create voice scratch dir")?;
        let path = self.voice_dir.join(format!("voice-{}.mp3", chat_id));
        tokio::fs::write(&path, &bytes)
            .await
            .context("Failed to write voice file")?;

        let voice = tokio::fs::read(&path)
            .await
            .context("Failed to read voice file back")?;
        let part = multipart::Part::bytes(voice)
            .file_name("reply.mp3")
            .mime_str("audio/mpeg")?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("voice", part);

        let resp = self
            .client
            .post(format!("{}/sendVoice", self.api_base))
            .multipart(form)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send voice message")?;
        if !resp.status().is_success() {
            error!("sendVoice returned status {}", resp.status());
        }

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove voice file {}: {}", path.display(), e);
        }
        Ok(())
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        let body = json!({ "chat_id": chat_id, "text": text });
        if let Err(e) = self
            .client
            .post(format!("{}/sendMessage", self.api_base))
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
        {
            warn!("sendMessage to chat {} failed: {:#}", chat_id, e);
        }
    }

    async fn send_chat_action(&self, chat_id: i64, action: &str) {
        let body = json!({ "chat_id": chat_id, "action": action });
        if let Err(e) = self
            .client
            .post(format!("{}/sendChatAction", self.api_base))
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
        {
            warn!("sendChatAction to chat {} failed: {:#}", chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/start"), Command::Start);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("hello there"), Command::Other);
    }

    #[test]
    fn parses_verify_with_inline_arguments() {
        assert_eq!(
            parse_command("/verify the moon is cheese"),
            Command::Verify(Some("the moon is cheese".to_string()))
        );
        assert_eq!(parse_command("/verify"), Command::Verify(None));
        assert_eq!(parse_command("/verify   "), Command::Verify(None));
    }

    #[test]
    fn strips_bot_username_suffix() {
        assert_eq!(parse_command("/start@factbot"), Command::Start);
        assert_eq!(
            parse_command("/verify@factbot claim text"),
            Command::Verify(Some("claim text".to_string()))
        );
    }

    #[test]
    fn verify_without_text_or_reply_makes_no_backend_call() {
        // The prompt path: nothing to resolve, so the handler replies
        // "Provide text to verify" and returns before any backend call.
        assert_eq!(resolve_claim(None, None), None);
    }

    #[test]
    fn inline_arguments_win_over_replied_message() {
        assert_eq!(
            resolve_claim(Some("inline".to_string()), Some("replied")),
            Some("inline".to_string())
        );
        assert_eq!(
            resolve_claim(None, Some("replied")),
            Some("replied".to_string())
        );
    }
}
