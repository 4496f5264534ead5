use async_trait::async_trait;
use derive_more::Display;
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::Write;
use teloxide::{
    adaptors::throttle::{Limits, Throttle},
    prelude::*,
    sugar::request::RequestLinkPreviewExt,
    types::{MessageId, ParseMode, ThreadId},
    Bot,
};

use crate::config::TelegramConfig;

/// Escape special characters for MarkdownV2
fn escape_markdownv2(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' => {
                format!("\\{}", c)
            }
            _ => c.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NotificationLevel {
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "success")]
    Success,
    #[display(fmt = "warning")]
    Warning,
    #[display(fmt = "error")]
    Error,
}

/// A user-visible message about the progress of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    fn to_markdown(&self) -> String {
        let icon = match self.level {
            NotificationLevel::Info => "🔵",
            NotificationLevel::Success => "🟢",
            NotificationLevel::Warning => "🟡",
            NotificationLevel::Error => "🔴",
        };
        format!(
            "{} *{}*\n{}",
            icon,
            escape_markdownv2(&self.title),
            escape_markdownv2(&self.description)
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Logs every notification and forwards it to Telegram when configured.
pub struct NotificationHandler {
    telegram: Option<TelegramTarget>,
}

struct TelegramTarget {
    bot: Throttle<Bot>,
    chat_id: String,
    thread_id: Option<u64>,
}

impl NotificationHandler {
    pub fn log_only() -> Self {
        Self { telegram: None }
    }

    /// Must be called inside a tokio runtime; the throttle spawns a worker.
    pub fn with_telegram(token: String, chat_id: String, thread_id: Option<u64>) -> Self {
        let bot = Bot::new(token).throttle(Limits::default());
        Self {
            telegram: Some(TelegramTarget {
                bot,
                chat_id,
                thread_id,
            }),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        if let (Some(token), Some(chat_id)) = (&config.token, &config.chat_id) {
            if !token.is_empty() && !chat_id.is_empty() {
                return Self::with_telegram(token.clone(), chat_id.clone(), config.thread_id);
            }
        }
        Self::log_only()
    }

    pub fn is_forwarding(&self) -> bool {
        self.telegram.is_some()
    }

    async fn forward(&self, target: &TelegramTarget, notification: &Notification) {
        let mut request = target
            .bot
            .send_message(target.chat_id.clone(), notification.to_markdown())
            .disable_link_preview(true)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(ThreadId(MessageId(thread_id as i32)));
        }

        if let Err(e) = request.send().await {
            let error_msg = format!("Failed to send notification: {}", e);
            warn!("{}", &error_msg);

            if let Err(log_err) = log_error_to_file(&error_msg) {
                error!("Failed to write to log file: {}", log_err);
            }
        }
    }
}

#[async_trait]
impl Notifier for NotificationHandler {
    async fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                error!("{}: {}", notification.title, notification.description)
            }
            NotificationLevel::Warning => {
                warn!("{}: {}", notification.title, notification.description)
            }
            _ => info!("{}: {}", notification.title, notification.description),
        }

        if let Some(target) = &self.telegram {
            self.forward(target, &notification).await;
        }
    }
}

/// Log error message to a log file
fn log_error_to_file(error_msg: &str) -> std::io::Result<()> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_entry = format!("[{}] {}\n", timestamp, error_msg);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("log.txt")?;

    file.write_all(log_entry.as_bytes())
}
