/// 聊天消息邮件通知
///
/// 每条用户聊天消息都会给管理员发一封邮件；未配置 SMTP 时通知关闭
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::SmtpConfig;

/// 发件人缺省时的显示名
const ANONYMOUS_SENDER: &str = "Anonymous";

/// 一封待发送的通知邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// 组装聊天通知邮件
pub fn compose_chat_email(message: &str, sender: Option<&str>, at: DateTime<Utc>) -> ChatEmail {
    let sender = sender
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_SENDER);
    let time = at.format("%Y-%m-%d %H:%M:%S UTC");

    let text = format!(
        "New message received from {}:\n\n{}\n\nTime: {}\n",
        sender, message, time
    );

    let html = format!(
        "<h2>New Chat Message Received</h2>\n\
         <p><strong>From:</strong> {}</p>\n\
         <p><strong>Message:</strong></p>\n\
         <p style=\"padding: 10px; background-color: #f5f5f5; border-radius: 4px;\">{}</p>\n\
         <p><small>Time: {}</small></p>\n",
        escape_html(sender),
        escape_html(message),
        time
    );

    ChatEmail {
        subject: "New Chat Message Received".to_string(),
        text,
        html,
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
}

/// 聊天通知器
#[derive(Clone)]
pub struct ChatNotifier {
    mailer: Option<Arc<Mailer>>,
}

impl ChatNotifier {
    /// 不发送任何邮件
    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    /// 按 SMTP 配置创建（STARTTLS）
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| anyhow!("SMTP 配置无效: {}", e))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        info!("聊天邮件通知已启用，收件人: {}", config.admin_email);
        Ok(Self {
            mailer: Some(Arc::new(Mailer {
                transport,
                from: config.username.clone(),
                to: config.admin_email.clone(),
            })),
        })
    }

    /// 后台发送，不阻塞消息转发
    pub fn notify_chat(&self, message: &str, sender: Option<&str>) {
        let Some(mailer) = self.mailer.clone() else {
            debug!("聊天邮件通知未启用");
            return;
        };

        let email = compose_chat_email(message, sender, Utc::now());
        tokio::spawn(async move {
            match mailer.send(email).await {
                Ok(()) => info!("聊天邮件通知已发送"),
                Err(e) => error!("聊天邮件通知发送失败: {}", e),
            }
        });
    }
}

impl Mailer {
    async fn send(&self, email: ChatEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(self.to.parse()?)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_compose_with_sender() {
        let email = compose_chat_email("hello there", Some("user"), at());
        assert_eq!(email.subject, "New Chat Message Received");
        assert!(email.text.contains("from user:"));
        assert!(email.text.contains("hello there"));
        assert!(email.text.contains("2024-05-01 12:30:00 UTC"));
        assert!(email.html.contains("<strong>From:</strong> user"));
    }

    #[test]
    fn test_compose_defaults_to_anonymous() {
        for sender in [None, Some(""), Some("  ")] {
            let email = compose_chat_email("hi", sender, at());
            assert!(email.text.contains("from Anonymous:"));
        }
    }

    #[test]
    fn test_html_is_escaped() {
        let email = compose_chat_email("<script>alert('x')</script>", Some("<b>"), at());
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(email.html.contains("&lt;b&gt;"));
        // 纯文本部分保持原样
        assert!(email.text.contains("<script>"));
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = ChatNotifier::disabled();
        assert!(notifier.mailer.is_none());
        notifier.notify_chat("hello", None);
    }

    #[tokio::test]
    async fn test_enabled_from_config() {
        let notifier = ChatNotifier::from_config(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "relay@example.com".to_string(),
            password: "pw".to_string(),
            admin_email: "admin@example.com".to_string(),
        })
        .unwrap();
        assert!(notifier.mailer.is_some());
    }
}
