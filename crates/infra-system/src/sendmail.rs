// Sendmail notifier
// Hands completion notices to the local MTA through a child process
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use sweeper_core::port::{Notification, NotificationError, NotificationSender};

/// Default MTA binary
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

/// Upper bound for one delivery (30s)
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers notifications with `sendmail -t -i`: recipients are read from
/// the headers, a lone `.` line does not end the message.
pub struct SendmailNotifier {
    program: String,
    args: Vec<String>,
    from: Option<String>,
    send_timeout: Duration,
}

impl SendmailNotifier {
    /// Create a notifier
    ///
    /// # Example
    /// ```ignore
    /// let notifier = SendmailNotifier::new("/usr/sbin/sendmail")
    ///     .with_from("sweeper@example.com");
    /// ```
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-t".to_string(), "-i".to_string()],
            from: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Replace the default `-t -i` arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// RFC 5322 message as written to the MTA's stdin
    pub fn render(&self, notification: &Notification) -> Result<String, NotificationError> {
        let to = notification.to.trim();
        if to.is_empty() || !to.contains('@') || has_line_break(to) {
            return Err(NotificationError::InvalidAddress(notification.to.clone()));
        }

        let mut message = format!("To: {}\r\n", to);
        if let Some(from) = &self.from {
            if has_line_break(from) {
                return Err(NotificationError::InvalidAddress(from.clone()));
            }
            message.push_str(&format!("From: {}\r\n", from));
        }
        message.push_str(&format!(
            "Subject: {}\r\n",
            encode_header_text(&single_line(&notification.subject))
        ));
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
        message.push_str(&notification.body.replace("\r\n", "\n").replace('\n', "\r\n"));
        if !message.ends_with("\r\n") {
            message.push_str("\r\n");
        }
        Ok(message)
    }

    async fn deliver(&self, message: &str) -> Result<std::process::Output, NotificationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                NotificationError::Transport(format!("Cannot start {}: {}", self.program, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| NotificationError::Transport("stdin not captured".to_string()))?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        // EOF ends the message
        drop(stdin);

        child
            .wait_with_output()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))
    }
}

impl Default for SendmailNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_SENDMAIL_PATH)
    }
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

fn single_line(s: &str) -> String {
    s.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// RFC 2047 Q-encoding for non-ASCII header text. Encoded words stay within
/// 75 characters and are folded onto continuation lines.
fn encode_header_text(text: &str) -> String {
    const PREFIX: &str = "=?UTF-8?Q?";
    const SUFFIX: &str = "?=";
    const MAX_PAYLOAD: usize = 75 - PREFIX.len() - SUFFIX.len();

    if text.is_ascii() {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut payload = String::new();
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let encoded: String = c
            .encode_utf8(&mut buf)
            .bytes()
            .map(|b| match b {
                b' ' => "_".to_string(),
                b if b.is_ascii_alphanumeric() || b"!*+-/".contains(&b) => (b as char).to_string(),
                b => format!("={:02X}", b),
            })
            .collect();
        // a character's bytes never straddle two words
        if payload.len() + encoded.len() > MAX_PAYLOAD {
            words.push(std::mem::take(&mut payload));
        }
        payload.push_str(&encoded);
    }
    if !payload.is_empty() {
        words.push(payload);
    }

    words
        .iter()
        .map(|w| format!("{}{}{}", PREFIX, w, SUFFIX))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

#[async_trait]
impl NotificationSender for SendmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let message = self.render(notification)?;
        debug!(program = %self.program, to = %notification.to, "Handing message to MTA");

        let output = match timeout(self.send_timeout, self.deliver(&message)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NotificationError::Timeout(
                    self.send_timeout.as_millis() as u64
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(NotificationError::Rejected(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.status.code(),
                stderr
            )));
        }

        info!(to = %notification.to, subject = %notification.subject, "Notification handed to MTA");
        Ok(())
    }
}
