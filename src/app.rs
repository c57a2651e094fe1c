use tokio::task::JoinHandle;

use crate::client::ChatClient;
use crate::config::Config;

/// Reply shown for every failed exchange, whatever the underlying cause.
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting to the server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Bot,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state. Append-only; insertion order is display order.
    messages: Vec<ChatMessage>,

    // Composer state
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Request state
    pub loading: bool,
    pub pending_reply: Option<JoinHandle<anyhow::Result<String>>>,

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Network
    pub client: ChatClient,
    pub server_url: String,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let server_url = config.endpoint();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages: Vec::new(),

            input: String::new(),
            input_cursor: 0,

            loading: false,
            pending_reply: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            client: ChatClient::new(&server_url),
            server_url,
        }
    }

    /// Append a message to the conversation. The only mutation of the
    /// sequence; earlier entries are never edited, reordered, or dropped.
    /// Re-pins the viewport so the newest entry is visible.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.scroll_chat_to_bottom();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// A submission may start when the composer has real content and no
    /// request is already in flight.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty() && self.pending_reply.is_none()
    }

    /// Take the composer text for submission, leaving it cleared.
    pub fn take_input(&mut self) -> String {
        self.input_cursor = 0;
        std::mem::take(&mut self.input)
    }

    /// Complete the in-flight exchange. Success appends the reply verbatim;
    /// every failure collapses to the one fallback message, with the detail
    /// going to the log only.
    pub fn finish_request(&mut self, outcome: anyhow::Result<String>) {
        match outcome {
            Ok(reply) => self.push_message(ChatMessage::bot(reply)),
            Err(err) => {
                tracing::error!("chat request failed: {err:#}");
                self.push_message(ChatMessage::bot(FALLBACK_REPLY));
            }
        }
        self.loading = false;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll the chat so the newest entry (and the "Thinking..." row, when
    /// loading) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Role line ("You:" or "Bot:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        // Room for the "Thinking..." indicator
        total_lines += 2;

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }

    // Manual chat scrolling
    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn test_app() -> App {
        App::new(&Config::default())
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut app = test_app();
        app.push_message(ChatMessage::user("first"));
        app.push_message(ChatMessage::bot("second"));
        app.push_message(ChatMessage::user("third"));

        let contents: Vec<&str> = app.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(app.messages()[0].role, ChatRole::User);
        assert_eq!(app.messages()[1].role, ChatRole::Bot);
    }

    #[test]
    fn successful_exchange_appends_the_reply_verbatim() {
        let mut app = test_app();
        app.push_message(ChatMessage::user("Hello"));
        app.loading = true;

        app.finish_request(Ok("Hi there!".to_string()));

        assert_eq!(app.messages().len(), 2);
        assert_eq!(app.messages()[1].role, ChatRole::Bot);
        assert_eq!(app.messages()[1].content, "Hi there!");
        assert!(!app.loading);
    }

    #[test]
    fn failed_exchange_appends_the_fallback_reply() {
        let mut app = test_app();
        app.push_message(ChatMessage::user("Hello"));
        app.loading = true;

        app.finish_request(Err(anyhow!("connection refused")));

        assert_eq!(app.messages().len(), 2);
        assert_eq!(app.messages()[1].content, FALLBACK_REPLY);
        assert!(!app.loading);
    }

    #[test]
    fn can_submit_requires_post_trim_content() {
        let mut app = test_app();
        assert!(!app.can_submit());

        app.input = "   ".to_string();
        assert!(!app.can_submit());

        app.input = "  what is aspirin?  ".to_string();
        assert!(app.can_submit());
    }

    #[test]
    fn take_input_returns_the_raw_text_and_clears() {
        let mut app = test_app();
        app.input = "  Hello  ".to_string();
        app.input_cursor = 9;

        assert_eq!(app.take_input(), "  Hello  ");
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
    }

    #[test]
    fn append_pins_the_viewport_to_the_newest_entry() {
        let mut app = test_app();
        app.chat_height = 4;
        app.chat_width = 20;

        for i in 0..10 {
            app.push_message(ChatMessage::user(format!("message number {i}")));
        }

        assert!(app.chat_scroll > 0);

        let pinned = app.chat_scroll;
        app.push_message(ChatMessage::bot("one more"));
        assert!(app.chat_scroll > pinned);
    }
}
