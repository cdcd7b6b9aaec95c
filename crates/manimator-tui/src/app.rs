use manimator_core::{ChannelEvent, Config, Controller, Effect, Outcome, Session};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "live",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub controller: Controller,
    pub connection: ConnectionStatus,

    // Input line
    pub input: String,
    pub cursor: usize,

    // Conversation pane
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    /// Keep the newest entry in view until the user scrolls up
    pub follow_tail: bool,

    // Display info
    pub reasoning_model: String,
    pub credential_source: Option<&'static str>,
    pub animation_frame: u8,

    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        Self::with_controller(Controller::from_config(config), config, events)
    }

    pub fn with_controller(controller: Controller, config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            controller,
            connection: ConnectionStatus::Connecting,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_tail: true,

            reasoning_model: config.reasoning_model.clone(),
            credential_source: config.credential_source(),
            animation_frame: 0,

            events,
        }
    }

    pub fn session(&self) -> &Session {
        self.controller.session()
    }

    /// A submission or reasoning request is outstanding
    pub fn is_busy(&self) -> bool {
        let session = self.session();
        session.is_submitting() || session.is_awaiting_answer()
    }

    /// Send the input line to the state machine and run whatever it asks for
    pub fn submit_input(&mut self) {
        let text = std::mem::take(&mut self.input);
        self.cursor = 0;

        if let Some(effect) = self.controller.begin_input(&text) {
            self.spawn_effect(effect);
        }
        self.follow_tail = true;
        self.scroll_chat_to_bottom();
    }

    fn spawn_effect(&self, effect: Effect) {
        debug!(?effect, "dispatching request");
        let performer = self.controller.performer();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = performer.perform(effect).await;
            if events.send(AppEvent::Outcome(outcome)).is_err() {
                warn!("UI closed before request finished");
            }
        });
    }

    pub fn apply_outcome(&mut self, outcome: Outcome) {
        self.controller.apply(outcome);
        self.scroll_chat_to_bottom();
    }

    pub fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.connection = ConnectionStatus::Connected,
            ChannelEvent::Disconnected { reason } => {
                debug!(%reason, "realtime channel dropped");
                self.connection = ConnectionStatus::Reconnecting;
            }
            ChannelEvent::Event(event) => {
                self.controller.handle_realtime_event(event);
                self.scroll_chat_to_bottom();
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow_tail = self.chat_scroll >= max;
    }

    /// Scroll chat to bottom so the newest entry is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        if !self.follow_tail {
            return;
        }
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for entry in self.session().conversation() {
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in entry.text.lines() {
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add(((char_count / wrap_width) + 1) as u16);
            }
            if entry.video_reference.is_some() {
                total_lines = total_lines.saturating_add(1);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after entry
        }

        if self.session().is_awaiting_answer() {
            total_lines = total_lines.saturating_add(2);
        }
        total_lines
    }
}
