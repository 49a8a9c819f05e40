use crossterm::event::Event;
use ratatui::style::{Color, Style};

/// Events the application loop handles after the view's own updates.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Input(Event),
    Status(Message),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Info(String),
    Success(String),
    Error(String),
}

impl Message {
    pub fn style(&self) -> Style {
        Style::default().fg(match self {
            Self::Info(_) => Color::Blue,
            Self::Success(_) => Color::Green,
            Self::Error(_) => Color::Red,
        })
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Info(s) | Self::Success(s) | Self::Error(s) => s,
        }
    }
}
