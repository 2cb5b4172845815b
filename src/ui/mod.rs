//! UI rendering module for the home dashboard
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod cards;
pub mod dashboard;
pub mod help_overlay;
pub mod widgets;

pub use dashboard::render;

/// Color scheme shared by every card
pub mod colors {
    use ratatui::style::Color;

    /// Header and title color
    pub const HEADER: Color = Color::Cyan;
    pub const BORDER: Color = Color::DarkGray;
    /// Primary text
    pub const PRIMARY: Color = Color::White;
    /// Secondary text, labels and hints
    pub const SECONDARY: Color = Color::Gray;
    /// Values we have no reading for
    pub const UNKNOWN: Color = Color::DarkGray;
    pub const SAFE: Color = Color::Green;
    pub const ADVISORY: Color = Color::Yellow;
    pub const CLOSED: Color = Color::Red;
}
