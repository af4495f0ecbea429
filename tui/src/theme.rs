//! Theme and Colors
//!
//! The muse palette: a warm violet accent over a muted base, with the usual
//! status colors for loading and errors.

use ratatui::style::Color;

// ============================================================================
// Brand Colors
// ============================================================================

/// Primary accent - warm violet
pub const MUSE_VIOLET: Color = Color::Rgb(186, 145, 255);

/// Secondary accent - soft gold, used for the active category
pub const MUSE_GOLD: Color = Color::Rgb(240, 200, 120);

// ============================================================================
// UI Colors
// ============================================================================

/// Default foreground
pub const TEXT: Color = Color::Rgb(220, 220, 220);

/// De-emphasized text (hints, placeholders, status line)
pub const TEXT_DIM: Color = Color::Rgb(130, 130, 140);

/// Error messages
pub const ERROR: Color = Color::Rgb(255, 100, 100);

/// In-flight work indicator
pub const LOADING: Color = Color::Rgb(150, 180, 255);

/// Confirmation (feedback sent, signed in)
pub const OK: Color = Color::Rgb(140, 210, 140);

/// Borders of the focused panel
pub const BORDER_FOCUSED: Color = MUSE_VIOLET;

/// Borders of unfocused panels
pub const BORDER: Color = Color::Rgb(90, 90, 100);
