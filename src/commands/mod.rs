//! This module aggregates all the command modules for the bot.

/// Commands related to music playback (play, skip, pause, resume, stop, queue).
pub mod music;
