//! Runtime configuration, read from the environment (optionally seeded from a `.env` file).

use poise::serenity_prelude::GuildId;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::commands::music::utils::audio_sink::SinkConfig;

/// Opus accepts 8 kbps up to 510 kbps
const BITRATE_RANGE: std::ops::RangeInclusive<i32> = 8_000..=510_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub token: String,
    /// Path or name of the `yt-dlp` executable
    pub ytdlp_path: String,
    pub sink: SinkConfig,
    /// Register commands only in this guild, for fast iteration during development
    pub dev_guild: Option<GuildId>,
}

impl BotConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = value("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let ytdlp_path = value("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string());

        let defaults = SinkConfig::default();
        let bitrate = parse_or(value("OPUS_BITRATE"), "OPUS_BITRATE", defaults.bitrate)?;
        if !BITRATE_RANGE.contains(&bitrate) {
            return Err(ConfigError::Invalid {
                name: "OPUS_BITRATE",
                reason: format!(
                    "{} is outside {}..={}",
                    bitrate,
                    BITRATE_RANGE.start(),
                    BITRATE_RANGE.end()
                ),
            });
        }
        let reconnect_attempts = parse_or(
            value("VOICE_RECONNECT_ATTEMPTS"),
            "VOICE_RECONNECT_ATTEMPTS",
            defaults.reconnect_attempts,
        )?;
        let reconnect_delay_max = parse_or(
            value("VOICE_RECONNECT_DELAY_MAX_SECS"),
            "VOICE_RECONNECT_DELAY_MAX_SECS",
            defaults.reconnect_delay_max.as_secs(),
        )?;

        let dev_guild = value("DEV_GUILD_ID")
            .map(|raw| parse::<u64>(&raw, "DEV_GUILD_ID"))
            .transpose()?
            .map(|id| {
                if id == 0 {
                    Err(ConfigError::Invalid {
                        name: "DEV_GUILD_ID",
                        reason: "guild ids are never 0".to_string(),
                    })
                } else {
                    Ok(GuildId::new(id))
                }
            })
            .transpose()?;

        Ok(Self {
            token,
            ytdlp_path,
            sink: SinkConfig {
                bitrate,
                reconnect_attempts,
                reconnect_delay_max: Duration::from_secs(reconnect_delay_max),
            },
            dev_guild,
        })
    }

    /// One-line description safe to log (never includes the token).
    pub fn summary(&self) -> String {
        format!(
            "yt-dlp={}, bitrate={}bps, reconnect_attempts={}, reconnect_delay_max={}s, commands={}",
            self.ytdlp_path,
            self.sink.bitrate,
            self.sink.reconnect_attempts,
            self.sink.reconnect_delay_max.as_secs(),
            match self.dev_guild {
                Some(guild_id) => format!("guild {}", guild_id),
                None => "global".to_string(),
            }
        )
    }
}

fn parse<T>(raw: &str, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: format!("'{}': {}", raw, e),
    })
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map_or(Ok(default), |raw| parse(&raw, name))
}
