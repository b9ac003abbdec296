// src/config.rs

use std::env;
use std::str::FromStr;

use chrono::FixedOffset;
use dotenvy::dotenv;
use thiserror::Error;

use crate::engine::QuizSettings;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub quiz: QuizSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unparseable numbers fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let defaults = QuizSettings::default();
        let quiz = QuizSettings {
            question_count: parse_or(&lookup, "QUIZ_QUESTION_COUNT", defaults.question_count)
                .max(1),
            pass_percentage: parse_or(&lookup, "QUIZ_PASS_PERCENTAGE", defaults.pass_percentage)
                .clamp(0.0, 100.0),
            time_limit_minutes: parse_or(
                &lookup,
                "QUIZ_TIME_LIMIT_MINUTES",
                defaults.time_limit_minutes,
            ),
            allow_restart: parse_or(&lookup, "QUIZ_ALLOW_RESTART", defaults.allow_restart),
            utc_offset: offset_or(&lookup, "QUIZ_UTC_OFFSET_MINUTES", defaults.utc_offset),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            quiz,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
            default
        }),
        None => default,
    }
}

/// An offset east of UTC given in minutes. Out of range values fall back to `default`.
fn offset_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: FixedOffset,
) -> FixedOffset {
    let minutes: i32 = parse_or(lookup, key, default.local_minus_utc() / 60);
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            tracing::warn!("Ignoring out of range offset {} for {}", minutes, key);
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "s")]))
                .unwrap();
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.port, 3000);
        assert_eq!(config.quiz, QuizSettings::default());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("QUIZ_QUESTION_COUNT", "10"),
            ("QUIZ_PASS_PERCENTAGE", "eighty"),
            ("QUIZ_ALLOW_RESTART", "true"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.quiz.question_count, 10);
        assert_eq!(config.quiz.pass_percentage, 70.0);
        assert!(config.quiz.allow_restart);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_utc_offset() {
        let offset_for = |minutes: &str| {
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://x"),
                ("JWT_SECRET", "s"),
                ("QUIZ_UTC_OFFSET_MINUTES", minutes),
            ]))
            .unwrap()
            .quiz
            .utc_offset
            .local_minus_utc()
        };

        assert_eq!(offset_for("120"), 7200);
        assert_eq!(offset_for("-330"), -330 * 60);
        // a full day is not an offset
        assert_eq!(offset_for("1440"), 0);
        assert_eq!(offset_for("CET"), 0);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }
}
