//! Configuration management for osbridge
//!
//! Settings come from environment variables with defaults. Loading is strict: a
//! variable that is set but cannot be parsed is an error, not a silent default.
//!
//! # Environment Variables
//!
//! ## Provider
//! - `OSBRIDGE_PROVIDER`: anthropic|vendor|custom|generic - default: auto-select
//! - `OSBRIDGE_MODEL`: model id for the generic backend
//! - `OSBRIDGE_API_BASE`: generic backend endpoint
//! - `OSBRIDGE_API_KEY`: generic backend credential
//! - `OSBRIDGE_VISION`, `OSBRIDGE_TOOL_CALLING`: declared model capabilities (true|false)
//! - `OSBRIDGE_ASSUME_CAPABLE`: treat unknown capabilities as supported - default: "false"
//! - `ANTHROPIC_API_KEY`: vendor credential, also the vendor selection signal
//! - `OPENAI_API_KEY`: generic credential when `OSBRIDGE_API_KEY` is unset
//!
//! ## Loop
//! - `OSBRIDGE_MAX_TOKENS`: default "4096"
//! - `OSBRIDGE_CONTEXT_WINDOW`: optional
//! - `OSBRIDGE_MAX_TURNS`: default "50"
//! - `OSBRIDGE_REQUEST_TIMEOUT`: seconds - default "120"
//! - `OSBRIDGE_EXECUTOR_TIMEOUT`: seconds - default "30"
//! - `OSBRIDGE_RECENT_IMAGES`: screenshots kept in requests, 0 keeps all - default "3"
//! - `OSBRIDGE_TOOL_VERSION`: 20241022|20250124 - default "20241022"
//! - `OSBRIDGE_DISPLAY_WIDTH`, `OSBRIDGE_DISPLAY_HEIGHT`: default "1280" x "800"
//! - `OSBRIDGE_LOG_LEVEL`: default "info"

use crate::protocol::{ComputerToolVersion, DisplayGeometry};
use crate::provider::{
    EnvSignals, GenericOverrides, ModelDescriptor, ProbePolicy, ProviderKind, SelectionRequest,
    TokenLimits,
};
use crate::session::LoopOptions;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_MAX_TURNS: usize = 50;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EXECUTOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECENT_IMAGES: usize = 3;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsBridgeConfig {
    /// Explicit provider choice; `None` lets the selector decide
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub vision: Option<bool>,
    pub tool_calling: Option<bool>,
    pub assume_capable: bool,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub max_tokens: u32,
    pub context_window: Option<u32>,
    pub max_turns: usize,
    pub request_timeout_secs: u64,
    pub executor_timeout_secs: u64,
    /// `None` sends every screenshot
    pub recent_images: Option<usize>,
    pub tool_version: ComputerToolVersion,
    pub display: DisplayGeometry,
    pub log_level: String,
}

impl Default for OsBridgeConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            api_base: None,
            api_key: None,
            vision: None,
            tool_calling: None,
            assume_capable: false,
            anthropic_api_key: None,
            openai_api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            context_window: None,
            max_turns: DEFAULT_MAX_TURNS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            executor_timeout_secs: DEFAULT_EXECUTOR_TIMEOUT_SECS,
            recent_images: Some(DEFAULT_RECENT_IMAGES),
            tool_version: ComputerToolVersion::default(),
            display: DisplayGeometry::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn parse_var<T>(value: Option<String>, field: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::ParseError {
                field: field.to_string(),
                error: e.to_string(),
            })
        })
        .transpose()
}

impl OsBridgeConfig {
    /// Loads from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let provider = get("OSBRIDGE_PROVIDER")
            .map(|p| p.parse::<ProviderKind>().map_err(ConfigError::InvalidProvider))
            .transpose()?;

        let recent_images = match parse_var::<usize>(get("OSBRIDGE_RECENT_IMAGES"), "OSBRIDGE_RECENT_IMAGES")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.recent_images,
        };

        let tool_version = parse_var(get("OSBRIDGE_TOOL_VERSION"), "OSBRIDGE_TOOL_VERSION")?
            .unwrap_or(defaults.tool_version);

        let display = DisplayGeometry {
            width_px: parse_var(get("OSBRIDGE_DISPLAY_WIDTH"), "OSBRIDGE_DISPLAY_WIDTH")?
                .unwrap_or(defaults.display.width_px),
            height_px: parse_var(get("OSBRIDGE_DISPLAY_HEIGHT"), "OSBRIDGE_DISPLAY_HEIGHT")?
                .unwrap_or(defaults.display.height_px),
            display_number: defaults.display.display_number,
        };

        Ok(Self {
            provider,
            model: get("OSBRIDGE_MODEL"),
            api_base: get("OSBRIDGE_API_BASE"),
            api_key: get("OSBRIDGE_API_KEY"),
            vision: parse_var(get("OSBRIDGE_VISION"), "OSBRIDGE_VISION")?,
            tool_calling: parse_var(get("OSBRIDGE_TOOL_CALLING"), "OSBRIDGE_TOOL_CALLING")?,
            assume_capable: parse_var(get("OSBRIDGE_ASSUME_CAPABLE"), "OSBRIDGE_ASSUME_CAPABLE")?
                .unwrap_or(defaults.assume_capable),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            max_tokens: parse_var(get("OSBRIDGE_MAX_TOKENS"), "OSBRIDGE_MAX_TOKENS")?
                .unwrap_or(defaults.max_tokens),
            context_window: parse_var(get("OSBRIDGE_CONTEXT_WINDOW"), "OSBRIDGE_CONTEXT_WINDOW")?,
            max_turns: parse_var(get("OSBRIDGE_MAX_TURNS"), "OSBRIDGE_MAX_TURNS")?
                .unwrap_or(defaults.max_turns),
            request_timeout_secs: parse_var(
                get("OSBRIDGE_REQUEST_TIMEOUT"),
                "OSBRIDGE_REQUEST_TIMEOUT",
            )?
            .unwrap_or(defaults.request_timeout_secs),
            executor_timeout_secs: parse_var(
                get("OSBRIDGE_EXECUTOR_TIMEOUT"),
                "OSBRIDGE_EXECUTOR_TIMEOUT",
            )?
            .unwrap_or(defaults.executor_timeout_secs),
            recent_images,
            tool_version,
            display,
            log_level: get("OSBRIDGE_LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens must be at least 1".to_string(),
            ));
        }
        if let Some(window) = self.context_window {
            if window <= self.max_tokens {
                return Err(ConfigError::ValidationFailed(format!(
                    "Context window ({}) must be larger than max tokens ({})",
                    window, self.max_tokens
                )));
            }
        }
        if self.max_turns == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max turns must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be between 1 second and 10 minutes".to_string(),
            ));
        }
        if self.executor_timeout_secs == 0 || self.executor_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Executor timeout must be between 1 second and 10 minutes".to_string(),
            ));
        }
        if self.display.width_px == 0 || self.display.height_px == 0 {
            return Err(ConfigError::ValidationFailed(
                "Display dimensions must be non-zero".to_string(),
            ));
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }
        Ok(())
    }

    pub fn model_descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            model_id: self.model.clone(),
            vision: self.vision,
            tool_calling: self.tool_calling,
            streaming: None,
            reported_features: None,
        }
    }

    pub fn probe_policy(&self) -> ProbePolicy {
        ProbePolicy::assuming(self.assume_capable)
    }

    /// Snapshot of everything the provider selector needs
    pub fn selection_request(&self) -> SelectionRequest {
        SelectionRequest {
            explicit: self.provider,
            model: self.model_descriptor(),
            env: EnvSignals {
                vendor_api_key: self.anthropic_api_key.clone(),
                generic_api_key: self.openai_api_key.clone(),
            },
            overrides: GenericOverrides {
                model_id: self.model.clone(),
                endpoint: self.api_base.clone(),
                credential: self.api_key.clone(),
            },
            limits: TokenLimits {
                max_tokens: self.max_tokens,
                context_window: self.context_window,
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            max_turns: self.max_turns,
            executor_timeout: Duration::from_secs(self.executor_timeout_secs),
            deadline: None,
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "***"
    } else {
        "(unset)"
    }
}

impl fmt::Display for OsBridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "osbridge Configuration:")?;
        match self.provider {
            Some(kind) => writeln!(f, "  Provider: {}", kind)?,
            None => writeln!(f, "  Provider: auto")?,
        }
        writeln!(f, "  Model: {}", self.model.as_deref().unwrap_or("(default)"))?;
        writeln!(
            f,
            "  API Base: {}",
            self.api_base.as_deref().unwrap_or("(default)")
        )?;
        writeln!(f, "  API Key: {}", redacted(&self.api_key))?;
        writeln!(f, "  Anthropic Key: {}", redacted(&self.anthropic_api_key))?;
        writeln!(f, "  OpenAI Key: {}", redacted(&self.openai_api_key))?;
        writeln!(f, "  Max Tokens: {}", self.max_tokens)?;
        if let Some(window) = self.context_window {
            writeln!(f, "  Context Window: {}", window)?;
        }
        writeln!(f, "  Max Turns: {}", self.max_turns)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Executor Timeout: {}s", self.executor_timeout_secs)?;
        match self.recent_images {
            Some(n) => writeln!(f, "  Recent Images: {}", n)?,
            None => writeln!(f, "  Recent Images: all")?,
        }
        writeln!(f, "  Tool Version: {}", self.tool_version.tool_type())?;
        writeln!(
            f,
            "  Display: {}x{}",
            self.display.width_px, self.display.height_px
        )?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
