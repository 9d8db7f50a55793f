//! Capability detection for a configured model
//!
//! A capability that cannot be established is reported as unsupported unless the
//! [`ProbePolicy`] says otherwise, and a warning is returned to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Vision,
    ToolCalling,
    Streaming,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Vision,
        Capability::ToolCalling,
        Capability::Streaming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Vision => "vision",
            Capability::ToolCalling => "toolCalling",
            Capability::Streaming => "streaming",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Features a backend supports; recomputed per session and per provider switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub vision: bool,
    pub tool_calling: bool,
    pub streaming: bool,
}

impl CapabilitySet {
    pub const fn all() -> Self {
        Self {
            vision: true,
            tool_calling: true,
            streaming: true,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Vision => self.vision,
            Capability::ToolCalling => self.tool_calling,
            Capability::Streaming => self.streaming,
        }
    }

    fn set(&mut self, capability: Capability, value: bool) {
        match capability {
            Capability::Vision => self.vision = value,
            Capability::ToolCalling => self.tool_calling = value,
            Capability::Streaming => self.streaming = value,
        }
    }

    /// Capabilities from `required` that this set lacks
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required
            .iter()
            .copied()
            .filter(|c| !self.supports(*c))
            .collect()
    }
}

/// Whatever metadata the hosting configuration exposes about the selected model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_id: Option<String>,
    /// Explicit flags from configuration; they win over everything else
    pub vision: Option<bool>,
    pub tool_calling: Option<bool>,
    pub streaming: Option<bool>,
    /// Feature list reported by the backend itself, if it offers one
    pub reported_features: Option<Vec<String>>,
}

impl ModelDescriptor {
    pub fn named(model_id: impl Into<String>) -> Self {
        Self {
            model_id: Some(model_id.into()),
            ..Default::default()
        }
    }

    pub fn with_vision(mut self, vision: bool) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_tool_calling(mut self, tool_calling: bool) -> Self {
        self.tool_calling = Some(tool_calling);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    pub fn with_reported_features(mut self, features: Vec<String>) -> Self {
        self.reported_features = Some(features);
        self
    }

    fn declared(&self, capability: Capability) -> Option<bool> {
        match capability {
            Capability::Vision => self.vision,
            Capability::ToolCalling => self.tool_calling,
            Capability::Streaming => self.streaming,
        }
    }

    fn reported(&self, capability: Capability) -> Option<bool> {
        let features = self.reported_features.as_ref().filter(|f| !f.is_empty())?;
        let aliases: &[&str] = match capability {
            Capability::Vision => &["vision", "image_input", "images"],
            Capability::ToolCalling => &["tool_calling", "tools", "function_calling", "functions"],
            Capability::Streaming => &["streaming", "stream"],
        };
        Some(
            features
                .iter()
                .any(|f| aliases.contains(&f.trim().to_lowercase().as_str())),
        )
    }
}

/// Entry of the known-model table, matched by model id prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownModel {
    pub prefix: String,
    pub capabilities: CapabilitySet,
}

impl KnownModel {
    fn new(prefix: &str, vision: bool, tool_calling: bool, streaming: bool) -> Self {
        Self {
            prefix: prefix.to_string(),
            capabilities: CapabilitySet {
                vision,
                tool_calling,
                streaming,
            },
        }
    }
}

fn builtin_known_models() -> Vec<KnownModel> {
    vec![
        KnownModel::new("claude-3-5-haiku", false, true, true),
        KnownModel::new("claude-3", true, true, true),
        KnownModel::new("claude-sonnet-4", true, true, true),
        KnownModel::new("claude-opus-4", true, true, true),
        KnownModel::new("anthropic.claude-3", true, true, true),
        KnownModel::new("gpt-4o", true, true, true),
        KnownModel::new("gpt-4.1", true, true, true),
        KnownModel::new("gpt-4-turbo", true, true, true),
        KnownModel::new("gpt-3.5-turbo", false, true, true),
        KnownModel::new("gemini-1.5", true, true, true),
        KnownModel::new("gemini-2", true, true, true),
        KnownModel::new("qwen2.5-vl", true, true, true),
        KnownModel::new("llava", true, false, true),
        KnownModel::new("bakllava", true, false, true),
        KnownModel::new("llama3", false, true, true),
        KnownModel::new("mistral", false, true, true),
    ]
}

/// Explicit policy for capabilities nothing can vouch for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Value used for a capability no source knows about
    pub assume_when_unknown: bool,
    pub known_models: Vec<KnownModel>,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            assume_when_unknown: false,
            known_models: builtin_known_models(),
        }
    }
}

impl ProbePolicy {
    pub fn assuming(assume_when_unknown: bool) -> Self {
        Self {
            assume_when_unknown,
            ..Default::default()
        }
    }

    /// Longest matching prefix wins; provider prefixes like `openai/` are ignored
    fn lookup(&self, model_id: &str) -> Option<&KnownModel> {
        let bare = model_id
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(model_id)
            .to_lowercase();
        self.known_models
            .iter()
            .filter(|m| bare.starts_with(&m.prefix))
            .max_by_key(|m| m.prefix.len())
    }
}

/// Where a capability value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySource {
    Declared,
    Reported,
    KnownModel,
    Assumed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeWarning {
    pub capability: Capability,
    pub detail: String,
}

impl fmt::Display for ProbeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.capability, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub capabilities: CapabilitySet,
    pub sources: Vec<(Capability, CapabilitySource)>,
    pub warnings: Vec<ProbeWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityProbe {
    policy: ProbePolicy,
}

impl CapabilityProbe {
    pub fn new(policy: ProbePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }

    pub fn probe(&self, descriptor: &ModelDescriptor) -> ProbeReport {
        let known = descriptor
            .model_id
            .as_deref()
            .and_then(|id| self.policy.lookup(id));

        let mut capabilities = CapabilitySet::default();
        let mut sources = Vec::with_capacity(Capability::ALL.len());
        let mut warnings = Vec::new();

        for capability in Capability::ALL {
            let (value, source) = if let Some(v) = descriptor.declared(capability) {
                (v, CapabilitySource::Declared)
            } else if let Some(v) = descriptor.reported(capability) {
                (v, CapabilitySource::Reported)
            } else if let Some(model) = known {
                (model.capabilities.supports(capability), CapabilitySource::KnownModel)
            } else {
                let detail = format!(
                    "unknown for model '{}', assuming {}",
                    descriptor.model_id.as_deref().unwrap_or("<unspecified>"),
                    if self.policy.assume_when_unknown {
                        "supported"
                    } else {
                        "unsupported"
                    }
                );
                warn!(capability = %capability, "{}", detail);
                warnings.push(ProbeWarning { capability, detail });
                (self.policy.assume_when_unknown, CapabilitySource::Assumed)
            };
            capabilities.set(capability, value);
            sources.push((capability, source));
        }

        debug!(
            model = descriptor.model_id.as_deref().unwrap_or("<unspecified>"),
            vision = capabilities.vision,
            tool_calling = capabilities.tool_calling,
            streaming = capabilities.streaming,
            "Probed model capabilities"
        );

        ProbeReport {
            capabilities,
            sources,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        claude_sonnet = { "claude-3-5-sonnet-20241022", true, true },
        claude_haiku = { "claude-3-5-haiku-20241022", false, true },
        gpt4o = { "gpt-4o-mini", true, true },
        prefixed = { "openai/gpt-4.1", true, true },
        gpt35 = { "gpt-3.5-turbo", false, true },
        llava = { "llava:13b", true, false },
        llama = { "llama3.1:8b", false, true },
    )]
    fn test_known_models(model: &str, vision: bool, tool_calling: bool) {
        let report = CapabilityProbe::default().probe(&ModelDescriptor::named(model));
        assert_eq!(report.capabilities.vision, vision);
        assert_eq!(report.capabilities.tool_calling, tool_calling);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_unknown_model_fails_closed_with_warnings() {
        let report = CapabilityProbe::default().probe(&ModelDescriptor::named("my-local-model"));
        assert_eq!(report.capabilities, CapabilitySet::default());
        assert_eq!(report.warnings.len(), 3);
        assert!(report
            .sources
            .iter()
            .all(|(_, s)| *s == CapabilitySource::Assumed));
    }

    #[test]
    fn test_policy_can_assume_supported() {
        let probe = CapabilityProbe::new(ProbePolicy::assuming(true));
        let report = probe.probe(&ModelDescriptor::default());
        assert_eq!(report.capabilities, CapabilitySet::all());
        assert_eq!(report.warnings.len(), 3);
    }

    #[test]
    fn test_declared_flags_override_table() {
        let descriptor = ModelDescriptor::named("llava:13b").with_tool_calling(true);
        let report = CapabilityProbe::default().probe(&descriptor);
        assert!(report.capabilities.tool_calling);
        assert!(report
            .sources
            .contains(&(Capability::ToolCalling, CapabilitySource::Declared)));
    }

    #[test]
    fn test_reported_features_are_authoritative() {
        let descriptor = ModelDescriptor::named("custom")
            .with_reported_features(vec!["Vision".to_string(), "function_calling".to_string()]);
        let report = CapabilityProbe::default().probe(&descriptor);
        assert!(report.capabilities.vision);
        assert!(report.capabilities.tool_calling);
        assert!(!report.capabilities.streaming);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_lists_required_capabilities() {
        let caps = CapabilitySet {
            vision: false,
            tool_calling: true,
            streaming: false,
        };
        assert_eq!(
            caps.missing(&[Capability::Vision, Capability::ToolCalling]),
            vec![Capability::Vision]
        );
    }
}
