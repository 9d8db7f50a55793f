use super::capability::{
    Capability, CapabilityProbe, CapabilitySet, ModelDescriptor, ProbeWarning,
};
use super::error::CapabilityError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_VENDOR_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_VENDOR_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_VENDOR_CONTEXT_WINDOW: u32 = 200_000;
pub const DEFAULT_GENERIC_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_GENERIC_MODEL: &str = "gpt-4o";

/// Capabilities a generic backend needs to drive the computer tool
pub const REQUIRED_GENERIC_CAPABILITIES: [Capability; 2] =
    [Capability::Vision, Capability::ToolCalling];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    VendorComputerUse,
    GenericToolCalling,
}

impl ProviderKind {
    pub fn other(&self) -> ProviderKind {
        match self {
            ProviderKind::VendorComputerUse => ProviderKind::GenericToolCalling,
            ProviderKind::GenericToolCalling => ProviderKind::VendorComputerUse,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::VendorComputerUse => write!(f, "vendor"),
            ProviderKind::GenericToolCalling => write!(f, "generic"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "vendor" | "claude" => Ok(ProviderKind::VendorComputerUse),
            "custom" | "generic" | "openai" => Ok(ProviderKind::GenericToolCalling),
            hosted @ ("bedrock" | "vertex") => Err(format!(
                "provider '{}' is not supported; use anthropic for the direct API or custom for a compatible gateway",
                hosted
            )),
            other => Err(format!(
                "unknown provider '{}' (expected anthropic, vendor, custom or generic)",
                other
            )),
        }
    }
}

/// API key that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub credential: Option<Credential>,
    pub model_id: String,
    pub max_tokens: u32,
    pub context_window: Option<u32>,
}

/// Environment facts relevant to selection, captured once by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSignals {
    pub vendor_api_key: Option<String>,
    pub generic_api_key: Option<String>,
}

/// Settings that point at a user-configured generic backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericOverrides {
    pub model_id: Option<String>,
    pub endpoint: Option<String>,
    pub credential: Option<String>,
}

impl GenericOverrides {
    pub fn is_set(&self) -> bool {
        self.model_id.is_some() || self.endpoint.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub max_tokens: u32,
    pub context_window: Option<u32>,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            context_window: None,
        }
    }
}

/// Everything selection depends on; no process state is read past this point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRequest {
    pub explicit: Option<ProviderKind>,
    pub model: ModelDescriptor,
    pub env: EnvSignals,
    pub overrides: GenericOverrides,
    pub limits: TokenLimits,
}

impl SelectionRequest {
    /// The model descriptor a generic backend would be probed with
    fn generic_descriptor(&self) -> ModelDescriptor {
        let mut descriptor = self.model.clone();
        if let Some(model_id) = &self.overrides.model_id {
            descriptor.model_id = Some(model_id.clone());
        }
        if descriptor.model_id.is_none() {
            descriptor.model_id = Some(DEFAULT_GENERIC_MODEL.to_string());
        }
        descriptor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    Explicit,
    VendorCredential,
    ProbedCapabilities,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub config: ProviderConfig,
    pub capabilities: CapabilitySet,
    pub reason: SelectionReason,
    pub warnings: Vec<ProbeWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderSelector {
    probe: CapabilityProbe,
}

impl ProviderSelector {
    pub fn new(probe: CapabilityProbe) -> Self {
        Self { probe }
    }

    pub fn select(&self, request: &SelectionRequest) -> Result<Selection, CapabilityError> {
        if let Some(kind) = request.explicit {
            info!("Using explicitly configured {} provider", kind);
            return Ok(match kind {
                ProviderKind::VendorComputerUse => self.vendor(request, SelectionReason::Explicit),
                ProviderKind::GenericToolCalling => {
                    self.generic(request, SelectionReason::Explicit)
                }
            });
        }

        if request.env.vendor_api_key.is_some() && !request.overrides.is_set() {
            info!("Vendor credential present, using vendor computer-use provider");
            return Ok(self.vendor(request, SelectionReason::VendorCredential));
        }

        let selection = self.generic(request, SelectionReason::ProbedCapabilities);
        Self::require_generic_capabilities(&selection)?;
        info!(
            model = %selection.config.model_id,
            "Model supports vision and tool calling, using generic provider"
        );
        Ok(selection)
    }

    /// Picks the provider kind other than `failed`, skipping the explicit choice
    pub fn select_excluding(
        &self,
        request: &SelectionRequest,
        failed: ProviderKind,
    ) -> Result<Selection, CapabilityError> {
        debug!(excluded = %failed, "Selecting alternate provider");
        match failed.other() {
            ProviderKind::VendorComputerUse => {
                if request.env.vendor_api_key.is_none() {
                    return Err(CapabilityError::NotConfigured {
                        kind: ProviderKind::VendorComputerUse,
                        reason: "no vendor credential available".to_string(),
                    });
                }
                Ok(self.vendor(request, SelectionReason::Fallback))
            }
            ProviderKind::GenericToolCalling => {
                let selection = self.generic(request, SelectionReason::Fallback);
                Self::require_generic_capabilities(&selection)?;
                Ok(selection)
            }
        }
    }

    fn require_generic_capabilities(selection: &Selection) -> Result<(), CapabilityError> {
        let missing = selection
            .capabilities
            .missing(&REQUIRED_GENERIC_CAPABILITIES);
        if missing.is_empty() {
            return Ok(());
        }
        Err(CapabilityError::MissingCapabilities {
            model: selection.config.model_id.clone(),
            missing,
        })
    }

    fn vendor(&self, request: &SelectionRequest, reason: SelectionReason) -> Selection {
        let model_id = request
            .model
            .model_id
            .as_deref()
            .filter(|id| id.contains("claude"))
            .unwrap_or(DEFAULT_VENDOR_MODEL)
            .to_string();

        Selection {
            config: ProviderConfig {
                kind: ProviderKind::VendorComputerUse,
                endpoint: DEFAULT_VENDOR_ENDPOINT.to_string(),
                credential: request.env.vendor_api_key.clone().map(Credential::new),
                model_id,
                max_tokens: request.limits.max_tokens,
                context_window: request
                    .limits
                    .context_window
                    .or(Some(DEFAULT_VENDOR_CONTEXT_WINDOW)),
            },
            capabilities: CapabilitySet::all(),
            reason,
            warnings: Vec::new(),
        }
    }

    fn generic(&self, request: &SelectionRequest, reason: SelectionReason) -> Selection {
        let descriptor = request.generic_descriptor();
        let report = self.probe.probe(&descriptor);

        let credential = request
            .overrides
            .credential
            .clone()
            .or_else(|| request.env.generic_api_key.clone())
            .map(Credential::new);

        Selection {
            config: ProviderConfig {
                kind: ProviderKind::GenericToolCalling,
                endpoint: request
                    .overrides
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GENERIC_ENDPOINT.to_string()),
                credential,
                model_id: descriptor
                    .model_id
                    .unwrap_or_else(|| DEFAULT_GENERIC_MODEL.to_string()),
                max_tokens: request.limits.max_tokens,
                context_window: request.limits.context_window,
            },
            capabilities: report.capabilities,
            reason,
            warnings: report.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn vendor_env() -> EnvSignals {
        EnvSignals {
            vendor_api_key: Some("sk-ant-test".to_string()),
            generic_api_key: None,
        }
    }

    #[parameterized(
        anthropic = { "anthropic", ProviderKind::VendorComputerUse },
        claude = { "Claude", ProviderKind::VendorComputerUse },
        custom = { "custom", ProviderKind::GenericToolCalling },
        generic = { " generic ", ProviderKind::GenericToolCalling },
    )]
    fn test_parse_provider_kind(input: &str, expected: ProviderKind) {
        assert_eq!(input.parse::<ProviderKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_provider() {
        assert!("azure".parse::<ProviderKind>().is_err());
    }

    #[parameterized(
        bedrock = { "Bedrock" },
        vertex = { "vertex" },
    )]
    fn test_hosted_vendor_routes_are_rejected(input: &str) {
        let err = input.parse::<ProviderKind>().unwrap_err();
        assert!(err.contains("not supported"));
        assert!(err.contains(&input.to_lowercase()));
    }

    #[test]
    fn test_explicit_choice_wins() {
        let request = SelectionRequest {
            explicit: Some(ProviderKind::GenericToolCalling),
            model: ModelDescriptor::named("gpt-4o"),
            env: vendor_env(),
            ..Default::default()
        };
        let selection = ProviderSelector::default().select(&request).unwrap();
        assert_eq!(selection.config.kind, ProviderKind::GenericToolCalling);
        assert_eq!(selection.reason, SelectionReason::Explicit);
    }

    #[test]
    fn test_vendor_credential_without_overrides() {
        let request = SelectionRequest {
            env: vendor_env(),
            ..Default::default()
        };
        let selection = ProviderSelector::default().select(&request).unwrap();
        assert_eq!(selection.config.kind, ProviderKind::VendorComputerUse);
        assert_eq!(selection.config.model_id, DEFAULT_VENDOR_MODEL);
        assert_eq!(selection.config.context_window, Some(DEFAULT_VENDOR_CONTEXT_WINDOW));
        assert_eq!(
            selection.config.credential.as_ref().map(Credential::expose),
            Some("sk-ant-test")
        );
    }

    #[test]
    fn test_overrides_skip_vendor_signal() {
        let request = SelectionRequest {
            env: vendor_env(),
            overrides: GenericOverrides {
                model_id: Some("gpt-4o".to_string()),
                endpoint: Some("http://localhost:8080/v1".to_string()),
                credential: None,
            },
            ..Default::default()
        };
        let selection = ProviderSelector::default().select(&request).unwrap();
        assert_eq!(selection.config.kind, ProviderKind::GenericToolCalling);
        assert_eq!(selection.config.endpoint, "http://localhost:8080/v1");
        assert_eq!(selection.reason, SelectionReason::ProbedCapabilities);
    }

    #[test]
    fn test_missing_vision_is_named() {
        let request = SelectionRequest {
            model: ModelDescriptor::named("gpt-3.5-turbo"),
            ..Default::default()
        };
        let err = ProviderSelector::default().select(&request).unwrap_err();
        assert_eq!(err.missing(), &[Capability::Vision]);
        assert!(err.to_string().contains("vision"));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let request = SelectionRequest {
            model: ModelDescriptor::named("gpt-4o"),
            env: EnvSignals {
                vendor_api_key: None,
                generic_api_key: Some("sk-test".to_string()),
            },
            ..Default::default()
        };
        let selector = ProviderSelector::default();
        assert_eq!(selector.select(&request), selector.select(&request));
    }

    #[test]
    fn test_select_excluding_vendor_needs_capable_generic() {
        let mut request = SelectionRequest {
            explicit: Some(ProviderKind::VendorComputerUse),
            model: ModelDescriptor::named("llava"),
            env: vendor_env(),
            ..Default::default()
        };
        let selector = ProviderSelector::default();
        let err = selector
            .select_excluding(&request, ProviderKind::VendorComputerUse)
            .unwrap_err();
        assert_eq!(err.missing(), &[Capability::ToolCalling]);

        request.model = ModelDescriptor::named("gpt-4o");
        let selection = selector
            .select_excluding(&request, ProviderKind::VendorComputerUse)
            .unwrap();
        assert_eq!(selection.config.kind, ProviderKind::GenericToolCalling);
        assert_eq!(selection.reason, SelectionReason::Fallback);
    }

    #[test]
    fn test_select_excluding_generic_needs_vendor_credential() {
        let request = SelectionRequest {
            model: ModelDescriptor::named("gpt-4o"),
            ..Default::default()
        };
        let err = ProviderSelector::default()
            .select_excluding(&request, ProviderKind::GenericToolCalling)
            .unwrap_err();
        assert!(matches!(err, CapabilityError::NotConfigured { .. }));
    }

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("sk-secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.to_string(), "***");
        assert_eq!(serde_json::to_string(&credential).unwrap(), "\"***\"");
    }
}
