//! Selection decisions driven end to end from configuration

use osbridge::config::OsBridgeConfig;
use osbridge::provider::{
    Capability, CapabilityError, CapabilityProbe, ProviderKind, ProviderSelector, SelectionReason,
};
use std::collections::HashMap;
use yare::parameterized;

fn config(vars: &[(&str, &str)]) -> OsBridgeConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    OsBridgeConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn selector_for(config: &OsBridgeConfig) -> ProviderSelector {
    ProviderSelector::new(CapabilityProbe::new(config.probe_policy()))
}

#[parameterized(
    vendor_key_only = { &[("ANTHROPIC_API_KEY", "sk-ant")], ProviderKind::VendorComputerUse, SelectionReason::VendorCredential },
    vendor_key_with_generic_model = { &[("ANTHROPIC_API_KEY", "sk-ant"), ("OSBRIDGE_MODEL", "gpt-4o")], ProviderKind::GenericToolCalling, SelectionReason::ProbedCapabilities },
    explicit_vendor = { &[("OSBRIDGE_PROVIDER", "anthropic")], ProviderKind::VendorComputerUse, SelectionReason::Explicit },
    explicit_custom = { &[("OSBRIDGE_PROVIDER", "custom"), ("OSBRIDGE_MODEL", "gpt-4o")], ProviderKind::GenericToolCalling, SelectionReason::Explicit },
    probed_default = { &[("OPENAI_API_KEY", "sk-oai")], ProviderKind::GenericToolCalling, SelectionReason::ProbedCapabilities },
)]
fn test_selection_from_environment(
    vars: &[(&str, &str)],
    kind: ProviderKind,
    reason: SelectionReason,
) {
    let config = config(vars);
    let selection = selector_for(&config)
        .select(&config.selection_request())
        .unwrap();
    assert_eq!(selection.config.kind, kind);
    assert_eq!(selection.reason, reason);
}

#[test]
fn test_declared_capabilities_override_known_model() {
    let config = config(&[("OSBRIDGE_MODEL", "gpt-4o"), ("OSBRIDGE_VISION", "false")]);
    let err = selector_for(&config)
        .select(&config.selection_request())
        .unwrap_err();
    assert_eq!(err.missing(), &[Capability::Vision]);
    assert!(err.to_string().contains("gpt-4o"));
}

#[test]
fn test_unknown_model_requires_assumption() {
    let strict = config(&[("OSBRIDGE_MODEL", "acme-vl-7b")]);
    let err = selector_for(&strict)
        .select(&strict.selection_request())
        .unwrap_err();
    assert!(matches!(err, CapabilityError::MissingCapabilities { .. }));
    assert_eq!(err.missing(), &[Capability::Vision, Capability::ToolCalling]);

    let lenient = config(&[("OSBRIDGE_MODEL", "acme-vl-7b"), ("OSBRIDGE_ASSUME_CAPABLE", "true")]);
    let selection = selector_for(&lenient)
        .select(&lenient.selection_request())
        .unwrap();
    assert_eq!(selection.config.model_id, "acme-vl-7b");
    assert_eq!(selection.warnings.len(), 3);
}

#[test]
fn test_generic_endpoint_and_limits_flow_into_config() {
    let config = config(&[
        ("OSBRIDGE_API_BASE", "http://localhost:8080/v1"),
        ("OSBRIDGE_MODEL", "qwen2.5-vl-72b"),
        ("OSBRIDGE_API_KEY", "local-key"),
        ("OSBRIDGE_MAX_TOKENS", "2048"),
        ("OSBRIDGE_CONTEXT_WINDOW", "32768"),
    ]);
    let selection = selector_for(&config)
        .select(&config.selection_request())
        .unwrap();
    assert_eq!(selection.config.endpoint, "http://localhost:8080/v1");
    assert_eq!(selection.config.max_tokens, 2048);
    assert_eq!(selection.config.context_window, Some(32768));
    assert_eq!(
        selection.config.credential.as_ref().map(|c| c.expose()),
        Some("local-key")
    );
}

#[test]
fn test_alternate_provider_after_failure() {
    let config = config(&[("ANTHROPIC_API_KEY", "sk-ant"), ("OPENAI_API_KEY", "sk-oai")]);
    let selector = selector_for(&config);
    let request = config.selection_request();

    let first = selector.select(&request).unwrap();
    assert_eq!(first.config.kind, ProviderKind::VendorComputerUse);

    let alternate = selector
        .select_excluding(&request, first.config.kind)
        .unwrap();
    assert_eq!(alternate.config.kind, ProviderKind::GenericToolCalling);
    assert_eq!(alternate.reason, SelectionReason::Fallback);

    let back = selector
        .select_excluding(&crate::config(&[]).selection_request(), ProviderKind::GenericToolCalling)
        .unwrap_err();
    assert!(matches!(back, CapabilityError::NotConfigured { .. }));
}
