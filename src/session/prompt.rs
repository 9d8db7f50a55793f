use crate::protocol::textual::textual_tool_instructions;
use crate::protocol::ComputerToolVersion;
use crate::provider::{CapabilitySet, ProviderKind};
use chrono::{Local, NaiveDate};

/// Builds the system prompt sent with every provider request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    platform: String,
    date: NaiveDate,
    suffix: Option<String>,
}

impl SystemPrompt {
    /// Prompt for the current host platform and today's date
    pub fn new(suffix: Option<String>) -> Self {
        Self {
            platform: platform_name(std::env::consts::OS).to_string(),
            date: Local::now().date_naive(),
            suffix: suffix.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Models without native function calling also get the textual call syntax
    pub fn render(
        &self,
        kind: ProviderKind,
        capabilities: CapabilitySet,
        version: ComputerToolVersion,
    ) -> String {
        let mut prompt = format!(
            "<SYSTEM_CAPABILITY>\n\
             * You are an AI assistant with access to a computer running on {} with internet access.\n\
             * Computer actions take a while to run and report back. Where possible, request several actions in one reply.\n\
             * The current date is {}.\n\
             </SYSTEM_CAPABILITY>",
            self.platform,
            self.date.format("%A, %B %d, %Y")
        );

        if self.platform == "Mac OS" {
            prompt.push_str(
                "\n<IMPORTANT>\n\
                 * Open applications using Spotlight: press Command+Space, type the application name, and press Enter.\n\
                 </IMPORTANT>",
            );
        }

        if kind == ProviderKind::GenericToolCalling && !capabilities.tool_calling {
            prompt.push('\n');
            prompt.push_str(&textual_tool_instructions(version));
        }

        if let Some(suffix) = &self.suffix {
            prompt.push(' ');
            prompt.push_str(suffix);
        }
        prompt
    }
}

fn platform_name(os: &str) -> &str {
    match os {
        "macos" => "Mac OS",
        "linux" => "Linux",
        "windows" => "Windows",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> SystemPrompt {
        SystemPrompt::new(Some("Be careful.".to_string()))
            .with_platform("Linux")
            .with_date(NaiveDate::from_ymd_opt(2025, 1, 24).unwrap())
    }

    #[test]
    fn test_render_includes_platform_date_and_suffix() {
        let text = prompt().render(
            ProviderKind::VendorComputerUse,
            CapabilitySet::all(),
            ComputerToolVersion::V20241022,
        );
        assert!(text.contains("running on Linux"));
        assert!(text.contains("Friday, January 24, 2025"));
        assert!(text.ends_with(" Be careful."));
        assert!(!text.contains("Spotlight"));
        assert!(!text.contains("<TOOL_SYNTAX>"));
    }

    #[test]
    fn test_mac_hint() {
        let text = prompt().with_platform("Mac OS").render(
            ProviderKind::VendorComputerUse,
            CapabilitySet::all(),
            ComputerToolVersion::V20241022,
        );
        assert!(text.contains("Spotlight"));
    }

    #[test]
    fn test_textual_syntax_without_tool_calling() {
        let capabilities = CapabilitySet {
            vision: true,
            tool_calling: false,
            streaming: true,
        };
        let text = prompt().render(
            ProviderKind::GenericToolCalling,
            capabilities,
            ComputerToolVersion::V20241022,
        );
        assert!(text.contains("<TOOL_SYNTAX>"));
    }

    #[test]
    fn test_blank_suffix_is_ignored() {
        let text = SystemPrompt::new(Some("  ".to_string())).render(
            ProviderKind::VendorComputerUse,
            CapabilitySet::all(),
            ComputerToolVersion::V20241022,
        );
        assert!(text.ends_with("</SYSTEM_CAPABILITY>") || text.ends_with("</IMPORTANT>"));
    }
}
