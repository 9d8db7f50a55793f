//! The computer tool in both function-calling schemas
//!
//! There is exactly one tool. Its action set is owned by [`ComputerToolVersion`];
//! the vendor declaration and the generic JSON schema are both derived from that
//! list, so the two directions cannot drift apart.

use super::error::{ToolSchemaError, TranslationError};
use super::generic::{FunctionDefinition, GenericTool, GenericToolCall};
use super::message::ContentBlock;
use super::translate::{generic_tool_call, parse_generic_arguments, vendor_tool_use};
use super::vendor::{VendorBlock, VendorToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the single device-control tool
pub const COMPUTER_TOOL_NAME: &str = "computer";

const COMPUTER_TOOL_DESCRIPTION: &str = "Control the computer screen, mouse, and keyboard";

/// A device-control action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputerAction {
    Key,
    Type,
    MouseMove,
    LeftClick,
    LeftClickDrag,
    RightClick,
    MiddleClick,
    DoubleClick,
    TripleClick,
    Screenshot,
    CursorPosition,
    LeftMouseDown,
    LeftMouseUp,
    Scroll,
    HoldKey,
    Wait,
}

impl ComputerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputerAction::Key => "key",
            ComputerAction::Type => "type",
            ComputerAction::MouseMove => "mouse_move",
            ComputerAction::LeftClick => "left_click",
            ComputerAction::LeftClickDrag => "left_click_drag",
            ComputerAction::RightClick => "right_click",
            ComputerAction::MiddleClick => "middle_click",
            ComputerAction::DoubleClick => "double_click",
            ComputerAction::TripleClick => "triple_click",
            ComputerAction::Screenshot => "screenshot",
            ComputerAction::CursorPosition => "cursor_position",
            ComputerAction::LeftMouseDown => "left_mouse_down",
            ComputerAction::LeftMouseUp => "left_mouse_up",
            ComputerAction::Scroll => "scroll",
            ComputerAction::HoldKey => "hold_key",
            ComputerAction::Wait => "wait",
        }
    }
}

impl fmt::Display for ComputerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputerAction {
    type Err = ComputerInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| ComputerInputError::UnknownAction(s.to_string()))
    }
}

const ACTIONS_20241022: &[ComputerAction] = &[
    ComputerAction::Key,
    ComputerAction::Type,
    ComputerAction::MouseMove,
    ComputerAction::LeftClick,
    ComputerAction::LeftClickDrag,
    ComputerAction::RightClick,
    ComputerAction::MiddleClick,
    ComputerAction::DoubleClick,
    ComputerAction::Screenshot,
    ComputerAction::CursorPosition,
];

const ACTIONS_20250124: &[ComputerAction] = &[
    ComputerAction::Key,
    ComputerAction::Type,
    ComputerAction::MouseMove,
    ComputerAction::LeftClick,
    ComputerAction::LeftClickDrag,
    ComputerAction::RightClick,
    ComputerAction::MiddleClick,
    ComputerAction::DoubleClick,
    ComputerAction::TripleClick,
    ComputerAction::Screenshot,
    ComputerAction::CursorPosition,
    ComputerAction::LeftMouseDown,
    ComputerAction::LeftMouseUp,
    ComputerAction::Scroll,
    ComputerAction::HoldKey,
    ComputerAction::Wait,
];

/// Versions of the vendor computer tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComputerToolVersion {
    #[default]
    #[serde(rename = "computer_20241022")]
    V20241022,
    #[serde(rename = "computer_20250124")]
    V20250124,
}

impl ComputerToolVersion {
    pub const ALL: [ComputerToolVersion; 2] =
        [ComputerToolVersion::V20241022, ComputerToolVersion::V20250124];

    /// The `type` field of the vendor tool declaration
    pub fn tool_type(&self) -> &'static str {
        match self {
            ComputerToolVersion::V20241022 => "computer_20241022",
            ComputerToolVersion::V20250124 => "computer_20250124",
        }
    }

    /// Beta header value that enables this tool version
    pub fn beta_flag(&self) -> &'static str {
        match self {
            ComputerToolVersion::V20241022 => "computer-use-2024-10-22",
            ComputerToolVersion::V20250124 => "computer-use-2025-01-24",
        }
    }

    pub fn actions(&self) -> &'static [ComputerAction] {
        match self {
            ComputerToolVersion::V20241022 => ACTIONS_20241022,
            ComputerToolVersion::V20250124 => ACTIONS_20250124,
        }
    }

    pub fn supports(&self, action: ComputerAction) -> bool {
        self.actions().contains(&action)
    }

    pub fn from_tool_type(tool_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.tool_type() == tool_type)
    }

    fn has_scroll_fields(&self) -> bool {
        matches!(self, ComputerToolVersion::V20250124)
    }
}

/// Accepts the full tool type (`computer_20250124`) or just its date (`20250124`)
impl FromStr for ComputerToolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.tool_type() == trimmed || v.tool_type().strip_prefix("computer_") == Some(trimmed))
            .ok_or_else(|| {
                format!(
                    "unknown computer tool version '{}' (expected 20241022 or 20250124)",
                    trimmed
                )
            })
    }
}

/// Size of the controlled display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub width_px: u32,
    pub height_px: u32,
    pub display_number: Option<u32>,
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self {
            width_px: 1280,
            height_px: 800,
            display_number: None,
        }
    }
}

/// Converts the computer tool and its calls between the two schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolSchemaTranslator {
    version: ComputerToolVersion,
    display: DisplayGeometry,
}

impl ToolSchemaTranslator {
    pub fn new(version: ComputerToolVersion, display: DisplayGeometry) -> Self {
        Self { version, display }
    }

    pub fn version(&self) -> ComputerToolVersion {
        self.version
    }

    pub fn display(&self) -> DisplayGeometry {
        self.display
    }

    /// The tool as declared to the vendor API
    pub fn vendor_tool_definition(&self) -> VendorToolDefinition {
        VendorToolDefinition {
            tool_type: self.version.tool_type().to_string(),
            name: COMPUTER_TOOL_NAME.to_string(),
            display_width_px: self.display.width_px,
            display_height_px: self.display.height_px,
            display_number: self.display.display_number,
        }
    }

    /// The tool as a generic function definition
    pub fn generic_tool_definition(&self) -> GenericTool {
        build_generic_tool(self.version, self.display)
    }

    /// Converts a vendor declaration into the equivalent generic function
    pub fn vendor_to_generic(
        &self,
        definition: &VendorToolDefinition,
    ) -> Result<GenericTool, ToolSchemaError> {
        if definition.name != COMPUTER_TOOL_NAME {
            return Err(ToolSchemaError::UnknownTool(definition.name.clone()));
        }
        let version = ComputerToolVersion::from_tool_type(&definition.tool_type)
            .ok_or_else(|| ToolSchemaError::UnsupportedToolType(definition.tool_type.clone()))?;
        let display = DisplayGeometry {
            width_px: definition.display_width_px,
            height_px: definition.display_height_px,
            display_number: definition.display_number,
        };
        Ok(build_generic_tool(version, display))
    }

    /// Converts a generic function back into a vendor declaration
    ///
    /// The action enum must equal the action set of one known tool version.
    pub fn generic_to_vendor(
        &self,
        tool: &GenericTool,
        display: DisplayGeometry,
    ) -> Result<VendorToolDefinition, ToolSchemaError> {
        if tool.function.name != COMPUTER_TOOL_NAME {
            return Err(ToolSchemaError::UnknownTool(tool.function.name.clone()));
        }
        let listed = action_enum(&tool.function.parameters)?;
        let listed_set: BTreeSet<&str> = listed.iter().map(String::as_str).collect();

        let version = ComputerToolVersion::ALL
            .into_iter()
            .find(|version| {
                let expected: BTreeSet<&str> =
                    version.actions().iter().map(ComputerAction::as_str).collect();
                expected == listed_set
            })
            .ok_or_else(|| ToolSchemaError::ActionSetMismatch(listed.clone()))?;

        Ok(ToolSchemaTranslator::new(version, display).vendor_tool_definition())
    }

    /// Converts a neutral tool call into a vendor `tool_use` block
    pub fn tool_call_to_vendor(&self, call: &ContentBlock) -> Option<VendorBlock> {
        match call {
            ContentBlock::ToolCall {
                id,
                name,
                arguments,
            } => Some(vendor_tool_use(id, name, arguments)),
            _ => None,
        }
    }

    /// Converts a neutral tool call into a generic function call
    pub fn tool_call_to_generic(
        &self,
        call: &ContentBlock,
    ) -> Result<Option<GenericToolCall>, TranslationError> {
        match call {
            ContentBlock::ToolCall {
                id,
                name,
                arguments,
            } => generic_tool_call(id, name, arguments).map(Some),
            _ => Ok(None),
        }
    }

    pub fn tool_call_from_vendor(&self, block: &VendorBlock) -> Option<ContentBlock> {
        match block {
            VendorBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::tool_call(id.clone(), name.clone(), input.clone()))
            }
            _ => None,
        }
    }

    pub fn tool_call_from_generic(
        &self,
        call: &GenericToolCall,
    ) -> Result<ContentBlock, TranslationError> {
        let arguments = parse_generic_arguments(call)?;
        Ok(ContentBlock::tool_call(
            call.id.clone(),
            call.function.name.clone(),
            arguments,
        ))
    }
}

fn coordinate_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "integer"},
        "minItems": 2,
        "maxItems": 2,
        "description": description
    })
}

fn build_generic_tool(version: ComputerToolVersion, display: DisplayGeometry) -> GenericTool {
    let actions: Vec<&str> = version.actions().iter().map(ComputerAction::as_str).collect();

    let mut properties = serde_json::Map::new();
    properties.insert(
        "action".to_string(),
        json!({
            "type": "string",
            "enum": actions,
            "description": "The action to perform"
        }),
    );
    properties.insert(
        "coordinate".to_string(),
        coordinate_schema("The [x, y] coordinate for mouse actions"),
    );
    properties.insert(
        "text".to_string(),
        json!({
            "type": "string",
            "description": "Text to type or key combination to press"
        }),
    );
    if version.has_scroll_fields() {
        properties.insert(
            "start_coordinate".to_string(),
            coordinate_schema("The [x, y] start coordinate for left_click_drag"),
        );
        properties.insert(
            "scroll_direction".to_string(),
            json!({
                "type": "string",
                "enum": ["up", "down", "left", "right"],
                "description": "Direction to scroll"
            }),
        );
        properties.insert(
            "scroll_amount".to_string(),
            json!({
                "type": "integer",
                "minimum": 0,
                "description": "Number of scroll wheel clicks"
            }),
        );
        properties.insert(
            "duration".to_string(),
            json!({
                "type": "number",
                "minimum": 0,
                "description": "Seconds to hold a key or wait"
            }),
        );
    }

    GenericTool {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: COMPUTER_TOOL_NAME.to_string(),
            description: format!(
                "{}. The display is {}x{} pixels.",
                COMPUTER_TOOL_DESCRIPTION, display.width_px, display.height_px
            ),
            parameters: json!({
                "type": "object",
                "properties": Value::Object(properties),
                "required": ["action"]
            }),
        },
    }
}

fn action_enum(parameters: &Value) -> Result<Vec<String>, ToolSchemaError> {
    let values = parameters
        .pointer("/properties/action/enum")
        .and_then(Value::as_array)
        .ok_or(ToolSchemaError::MissingActionEnum)?;
    values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or(ToolSchemaError::MissingActionEnum)
        })
        .collect()
}

/// Invalid arguments on a computer tool call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputerInputError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid computer tool input: {0}")]
    Invalid(String),

    #[error("action '{action}' requires '{field}'")]
    MissingField {
        action: ComputerAction,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Typed arguments of a computer tool call, as handed to the action executor
///
/// Coordinates are integers end to end; a fractional coordinate is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerInput {
    pub action: ComputerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<[i64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_coordinate: Option<[i64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_direction: Option<ScrollDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_amount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ComputerInput {
    pub fn new(action: ComputerAction) -> Self {
        Self {
            action,
            coordinate: None,
            start_coordinate: None,
            text: None,
            scroll_direction: None,
            scroll_amount: None,
            duration: None,
        }
    }

    pub fn with_coordinate(mut self, x: i64, y: i64) -> Self {
        self.coordinate = Some([x, y]);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Parses and validates tool call arguments
    pub fn from_arguments(arguments: &Value) -> Result<Self, ComputerInputError> {
        if let Some(action) = arguments.get("action").and_then(Value::as_str) {
            action.parse::<ComputerAction>()?;
        }
        let input: ComputerInput = serde_json::from_value(arguments.clone())
            .map_err(|e| ComputerInputError::Invalid(e.to_string()))?;
        input.validate()?;
        Ok(input)
    }

    /// Serializes back to tool call arguments
    pub fn to_arguments(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "action": self.action.as_str() }))
    }

    fn validate(&self) -> Result<(), ComputerInputError> {
        let missing = |field| ComputerInputError::MissingField {
            action: self.action,
            field,
        };
        match self.action {
            ComputerAction::MouseMove | ComputerAction::LeftClickDrag if self.coordinate.is_none() => {
                Err(missing("coordinate"))
            }
            ComputerAction::Type | ComputerAction::Key | ComputerAction::HoldKey
                if self.text.is_none() =>
            {
                Err(missing("text"))
            }
            ComputerAction::Scroll if self.scroll_direction.is_none() => {
                Err(missing("scroll_direction"))
            }
            _ => Ok(()),
        }
    }
}
