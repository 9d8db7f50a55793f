//! Conversation model, wire schemas and the translators between them

mod error;
pub mod generic;
mod message;
pub mod textual;
pub mod tool_schema;
pub mod translate;
pub mod validate;
pub mod vendor;

pub use error::{ToolSchemaError, Translated, TranslationError, TranslationWarning};
pub use message::{ContentBlock, Message, Role};
pub use tool_schema::{
    ComputerAction, ComputerInput, ComputerInputError, ComputerToolVersion, DisplayGeometry,
    ToolSchemaTranslator, COMPUTER_TOOL_NAME,
};
pub use translate::{MessageTranslator, ERROR_MARKER};
pub use validate::{check_tool_pairing, PairingTracker, ProtocolViolation};
