use serde::{Deserialize, Serialize};

use crate::llm::types::ModelVersion;
use crate::perception::box_parser::ScreenCoords;
use crate::perception::types::ScreenContext;

/// Everything an action parser gets to see about one prediction.
#[derive(Debug, Clone, Copy)]
pub struct ParseRequest<'a> {
    pub prediction: &'a str,
    /// Coordinate grid of the model output, `[width, height]`.
    pub factors: [f64; 2],
    pub screen_context: ScreenContext,
    pub scale_factor: f64,
    pub model_version: ModelVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    LeftDouble,
    RightSingle,
    Drag,
    MouseMove,
    Hotkey,
    Press,
    Release,
    Type,
    Scroll,
    Wait,
    Finished,
    CallUser,
    /// Anything the parser does not know; the raw name is kept.
    Other(String),
}

impl ActionKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "click" | "left_single" => Self::Click,
            "left_double" | "double_click" => Self::LeftDouble,
            "right_single" | "right_click" => Self::RightSingle,
            "drag" | "select" => Self::Drag,
            "mouse_move" | "hover" => Self::MouseMove,
            "hotkey" => Self::Hotkey,
            "press" | "keydown" => Self::Press,
            "release" | "keyup" => Self::Release,
            "type" => Self::Type,
            "scroll" => Self::Scroll,
            "wait" => Self::Wait,
            "finished" => Self::Finished,
            "call_user" => Self::CallUser,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the action needs a target box to be executable.
    pub fn is_pointer_action(&self) -> bool {
        matches!(
            self,
            Self::Click | Self::LeftDouble | Self::RightSingle | Self::Drag | Self::MouseMove
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Normalised box, `[x1,y1,x2,y2]` in 0..1 space.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_box: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_box: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub start_coords: ScreenCoords,
    pub end_coords: ScreenCoords,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
    pub reflection: Option<String>,
    pub thought: Option<String>,
    pub action_type: ActionKind,
    pub action_inputs: ActionInputs,
    /// Action text exactly as the model wrote it.
    pub raw: String,
}

/// Parser output: typed actions plus any text that could not be turned into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPrediction {
    pub actions: Vec<ParsedAction>,
    pub remainder: Option<String>,
}
