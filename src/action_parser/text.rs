//! Parser for the `Thought: ... Action: name(arg='value')` prediction format.
//!
//! Coordinates come either on the `factors` grid (1.0 models) or in the pixel
//! space of the smart-resized screenshot (1.5 and Doubao models). Both are
//! normalised into 0..1 boxes before being mapped onto the screen.

use async_trait::async_trait;
use regex::Regex;

use crate::action_parser::types::{ActionInputs, ActionKind, ParseRequest, ParsedAction, ParsedPrediction};
use crate::action_parser::ActionParser;
use crate::errors::{PilotError, PilotResult};
use crate::perception::box_parser::parse_box_to_screen_coords;
use crate::perception::types::{smart_resize, IMAGE_FACTOR, MIN_PIXELS};

const REFLECTION_MARKER: &str = "Reflection:";
const SUMMARY_MARKER: &str = "Action_Summary:";
const THOUGHT_MARKER: &str = "Thought:";

pub struct TextActionParser {
    action_marker: Regex,
    call: Regex,
    arg_key: Regex,
    number: Regex,
}

struct Sections<'a> {
    reflection: Option<String>,
    thought: Option<String>,
    actions: &'a str,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

fn unescape(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\"", "\"").replace("\\n", "\n")
}

impl TextActionParser {
    pub fn new() -> PilotResult<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| PilotError::ActionParse(e.to_string()));
        Ok(Self {
            action_marker: compile(r"(?m)^[ \t]*Action:")?,
            call: compile(r"(?s)^(\w+)\s*\((.*)\)\s*$")?,
            arg_key: compile(r"(\w+)\s*=\s*")?,
            number: compile(r"-?\d+(?:\.\d+)?")?,
        })
    }

    fn split_sections<'a>(&self, text: &'a str) -> Sections<'a> {
        let Some(marker) = self.action_marker.find(text) else {
            return Sections {
                reflection: None,
                thought: None,
                actions: text.trim(),
            };
        };
        let head = &text[..marker.start()];
        let actions = text[marker.end()..].trim();

        let (reflection, thought) = if let Some(idx) = head.find(REFLECTION_MARKER) {
            let after = &head[idx + REFLECTION_MARKER.len()..];
            match after.find(SUMMARY_MARKER) {
                Some(s) => (non_empty(&after[..s]), non_empty(&after[s + SUMMARY_MARKER.len()..])),
                None => (non_empty(after), None),
            }
        } else if let Some(idx) = head.find(THOUGHT_MARKER) {
            (None, non_empty(&head[idx + THOUGHT_MARKER.len()..]))
        } else {
            (None, non_empty(head))
        };

        Sections {
            reflection,
            thought,
            actions,
        }
    }

    /// `key='value'` pairs in call order. `content` swallows the rest of the
    /// argument list since it may contain quotes, commas and `=`.
    fn parse_args(&self, args: &str) -> Vec<(String, String)> {
        let keys: Vec<(usize, usize, &str)> = self
            .arg_key
            .captures_iter(args)
            .filter_map(|c| {
                let whole = c.get(0)?;
                Some((whole.start(), whole.end(), c.get(1)?.as_str()))
            })
            .collect();

        let mut out = Vec::with_capacity(keys.len());
        for (i, (_, value_start, key)) in keys.iter().enumerate() {
            if *key == "content" {
                out.push((key.to_string(), unescape(strip_quotes(&args[*value_start..]))));
                break;
            }
            let value_end = keys.get(i + 1).map_or(args.len(), |(next_start, _, _)| *next_start);
            let value = args[*value_start..value_end].trim().trim_end_matches(',');
            out.push((key.to_string(), strip_quotes(value).to_string()));
        }
        out
    }

    /// Pixel size the model's coordinates are expressed in.
    fn coordinate_space(&self, request: &ParseRequest<'_>) -> [f64; 2] {
        if !request.model_version.uses_absolute_coordinates() {
            return request.factors;
        }
        let (width, height) = request.screen_context.physical(request.scale_factor);
        let (w, h) = smart_resize(width, height, IMAGE_FACTOR, MIN_PIXELS, request.model_version.max_pixels());
        [w as f64, h as f64]
    }

    /// Any box notation (`(x,y)`, `[x1,y1,x2,y2]`, `<point>x y</point>`,
    /// `<|box_start|>(x,y)<|box_end|>`, `<bbox>..</bbox>`) to a 0..1 box.
    fn normalize_box(&self, raw: &str, space: [f64; 2]) -> Option<String> {
        let mut nums: Vec<f64> = self
            .number
            .find_iter(raw)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        match nums.len() {
            2 => nums.extend_from_within(..),
            4 => {}
            _ => return None,
        }
        let scaled: Vec<String> = nums
            .iter()
            .enumerate()
            .map(|(i, n)| (n / space[i % 2]).to_string())
            .collect();
        Some(format!("[{}]", scaled.join(",")))
    }

    fn parse_action(
        &self,
        segment: &str,
        sections: &Sections<'_>,
        request: &ParseRequest<'_>,
    ) -> Option<ParsedAction> {
        let caps = self.call.captures(segment)?;
        let name = caps.get(1)?.as_str();
        let args = caps.get(2).map_or("", |m| m.as_str());
        let space = self.coordinate_space(request);

        let mut inputs = ActionInputs::default();
        for (key, value) in self.parse_args(args) {
            match key.as_str() {
                "start_box" | "start_point" | "point" => inputs.start_box = self.normalize_box(&value, space),
                "end_box" | "end_point" => inputs.end_box = self.normalize_box(&value, space),
                "content" => inputs.content = Some(value),
                "key" | "hotkey" => inputs.key = Some(value.trim().to_string()),
                "direction" => inputs.direction = Some(value.trim().to_ascii_lowercase()),
                other => tracing::debug!(action = name, arg = other, "ignoring unknown action argument"),
            }
        }

        let action_type = ActionKind::from_name(name);
        if action_type.is_pointer_action() && inputs.start_box.is_none() {
            tracing::warn!(action = name, "pointer action without a usable start box");
        }

        let (width, height) = (request.screen_context.width as f64, request.screen_context.height as f64);
        inputs.start_coords = parse_box_to_screen_coords(inputs.start_box.as_deref(), width, height, request.factors);
        inputs.end_coords = parse_box_to_screen_coords(inputs.end_box.as_deref(), width, height, request.factors);

        Some(ParsedAction {
            reflection: sections.reflection.clone(),
            thought: sections.thought.clone(),
            action_type,
            action_inputs: inputs,
            raw: segment.to_string(),
        })
    }

    pub fn parse_text(&self, request: &ParseRequest<'_>) -> PilotResult<ParsedPrediction> {
        let sections = self.split_sections(request.prediction);

        let mut actions = Vec::new();
        let mut unparsed = Vec::new();
        for segment in sections.actions.split("\n\n").map(str::trim).filter(|s| !s.is_empty()) {
            match self.parse_action(segment, &sections, request) {
                Some(action) => actions.push(action),
                None => unparsed.push(segment),
            }
        }

        if actions.is_empty() {
            return Err(PilotError::ActionParse(format!(
                "no action found in prediction: {}",
                crate::errors::truncate_chars(request.prediction, 200)
            )));
        }
        Ok(ParsedPrediction {
            actions,
            remainder: (!unparsed.is_empty()).then(|| unparsed.join("\n\n")),
        })
    }
}

#[async_trait]
impl ActionParser for TextActionParser {
    async fn parse(&self, request: &ParseRequest<'_>) -> PilotResult<ParsedPrediction> {
        self.parse_text(request)
    }
}
