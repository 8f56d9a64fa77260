//! Launcher configuration ingestion.
//!
//! Older embeds describe a launcher as one flat object:
//!
//! ```json
//! { "flowId": "tour", "type": "icon", "position": "bottom-left",
//!   "urlMatch": "*/dashboard", "dismissAfterActivation": true }
//! ```
//!
//! [`IngestLauncher::ingest`] accepts either that or the canonical shape and
//! always yields a [`LauncherConfig`]; nothing past this point sees the flat
//! form.

use serde::Deserialize;
use serde_json::Value;
use wayfinder_protocols::{
    Activation, Appearance, AttachMode, ConfigParseError, Corner, FlowRef, LauncherConfig,
    LauncherKind, Side, StepRef, TargetSpec, VisibilityRules,
};

const SUBJECT: &str = "launcher";
const LEGACY_KEYS: [&str; 5] = ["flowId", "type", "position", "selector", "urlMatch"];
const FIXED_OFFSET: f64 = 20.0;
const BEACON_SIZE: f64 = 16.0;
const CONTROL_SIZE: f64 = 48.0;

/// Conversion of raw launcher JSON into the canonical model.
pub trait IngestLauncher: Sized {
    fn ingest(value: &Value) -> Result<Self, ConfigParseError>;
}

impl IngestLauncher for LauncherConfig {
    fn ingest(value: &Value) -> Result<Self, ConfigParseError> {
        let Some(object) = value.as_object() else {
            return Err(unrecognized("expected a JSON object"));
        };
        if object.contains_key("attach") {
            return Ok(serde_json::from_value(value.clone())?);
        }
        if !LEGACY_KEYS.iter().any(|key| object.contains_key(*key)) {
            return Err(unrecognized("neither `attach` nor any legacy launcher key present"));
        }
        let legacy: LegacyLauncher = serde_json::from_value(value.clone())?;
        legacy.into_canonical()
    }
}

fn unrecognized(message: &str) -> ConfigParseError {
    ConfigParseError::UnrecognizedShape {
        subject: SUBJECT.to_string(),
        message: message.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Patterns {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Patterns {
    fn into_vec(self) -> Vec<String> {
        match self {
            Patterns::None => Vec::new(),
            Patterns::One(p) if p.trim().is_empty() => Vec::new(),
            Patterns::One(p) => vec![p],
            Patterns::Many(ps) => ps.into_iter().filter(|p| !p.trim().is_empty()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyLauncher {
    id: Option<String>,
    flow_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    position: Option<String>,
    selector: Option<String>,
    #[serde(default)]
    url_match: Patterns,
    #[serde(default)]
    url_exclude: Patterns,
    label: Option<String>,
    step_id: Option<Value>,
    #[serde(default, alias = "dismissAfterFirstActivation")]
    dismiss_after_activation: bool,
    #[serde(default)]
    show_while_tour_active: bool,
    side: Option<Side>,
    offset_x: Option<f64>,
    offset_y: Option<f64>,
}

impl LegacyLauncher {
    fn into_canonical(self) -> Result<LauncherConfig, ConfigParseError> {
        let flow = self
            .flow_id
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ConfigParseError::MissingField {
                subject: self.id.clone().unwrap_or_else(|| SUBJECT.to_string()),
                field: "flowId".to_string(),
            })?;

        let kind = match self.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("button") => LauncherKind::Button,
            Some("icon") => LauncherKind::Icon,
            Some("beacon") | Some("hotspot") => LauncherKind::Beacon,
            Some(other) => return Err(unrecognized(&format!("unknown launcher type `{}`", other))),
        };
        let size = if kind == LauncherKind::Beacon {
            BEACON_SIZE
        } else {
            CONTROL_SIZE
        };

        let attach = match self.selector.filter(|s| !s.trim().is_empty()) {
            Some(selector) => AttachMode::ElementAttached {
                target: TargetSpec::selector(selector),
                side: self.side.unwrap_or_default(),
                offset_x: self.offset_x.unwrap_or(0.0),
                offset_y: self.offset_y.unwrap_or(0.0),
            },
            None => AttachMode::Fixed {
                corner: parse_corner(self.position.as_deref())?,
                offset_x: self.offset_x.unwrap_or(FIXED_OFFSET),
                offset_y: self.offset_y.unwrap_or(FIXED_OFFSET),
            },
        };

        let start_step = match self.step_id {
            Some(Value::String(s)) => StepRef::parse(&s),
            Some(Value::Number(n)) => n.as_u64().map(|i| StepRef::Index(i as usize)),
            _ => None,
        };

        Ok(LauncherConfig {
            id: self.id.unwrap_or_else(|| format!("{}-launcher", flow)),
            appearance: Appearance {
                kind,
                label: self.label,
                width: size,
                height: size,
            },
            attach,
            visibility: VisibilityRules {
                include: self.url_match.into_vec(),
                exclude: self.url_exclude.into_vec(),
                show_conditions: Vec::new(),
                show_while_tour_active: self.show_while_tour_active,
            },
            activation: Activation {
                flow: FlowRef::new(flow),
                start_step,
                dismiss_after_first_activation: self.dismiss_after_activation,
            },
        })
    }
}

/// Accepts `bottom-right`, `bottomRight` and `bottom_right`.
fn parse_corner(position: Option<&str>) -> Result<Corner, ConfigParseError> {
    let Some(position) = position else {
        return Ok(Corner::default());
    };
    let normalized: String = position
        .trim()
        .chars()
        .flat_map(|c| match c {
            '_' | ' ' => vec!['-'],
            c if c.is_ascii_uppercase() => vec!['-', c.to_ascii_lowercase()],
            c => vec![c],
        })
        .collect();
    match normalized.as_str() {
        "top-left" => Ok(Corner::TopLeft),
        "top-right" => Ok(Corner::TopRight),
        "bottom-left" => Ok(Corner::BottomLeft),
        "bottom-right" => Ok(Corner::BottomRight),
        _ => Err(unrecognized(&format!("unknown position `{}`", position))),
    }
}
