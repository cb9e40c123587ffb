//! Configuration for stacking operations.
//!
//! Options resolve in layers, lowest precedence first:
//!
//! 1. [`StackerOptions::default()`]
//! 2. the defaults held by a [`Stacker`](crate::Stacker) (see `set_defaults`)
//! 3. the override passed to a `build` call
//! 4. the `data-stacker-options` JSON attribute on the table element itself
//!
//! Every layer above the first is an [`OptionsOverride`]: only the fields it
//! sets replace the value below it.

use std::fmt;
use std::str::FromStr;

use cssparser::{Parser, ParserInput, Token};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StackerError;
use crate::Result;

/// Pixels per `em`/`rem` when evaluating a length against a viewport width.
pub const ROOT_FONT_SIZE_PX: f32 = 16.0;

/// Viewport threshold used when no `maxWidth` is configured.
pub const DEFAULT_MAX_WIDTH: &str = "740px";

/// Unit of a [`Length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Px,
    Em,
    Rem,
}

impl LengthUnit {
    fn as_str(&self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Em => "em",
            LengthUnit::Rem => "rem",
        }
    }
}

/// An absolute CSS length such as `740px` or `46.25em`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f32,
    pub unit: LengthUnit,
}

impl Length {
    pub fn px(value: f32) -> Self {
        Self {
            value,
            unit: LengthUnit::Px,
        }
    }

    pub fn em(value: f32) -> Self {
        Self {
            value,
            unit: LengthUnit::Em,
        }
    }

    /// Parse a CSS length token.
    ///
    /// Accepts `px`, `em` and `rem` dimensions, plus a bare `0`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |message: &str| StackerError::InvalidLength {
            input: input.to_string(),
            message: message.to_string(),
        };

        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);

        let token = parser
            .next()
            .map_err(|_| invalid("expected a length"))?
            .clone();

        let length = match token {
            Token::Dimension {
                value, ref unit, ..
            } => {
                let unit = if unit.eq_ignore_ascii_case("px") {
                    LengthUnit::Px
                } else if unit.eq_ignore_ascii_case("em") {
                    LengthUnit::Em
                } else if unit.eq_ignore_ascii_case("rem") {
                    LengthUnit::Rem
                } else {
                    return Err(invalid(&format!("unsupported unit '{}'", &**unit)));
                };
                Length { value, unit }
            }
            Token::Number { value, .. } if value == 0.0 => Length::px(0.0),
            Token::Number { .. } => return Err(invalid("missing unit")),
            _ => return Err(invalid("expected a length")),
        };

        if parser.expect_exhausted().is_err() {
            return Err(invalid("unexpected trailing input"));
        }
        if length.value < 0.0 {
            return Err(invalid("length must not be negative"));
        }

        Ok(length)
    }

    /// Resolve to CSS pixels.
    pub fn to_px(&self) -> f32 {
        match self.unit {
            LengthUnit::Px => self.value,
            LengthUnit::Em | LengthUnit::Rem => self.value * ROOT_FONT_SIZE_PX,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

impl FromStr for Length {
    type Err = StackerError;

    fn from_str(s: &str) -> Result<Self> {
        Length::parse(s)
    }
}

/// Viewport width at or below which the stacked table is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxWidth {
    /// Show the stacked table up to this width
    Length(Length),
    /// Always show the stacked table
    Unbounded,
}

impl Default for MaxWidth {
    fn default() -> Self {
        MaxWidth::Length(Length::px(740.0))
    }
}

impl MaxWidth {
    /// Threshold in CSS pixels, `None` when unbounded.
    pub fn to_px(&self) -> Option<f32> {
        match self {
            MaxWidth::Length(length) => Some(length.to_px()),
            MaxWidth::Unbounded => None,
        }
    }
}

impl fmt::Display for MaxWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxWidth::Length(length) => length.fmt(f),
            MaxWidth::Unbounded => f.write_str("none"),
        }
    }
}

impl FromStr for MaxWidth {
    type Err = StackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "infinity" | "unbounded" => Ok(MaxWidth::Unbounded),
            _ => Ok(MaxWidth::Length(Length::parse(s)?)),
        }
    }
}

/// Raw JSON shapes accepted for `maxWidth`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMaxWidth {
    Text(String),
    Pixels(f32),
}

impl RawMaxWidth {
    fn into_max_width(self) -> Result<MaxWidth> {
        match self {
            RawMaxWidth::Text(text) => text.parse(),
            RawMaxWidth::Pixels(px) if px.is_finite() && px >= 0.0 => {
                Ok(MaxWidth::Length(Length::px(px)))
            }
            RawMaxWidth::Pixels(px) => Err(StackerError::InvalidLength {
                input: px.to_string(),
                message: "length must be a finite, non-negative number".to_string(),
            }),
        }
    }
}

impl Serialize for MaxWidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MaxWidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<RawMaxWidth>::deserialize(deserializer)? {
            Some(raw) => raw.into_max_width().map_err(serde::de::Error::custom),
            None => Ok(MaxWidth::Unbounded),
        }
    }
}

/// `null` means unbounded, while an absent key leaves the layer below alone.
fn deserialize_max_width_override<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<MaxWidth>, D::Error>
where
    D: Deserializer<'de>,
{
    MaxWidth::deserialize(deserializer).map(Some)
}

/// Fully resolved options for one stacked table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackerOptions {
    /// Extra class appended to the stacked table
    pub custom_class: String,
    /// Copy table, caption and cell classes onto the stacked markup
    pub preserve_classes: bool,
    /// Width condition threshold
    pub max_width: MaxWidth,
}

impl Default for StackerOptions {
    fn default() -> Self {
        Self {
            custom_class: String::new(),
            preserve_classes: false,
            max_width: MaxWidth::default(),
        }
    }
}

impl StackerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the custom class
    pub fn custom_class(mut self, class: impl Into<String>) -> Self {
        self.custom_class = class.into();
        self
    }

    /// Builder: set class preservation
    pub fn preserve_classes(mut self, preserve: bool) -> Self {
        self.preserve_classes = preserve;
        self
    }

    /// Builder: set the width threshold
    pub fn max_width(mut self, max_width: MaxWidth) -> Self {
        self.max_width = max_width;
        self
    }

    /// Apply the fields set in `overrides` on top of these options.
    pub fn merge(&mut self, overrides: &OptionsOverride) {
        if let Some(class) = &overrides.custom_class {
            self.custom_class = class.clone();
        }
        if let Some(preserve) = overrides.preserve_classes {
            self.preserve_classes = preserve;
        }
        if let Some(max_width) = overrides.max_width {
            self.max_width = max_width;
        }
    }

    /// Non-consuming variant of [`merge`](Self::merge).
    pub fn merged(&self, overrides: &OptionsOverride) -> Self {
        let mut resolved = self.clone();
        resolved.merge(overrides);
        resolved
    }
}

/// A partial set of options, as supplied by callers or element attributes.
///
/// Unknown keys are ignored, so option objects written for other revisions
/// (for instance ones carrying a `callback` key) still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_classes: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_max_width_override",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_width: Option<MaxWidth>,
}

impl OptionsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an options object such as `{"customClass": "compact"}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder: set the custom class
    pub fn custom_class(mut self, class: impl Into<String>) -> Self {
        self.custom_class = Some(class.into());
        self
    }

    /// Builder: set class preservation
    pub fn preserve_classes(mut self, preserve: bool) -> Self {
        self.preserve_classes = Some(preserve);
        self
    }

    /// Builder: set the width threshold
    pub fn max_width(mut self, max_width: MaxWidth) -> Self {
        self.max_width = Some(max_width);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.custom_class.is_none() && self.preserve_classes.is_none() && self.max_width.is_none()
    }
}
