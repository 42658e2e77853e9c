//! Well-known annotation keys and the `editor.position` encoding.

use crate::spec::Annotations;
use serde::{Deserialize, Serialize};

/// Task/input/output annotation holding the visual position.
pub const POSITION_ANNOTATION: &str = "editor.position";

/// `metadata.annotations` key stamped on every regenerated spec.
pub const SDK_ANNOTATION: &str = "sdk";

/// Provenance marker written to [`SDK_ANNOTATION`].
pub const SDK_MARKER: &str = "conduit-pipeline-editor";

/// Visual placement of a node: `{x, y, width?, height?}`.
///
/// Reading is permissive (legacy `w`/`h` keys, numbers encoded as strings);
/// writing always uses the long key names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(deserialize_with = "lenient::number")]
    pub x: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub y: f64,
    #[serde(
        default,
        alias = "w",
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<f64>,
    #[serde(
        default,
        alias = "h",
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f64>,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: Option<f64>, height: Option<f64>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn encode(&self) -> String {
        // Serializing plain numbers into a JSON object cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Reads the position annotation, ignoring malformed values.
pub fn read_position(annotations: &Annotations) -> Option<Position> {
    let raw = annotations.get(POSITION_ANNOTATION)?;
    let position = Position::parse(raw);
    if position.is_none() {
        tracing::debug!(value = %raw, "Ignoring malformed position annotation");
    }
    position
}

pub fn write_position(annotations: &mut Annotations, position: Position) {
    annotations.insert(POSITION_ANNOTATION.to_string(), position.encode());
}

mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Number(f64),
        Text(String),
    }

    impl NumberLike {
        fn into_f64<E: Error>(self) -> Result<f64, E> {
            match self {
                NumberLike::Number(n) => Ok(n),
                NumberLike::Text(t) => t
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("'{t}' is not a number"))),
            }
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        NumberLike::deserialize(deserializer)?.into_f64()
    }

    pub fn optional_number<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        Option::<NumberLike>::deserialize(deserializer)?
            .map(NumberLike::into_f64)
            .transpose()
    }
}
