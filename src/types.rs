use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an [`ImageReference`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageOrigin {
    Preset,
    Upload,
    Generated,
}

/// An immutable handle to an image: either a remote URL or an inline data URL.
///
/// References are never mutated. A new selection or a new result always means
/// a new reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    pub id: String,
    pub source: String,
    pub origin: ImageOrigin,
}

impl ImageReference {
    /// A catalog entry pointing at a remote URL.
    pub fn preset(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: url.into(),
            origin: ImageOrigin::Preset,
        }
    }

    /// A user upload; `source` must already be inline-encoded.
    pub fn upload(id: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: data_url.into(),
            origin: ImageOrigin::Upload,
        }
    }

    /// Output of the generation service.
    pub fn generated(id: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: data_url.into(),
            origin: ImageOrigin::Generated,
        }
    }

    /// Whether this image was produced by the generation service.
    pub fn is_generated(&self) -> bool {
        self.origin == ImageOrigin::Generated
    }

    /// Whether `source` is a self-contained data URL.
    pub fn is_inline(&self) -> bool {
        is_inline_source(&self.source)
    }
}

/// Inline sources are data URLs; anything else has to be fetched first.
pub fn is_inline_source(source: &str) -> bool {
    source.starts_with("data:")
}

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SelectPerson,
    SelectGarment,
    GenerateResult,
}

impl Step {
    /// 1-based position used for progress indicators.
    pub fn number(&self) -> u8 {
        match self {
            Step::SelectPerson => 1,
            Step::SelectGarment => 2,
            Step::GenerateResult => 3,
        }
    }
}

/// User-visible state of the composite generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum GenerationStatus {
    Idle,
    Pending,
    Failed { message: String },
    Ready,
}

impl GenerationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, GenerationStatus::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, GenerationStatus::Failed { .. })
    }
}

/// Snapshot of one completed generation. Holds copies of the sources, not
/// links back into the wizard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub person_ref: String,
    pub garment_ref: String,
    pub result_ref: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        person_ref: impl Into<String>,
        garment_ref: impl Into<String>,
        result_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            person_ref: person_ref.into(),
            garment_ref: garment_ref.into(),
            result_ref: result_ref.into(),
            created_at: Utc::now(),
        }
    }
}
