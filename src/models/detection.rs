use serde::{Deserialize, Serialize};

/// Human-readable class labels, indexed by the detector's class id.
pub const LABELS: [&str; 6] = [
    "Хорошая сварка",
    "Плохая сварка",
    "Трещины",
    "Пустоты",
    "Брызги",
    "Подрез",
];

/// Labels that vouch for a good seam.
pub const ACCEPT_LABELS: [&str; 1] = ["Хорошая сварка"];

/// Labels that fail a seam, whatever else was detected.
pub const REJECT_LABELS: [&str; 4] = ["Плохая сварка", "Трещины", "Пустоты", "Подрез"];

/// Bounding box in pixel coordinates of the normalized image: [x1, y1, x2, y2].
pub type BBox = [f32; 4];

/// Detector output for one image: parallel sequences of boxes and class ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDetection {
    #[serde(default)]
    pub boxes: Vec<BBox>,
    #[serde(default)]
    pub classes: Vec<u32>,
}

/// How a label counts toward the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Accept,
    Reject,
    Neutral,
}

pub fn label_kind(label: &str) -> LabelKind {
    if REJECT_LABELS.contains(&label) {
        LabelKind::Reject
    } else if ACCEPT_LABELS.contains(&label) {
        LabelKind::Accept
    } else {
        LabelKind::Neutral
    }
}

pub fn label_for(class_id: u32) -> Option<&'static str> {
    LABELS.get(class_id as usize).copied()
}

/// True only when an accept label is present and no reject label is.
/// A reject label wins over any number of accept labels.
pub fn verdict<S: AsRef<str>>(labels: &[S]) -> bool {
    let mut accepted = false;
    for label in labels {
        match label_kind(label.as_ref()) {
            LabelKind::Reject => return false,
            LabelKind::Accept => accepted = true,
            LabelKind::Neutral => {}
        }
    }
    accepted
}

/// Serialized result for one input image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub boxes: Vec<BBox>,
    pub labels: Vec<String>,
    pub verdict: bool,
}

impl DetectionResult {
    pub fn from_labels(boxes: Vec<BBox>, labels: Vec<String>) -> Self {
        let verdict = verdict(labels.as_slice());
        Self {
            boxes,
            labels,
            verdict,
        }
    }
}

// The `.box` sidecar is the JSON array `[boxes, labels, verdict]`.
impl Serialize for DetectionResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.boxes, &self.labels, self.verdict).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DetectionResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (boxes, labels, verdict) = <(Vec<BBox>, Vec<String>, bool)>::deserialize(deserializer)?;
        Ok(Self {
            boxes,
            labels,
            verdict,
        })
    }
}
