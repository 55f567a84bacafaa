use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::detection::{label_for, label_kind, BBox, DetectionResult, LabelKind, RawDetection};
use crate::services::normalize::{encode_png, NormalizeError};
use crate::services::workspace::{JobWorkspace, WorkspaceError};

const ACCEPT_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const REJECT_COLOR: Rgb<u8> = Rgb([230, 0, 0]);
const NEUTRAL_COLOR: Rgb<u8> = Rgb([255, 170, 0]);
const BOX_THICKNESS: i32 = 2;

/// Map class ids to labels and derive the verdict.
pub fn to_result(raw: RawDetection) -> Result<DetectionResult, SerializeError> {
    if raw.boxes.len() != raw.classes.len() {
        return Err(SerializeError::Shape {
            boxes: raw.boxes.len(),
            classes: raw.classes.len(),
        });
    }

    let labels = raw
        .classes
        .iter()
        .map(|&id| {
            label_for(id)
                .map(str::to_string)
                .ok_or(SerializeError::UnknownClass(id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetectionResult::from_labels(raw.boxes, labels))
}

/// Draw every box of `result` onto `image`, colored by how its label votes.
pub fn annotate(image: &mut RgbImage, result: &DetectionResult) {
    for (bbox, label) in result.boxes.iter().zip(&result.labels) {
        let color = match label_kind(label) {
            LabelKind::Accept => ACCEPT_COLOR,
            LabelKind::Reject => REJECT_COLOR,
            LabelKind::Neutral => NEUTRAL_COLOR,
        };
        draw_box(image, bbox, color);
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
        return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    for t in 0..BOX_THICKNESS {
        let width = x_max - x_min - 2 * t;
        let height = y_max - y_min - 2 * t;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Persist the artifacts of one image and list it in the manifest.
///
/// The annotated image and its sidecar are written before the manifest line,
/// so a listed filename always has both files behind it.
pub async fn persist(
    workspace: &JobWorkspace,
    filename: &str,
    raw: RawDetection,
) -> Result<DetectionResult, SerializeError> {
    let result = to_result(raw)?;

    let staged = workspace.input_path(filename);
    let to_draw = result.clone();
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, SerializeError> {
        let mut image = image::open(&staged).map_err(NormalizeError::from)?.to_rgb8();
        annotate(&mut image, &to_draw);
        Ok(encode_png(&image)?)
    })
    .await
    .map_err(|e| SerializeError::Task(e.to_string()))??;

    workspace.write_result_image(filename, &png).await?;
    workspace.write_sidecar(filename, &result).await?;
    workspace.append_manifest(filename).await?;

    tracing::debug!(
        job_id = %workspace.id(),
        filename,
        boxes = result.boxes.len(),
        verdict = result.verdict,
        "Result persisted"
    );

    Ok(result)
}

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("detector returned unknown class id {0}")]
    UnknownClass(u32),

    #[error("detector returned {boxes} boxes but {classes} classes")]
    Shape { boxes: usize, classes: usize },

    #[error("cannot render annotated image: {0}")]
    Image(#[from] NormalizeError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("annotation task failed: {0}")]
    Task(String),
}
