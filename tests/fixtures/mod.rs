//! Test fixtures: synthetic weld photos and scripted detector outcomes

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::io::Cursor;

/// One verdict scenario: the class ids the detector reports and the verdict
/// the serializer must derive from them.
#[derive(Debug, Clone)]
pub struct VerdictFixture {
    pub classes: &'static [u32],
    pub expected_labels: &'static [&'static str],
    pub should_pass: bool,
    pub description: &'static str,
}

pub const VERDICT_FIXTURES: &[VerdictFixture] = &[
    VerdictFixture {
        classes: &[2],
        expected_labels: &["Трещины"],
        should_pass: false,
        description: "crack only",
    },
    VerdictFixture {
        classes: &[0],
        expected_labels: &["Хорошая сварка"],
        should_pass: true,
        description: "good seam only",
    },
    VerdictFixture {
        classes: &[0, 3],
        expected_labels: &["Хорошая сварка", "Пустоты"],
        should_pass: false,
        description: "good seam with voids: reject wins",
    },
    VerdictFixture {
        classes: &[4, 0],
        expected_labels: &["Брызги", "Хорошая сварка"],
        should_pass: true,
        description: "spatter is neutral",
    },
    VerdictFixture {
        classes: &[],
        expected_labels: &[],
        should_pass: false,
        description: "nothing detected",
    },
];

/// A non-square gradient photo, encoded in the given format.
pub fn weld_photo(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn weld_png() -> Vec<u8> {
    weld_photo(320, 240, image::ImageFormat::Png)
}
