//! Aspect-ratio classification of video frames.

use serde::Serialize;

/// Relative distance from an exact ratio still counted as a match.
const TOLERANCE: f64 = 0.1;

/// Coarse orientation of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "other")]
    Other,
}

impl AspectRatio {
    /// Classify a frame size. A zero height is `Other` rather than a division by zero.
    pub fn classify(width: u32, height: u32) -> Self {
        if height == 0 {
            return AspectRatio::Other;
        }
        let ratio = f64::from(width) / f64::from(height);
        if (ratio - 16.0 / 9.0).abs() < TOLERANCE {
            AspectRatio::Landscape
        } else if (ratio - 9.0 / 16.0).abs() < TOLERANCE {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Other => "other",
        }
    }

    /// Key prefix under which videos of this orientation are stored.
    pub fn folder(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_resolutions() {
        assert_eq!(AspectRatio::classify(1920, 1080), AspectRatio::Landscape);
        assert_eq!(AspectRatio::classify(1280, 720), AspectRatio::Landscape);
        assert_eq!(AspectRatio::classify(1080, 1920), AspectRatio::Portrait);
        assert_eq!(AspectRatio::classify(608, 1080), AspectRatio::Portrait);
        assert_eq!(AspectRatio::classify(1000, 1000), AspectRatio::Other);
        assert_eq!(AspectRatio::classify(640, 480), AspectRatio::Other);
    }

    #[test]
    fn test_tolerance_edges() {
        // 1.70 is within 0.1 of 1.777.., 1.65 is not.
        assert_eq!(AspectRatio::classify(170, 100), AspectRatio::Landscape);
        assert_eq!(AspectRatio::classify(165, 100), AspectRatio::Other);
    }

    #[test]
    fn test_zero_height() {
        assert_eq!(AspectRatio::classify(1920, 0), AspectRatio::Other);
        assert_eq!(AspectRatio::classify(0, 0), AspectRatio::Other);
    }

    #[test]
    fn test_labels_and_folders() {
        assert_eq!(AspectRatio::Landscape.to_string(), "16:9");
        assert_eq!(AspectRatio::Portrait.label(), "9:16");
        assert_eq!(AspectRatio::Other.label(), "other");
        assert_eq!(AspectRatio::Landscape.folder(), "landscape");
        assert_eq!(AspectRatio::Portrait.folder(), "portrait");
        assert_eq!(
            serde_json::to_string(&AspectRatio::Portrait).unwrap(),
            "\"9:16\""
        );
    }
}
