//! Codec negotiation
//!
//! Picks the first recording format from a preference list that the
//! platform can record natively.

use crate::capture::traits::FormatSupport;
use crate::export::ExportFormat;
use serde::{Deserialize, Serialize};

/// Format every platform is assumed to record
pub const UNIVERSAL_FALLBACK: &str = "video/webm";

/// Default preference order, most deliverable first
pub const DEFAULT_PREFERENCES: [&str; 4] = [
    "video/mp4",
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    UNIVERSAL_FALLBACK,
];

/// A parsed container/codec identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Container the stream is muxed into
    pub container: ExportFormat,
    /// Codec parameter, if one was given
    pub codec: Option<String>,
}

impl CaptureFormat {
    /// Parse a MIME identifier such as `video/webm;codecs=vp9`
    pub fn parse(mime: &str) -> Option<Self> {
        let mut parts = mime.split(';');
        let container = match parts.next()?.trim().to_ascii_lowercase().as_str() {
            "video/mp4" => ExportFormat::Mp4,
            "video/webm" => ExportFormat::Webm,
            _ => return None,
        };

        let codec = parts
            .filter_map(|param| param.trim().strip_prefix("codecs="))
            .map(|codec| codec.trim_matches('"').to_ascii_lowercase())
            .find(|codec| !codec.is_empty());

        Some(Self { container, codec })
    }

    /// File extension of the container
    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }
}

/// The format chosen for one recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecChoice {
    /// MIME identifier handed to the capture stream
    pub mime: String,
    /// Whether the native recording already matches the delivery format
    pub is_natively_deliverable: bool,
}

impl CodecChoice {
    /// Container of the negotiated format
    pub fn container(&self) -> ExportFormat {
        CaptureFormat::parse(&self.mime)
            .map(|format| format.container)
            .unwrap_or(ExportFormat::Webm)
    }
}

/// Select the first natively supported format from `preferences`
///
/// Never fails: when nothing in the list is supported the universal
/// fallback is returned.
pub fn select_format<S, P>(preferences: &[S], platform: &P, delivery: ExportFormat) -> CodecChoice
where
    S: AsRef<str>,
    P: FormatSupport + ?Sized,
{
    let mime = preferences
        .iter()
        .map(AsRef::<str>::as_ref)
        .find(|mime| platform.is_format_supported(mime))
        .unwrap_or_else(|| {
            tracing::warn!(
                "No preferred format supported, falling back to {}",
                UNIVERSAL_FALLBACK
            );
            UNIVERSAL_FALLBACK
        })
        .to_string();

    let is_natively_deliverable =
        CaptureFormat::parse(&mime).map_or(false, |format| format.container == delivery);

    tracing::debug!("Negotiated format {} (deliverable: {})", mime, is_natively_deliverable);

    CodecChoice {
        mime,
        is_natively_deliverable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Supports(Vec<&'static str>);

    impl FormatSupport for Supports {
        fn is_format_supported(&self, mime: &str) -> bool {
            self.0.iter().any(|supported| *supported == mime)
        }
    }

    #[test]
    fn test_parse_mime_with_codec() {
        let format = CaptureFormat::parse("video/webm;codecs=vp9").unwrap();
        assert_eq!(format.container, ExportFormat::Webm);
        assert_eq!(format.codec.as_deref(), Some("vp9"));
        assert_eq!(format.extension(), "webm");
    }

    #[test]
    fn test_parse_quoted_codec() {
        let format = CaptureFormat::parse("video/mp4; codecs=\"avc1.42E01E\"").unwrap();
        assert_eq!(format.container, ExportFormat::Mp4);
        assert_eq!(format.codec.as_deref(), Some("avc1.42e01e"));
    }

    #[test]
    fn test_parse_rejects_unknown_container() {
        assert!(CaptureFormat::parse("video/x-matroska").is_none());
        assert!(CaptureFormat::parse("").is_none());
    }

    #[test]
    fn test_first_supported_wins() {
        let platform = Supports(vec!["video/webm;codecs=vp8", "video/webm;codecs=vp9"]);
        let choice = select_format(&DEFAULT_PREFERENCES, &platform, ExportFormat::Mp4);
        assert_eq!(choice.mime, "video/webm;codecs=vp9");
        assert!(!choice.is_natively_deliverable);
    }

    #[test]
    fn test_deliverable_format_first() {
        let platform = Supports(vec!["video/mp4", "video/webm"]);
        let choice = select_format(&DEFAULT_PREFERENCES, &platform, ExportFormat::Mp4);
        assert_eq!(choice.mime, "video/mp4");
        assert!(choice.is_natively_deliverable);
        assert_eq!(choice.container(), ExportFormat::Mp4);
    }

    #[test]
    fn test_nothing_supported_returns_fallback() {
        let platform = Supports(vec![]);
        let choice = select_format(&DEFAULT_PREFERENCES, &platform, ExportFormat::Mp4);
        assert_eq!(choice.mime, UNIVERSAL_FALLBACK);
        assert!(!choice.is_natively_deliverable);
    }

    #[test]
    fn test_empty_preferences_returns_fallback() {
        let platform = Supports(vec!["video/mp4"]);
        let empty: [&str; 0] = [];
        let choice = select_format(&empty, &platform, ExportFormat::Webm);
        assert_eq!(choice.mime, UNIVERSAL_FALLBACK);
        assert!(choice.is_natively_deliverable);
    }
}
