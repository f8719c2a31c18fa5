//! Core types for the pipeline system

use std::collections::BTreeMap;

/// Well-known mime types exchanged between filters
pub mod mime_type {
    /// Format handed to the factory when asking for a data source
    pub const URL: &str = "text/x-url";
    /// Raw bytes produced by a data source
    pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
    pub const AUDIO_UNCOMPRESSED: &str = "audio/x-uncompressed";
    pub const VIDEO_UNCOMPRESSED: &str = "video/x-uncompressed";
}

/// Well-known keys of a [`MediaFormat`]
pub mod format_key {
    pub const URL: &str = "url";
    pub const SAMPLE_RATE: &str = "sample_rate";
    pub const CHANNELS: &str = "channels";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const CODEC: &str = "codec";
}

/// Kind of media data a decoder/renderer pair handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video frame data
    Video,
    /// Audio sample data
    Audio,
}

impl MediaKind {
    /// Major mime type string ("audio" or "video")
    pub fn major_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.major_type())
    }
}

/// A single value stored in a [`MediaFormat`]
#[derive(Debug, Clone, PartialEq)]
pub enum FormatValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Description of the data a filter produces or consumes.
///
/// Always carries a mime type; everything else is an open set of
/// key/value pairs so filters can agree on details the pipeline
/// does not care about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaFormat {
    mime_type: String,
    values: BTreeMap<String, FormatValue>,
}

impl MediaFormat {
    /// Create a new format with the given mime type
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            values: BTreeMap::new(),
        }
    }

    /// Format describing a uri, handed to the factory for the data source role
    pub fn url(uri: &str) -> Self {
        Self::new(mime_type::URL).with_string(format_key::URL, uri)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Part of the mime type before the `/`, e.g. "audio" for "audio/mpeg"
    pub fn major_type(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(major, _)| major)
            .unwrap_or(&self.mime_type)
    }

    /// Check whether this format carries media of the given kind
    pub fn is_kind(&self, kind: MediaKind) -> bool {
        self.major_type() == kind.major_type()
    }

    pub fn with_int(mut self, key: &str, value: i64) -> Self {
        self.values.insert(key.to_string(), FormatValue::Int(value));
        self
    }

    pub fn with_float(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), FormatValue::Float(value));
        self
    }

    pub fn with_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(key.to_string(), FormatValue::Str(value.into()));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(FormatValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(FormatValue::Float(v)) => Some(*v),
            Some(FormatValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FormatValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime_type)?;
        for (key, value) in &self.values {
            match value {
                FormatValue::Int(v) => write!(f, " {}={}", key, v)?,
                FormatValue::Float(v) => write!(f, " {}={}", key, v)?,
                FormatValue::Str(v) => write!(f, " {}={:?}", key, v)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_type() {
        assert_eq!(MediaFormat::new("audio/mpeg").major_type(), "audio");
        assert_eq!(MediaFormat::new("video").major_type(), "video");
        assert!(MediaFormat::new("video/x-uncompressed").is_kind(MediaKind::Video));
        assert!(!MediaFormat::new("video/x-uncompressed").is_kind(MediaKind::Audio));
    }

    #[test]
    fn test_values() {
        let format = MediaFormat::new(mime_type::VIDEO_UNCOMPRESSED)
            .with_int(format_key::WIDTH, 640)
            .with_float("fps", 29.97)
            .with_string(format_key::CODEC, "h264");

        assert_eq!(format.get_int(format_key::WIDTH), Some(640));
        assert_eq!(format.get_float(format_key::WIDTH), Some(640.0));
        assert_eq!(format.get_string(format_key::CODEC), Some("h264"));
        assert_eq!(format.get_int(format_key::CODEC), None);
        assert!(!format.contains(format_key::HEIGHT));
    }

    #[test]
    fn test_url_format() {
        let format = MediaFormat::url("fake://clip");
        assert_eq!(format.mime_type(), mime_type::URL);
        assert_eq!(format.get_string(format_key::URL), Some("fake://clip"));
    }
}
