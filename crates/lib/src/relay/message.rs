//! Outbound message: ordered text/image segments built from a push request.

use crate::relay::image::resolve_image;
use crate::relay::payload::PushRequest;
use crate::relay::RelayError;
use image::ImageFormat;
use std::fmt;

/// Image content of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSegment {
    /// Remote reference; the transport fetches or forwards it.
    Url(String),
    /// Inline bytes already checked to be an image of `format`.
    Bytes { data: Vec<u8>, format: ImageFormat },
}

impl ImageSegment {
    /// MIME type for inline uploads.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            ImageSegment::Url(_) => None,
            ImageSegment::Bytes { format, .. } => Some(format.to_mime_type()),
        }
    }
}

/// One unit of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Image(ImageSegment),
}

/// Ordered segments of one outbound message. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageChain {
    pub segments: Vec<Segment>,
}

impl MessageChain {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for MessageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match seg {
                Segment::Text(t) => write!(f, "text({} chars)", t.chars().count())?,
                Segment::Image(ImageSegment::Url(u)) => write!(f, "image({})", u)?,
                Segment::Image(ImageSegment::Bytes { data, format }) => {
                    write!(f, "image({:?}, {} bytes)", format, data.len())?
                }
            }
        }
        f.write_str("]")
    }
}

/// Build the message for a request: text first (when non-empty), then the image (when present).
/// An unusable image fails the whole build.
pub fn build_message(request: &PushRequest) -> Result<MessageChain, RelayError> {
    let mut chain = MessageChain::default();
    if let Some(content) = request.content.as_deref().filter(|c| !c.is_empty()) {
        chain.segments.push(Segment::Text(content.to_string()));
    }
    if let Some(image) = request.image.as_deref().filter(|i| !i.is_empty()) {
        log::debug!("message {}: resolving image", request.message_id);
        let segment = resolve_image(image).into_segment()?;
        chain.segments.push(Segment::Image(segment));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::image::tests::png_base64;

    #[test]
    fn text_precedes_image() {
        let req = PushRequest::new("m1")
            .with_image("https://example.com/cat.jpg")
            .with_content("hello");
        let chain = build_message(&req).unwrap();
        assert_eq!(
            chain.segments,
            vec![
                Segment::Text("hello".to_string()),
                Segment::Image(ImageSegment::Url("https://example.com/cat.jpg".to_string())),
            ]
        );
    }

    #[test]
    fn inline_image_segment_carries_format() {
        let req = PushRequest::new("m1").with_image(png_base64());
        let chain = build_message(&req).unwrap();
        assert_eq!(chain.len(), 1);
        match &chain.segments[0] {
            Segment::Image(seg) => assert_eq!(seg.mime_type(), Some("image/png")),
            other => panic!("expected image segment, got {:?}", other),
        }
    }

    #[test]
    fn empty_fields_give_empty_chain() {
        let req = PushRequest::new("m1").with_content("").with_image("");
        assert!(build_message(&req).unwrap().is_empty());
        assert!(build_message(&PushRequest::new("m2")).unwrap().is_empty());
    }

    #[test]
    fn bad_image_fails_build() {
        let req = PushRequest::new("m2").with_content("hi").with_image("not-base64!!");
        let err = build_message(&req).unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn display_summarizes_segments() {
        let chain = MessageChain {
            segments: vec![
                Segment::Text("héllo".to_string()),
                Segment::Image(ImageSegment::Url("http://x/y".to_string())),
            ],
        };
        assert_eq!(chain.to_string(), "[text(5 chars), image(http://x/y)]");
    }
}
