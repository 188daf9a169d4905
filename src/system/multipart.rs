//! multipart/related upload bodies
//!
//! Some store endpoints accept metadata and content in one request. The body
//! is assembled by hand so the byte layout is exactly:
//!
//! ```text
//! \r\n--B\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}
//! \r\n--B\r\nContent-Type: {mime}\r\n\r\n{content}
//! \r\n--B--
//! ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_BOUNDARY: &str = "-------314159265358979323846";
const METADATA_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Metadata part of a file upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPayload {
    body: Vec<u8>,
    boundary: String,
}

/// Borrowed view of the two sections of a payload
#[derive(Debug, PartialEq, Eq)]
pub struct MultipartParts<'a> {
    pub metadata_json: &'a [u8],
    pub content_type: &'a str,
    pub content: &'a [u8],
}

impl MultipartPayload {
    pub fn build<M: Serialize>(
        metadata: &M,
        content: &[u8],
        content_type: &str,
    ) -> Result<Self, serde_json::Error> {
        Self::with_boundary(metadata, content, content_type, DEFAULT_BOUNDARY)
    }

    pub fn with_boundary<M: Serialize>(
        metadata: &M,
        content: &[u8],
        content_type: &str,
        boundary: &str,
    ) -> Result<Self, serde_json::Error> {
        let metadata_json = serde_json::to_vec(metadata)?;
        let delimiter = format!("\r\n--{}\r\n", boundary);
        let close_delimiter = format!("\r\n--{}--", boundary);
        let metadata_header = format!("{}Content-Type: {}\r\n\r\n", delimiter, METADATA_CONTENT_TYPE);
        let content_header = format!("{}Content-Type: {}\r\n\r\n", delimiter, content_type);

        let mut body = Vec::with_capacity(
            metadata_header.len()
                + metadata_json.len()
                + content_header.len()
                + content.len()
                + close_delimiter.len(),
        );
        body.extend_from_slice(metadata_header.as_bytes());
        body.extend_from_slice(&metadata_json);
        body.extend_from_slice(content_header.as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(close_delimiter.as_bytes());

        Ok(Self {
            body,
            boundary: boundary.to_string(),
        })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header
    pub fn content_type_header(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    pub fn into_parts(self) -> (Vec<u8>, String) {
        (self.body, self.boundary)
    }

    /// Parse the body back into its sections; `None` if it is not in the layout `build` produces
    pub fn split(&self) -> Option<MultipartParts<'_>> {
        let delimiter = format!("\r\n--{}\r\n", self.boundary);
        let close_delimiter = format!("\r\n--{}--", self.boundary);
        let body = self.body.as_slice();

        let rest = body.strip_prefix(delimiter.as_bytes())?;
        let rest = rest.strip_suffix(close_delimiter.as_bytes())?;

        let (_, rest) = split_at_pattern(rest, b"\r\n\r\n")?;
        let (metadata_json, rest) = split_at_pattern(rest, delimiter.as_bytes())?;
        let (content_headers, content) = split_at_pattern(rest, b"\r\n\r\n")?;

        let headers = std::str::from_utf8(content_headers).ok()?;
        let content_type = headers
            .split("\r\n")
            .find_map(|line| line.strip_prefix("Content-Type: "))?;

        Some(MultipartParts {
            metadata_json,
            content_type,
            content,
        })
    }

    pub fn metadata<M: for<'de> Deserialize<'de>>(&self) -> Option<M> {
        let parts = self.split()?;
        serde_json::from_slice(parts.metadata_json).ok()
    }
}

fn split_at_pattern<'a>(haystack: &'a [u8], pattern: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
    let pos = haystack
        .windows(pattern.len())
        .position(|window| window == pattern)?;
    Some((&haystack[..pos], &haystack[pos + pattern.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> FileMetadata {
        FileMetadata {
            name: "a.txt".to_string(),
            parents: vec!["folder-1".to_string()],
            mime_type: None,
        }
    }

    #[test]
    fn test_build_exact_layout() {
        let payload = MultipartPayload::with_boundary(&metadata(), b"hello", "text/plain", "XYZ")
            .expect("build payload");
        let expected = concat!(
            "\r\n--XYZ\r\n",
            "Content-Type: application/json; charset=UTF-8\r\n\r\n",
            "{\"name\":\"a.txt\",\"parents\":[\"folder-1\"]}",
            "\r\n--XYZ\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "hello",
            "\r\n--XYZ--"
        );
        assert_eq!(payload.body(), expected.as_bytes());
        assert_eq!(payload.boundary(), "XYZ");
        assert_eq!(
            payload.content_type_header(),
            "multipart/related; boundary=XYZ"
        );
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = FileMetadata {
            name: "out.zip".to_string(),
            parents: Vec::new(),
            mime_type: Some("application/zip".to_string()),
        };
        let json = serde_json::to_string(&meta).expect("serialize");
        assert_eq!(json, "{\"name\":\"out.zip\",\"mimeType\":\"application/zip\"}");
    }

    #[test]
    fn test_split_recovers_binary_content() {
        let content: Vec<u8> = (0u8..=255).chain(b"\r\n\r\n--x".iter().copied()).collect();
        let payload = MultipartPayload::build(&metadata(), &content, "application/octet-stream")
            .expect("build payload");

        let parts = payload.split().expect("split payload");
        assert_eq!(parts.content, content.as_slice());
        assert_eq!(parts.content_type, "application/octet-stream");
        let parsed: FileMetadata = payload.metadata().expect("parse metadata");
        assert_eq!(parsed, metadata());
    }

    #[test]
    fn test_split_empty_content() {
        let payload =
            MultipartPayload::build(&metadata(), b"", "text/plain").expect("build payload");
        let parts = payload.split().expect("split payload");
        assert!(parts.content.is_empty());

        let (body, boundary) = payload.into_parts();
        assert_eq!(boundary, DEFAULT_BOUNDARY);
        assert!(body.ends_with(format!("\r\n--{}--", DEFAULT_BOUNDARY).as_bytes()));
    }
}
