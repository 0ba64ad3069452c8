//! Response body decoding.
//!
//! docs.rs serves rustdoc JSON compressed; which codec is used is read from the
//! `content-encoding` header, with `content-type` as a hint when no encoding is
//! declared and a gzip magic-byte sniff as the last resort.

use std::borrow::Cow;
use std::fmt;
use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::error::DocsError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Buffer size handed to the brotli decoder
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Wire-level content encoding of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
    Zstd,
    Unknown(String),
}

impl Encoding {
    /// Parse a single `content-encoding` token
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Encoding::Identity,
            "gzip" | "x-gzip" => Encoding::Gzip,
            "deflate" => Encoding::Deflate,
            "br" => Encoding::Brotli,
            "zstd" => Encoding::Zstd,
            other => Encoding::Unknown(other.to_string()),
        }
    }

    /// Select the encoding from response headers.
    ///
    /// A declared `content-encoding` always wins over `content-type`.
    pub fn detect(content_encoding: Option<&str>, content_type: Option<&str>) -> Self {
        if let Some(header) = content_encoding.filter(|h| !h.trim().is_empty()) {
            let codecs: Vec<Encoding> = header
                .split(',')
                .map(Encoding::from_token)
                .filter(|e| *e != Encoding::Identity)
                .collect();
            return match codecs.len() {
                0 => Encoding::Identity,
                1 => codecs.into_iter().next().unwrap_or(Encoding::Identity),
                // stacked encodings are not produced by docs.rs
                _ => Encoding::Unknown(header.trim().to_ascii_lowercase()),
            };
        }

        let Some(content_type) = content_type else {
            return Encoding::Identity;
        };
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if media_type.contains("zstd") {
            Encoding::Zstd
        } else if media_type.contains("gzip") {
            Encoding::Gzip
        } else if media_type.contains("deflate") {
            Encoding::Deflate
        } else {
            Encoding::Identity
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Brotli => "br",
            Encoding::Zstd => "zstd",
            Encoding::Unknown(name) => name,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Encoding::Identity)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `bytes` starts with the gzip magic number
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decode a response body to its raw bytes.
///
/// An identity body that starts with the gzip magic bytes is decoded as gzip.
/// Identity bodies are borrowed as-is; text decoding is left to the JSON
/// parser.
pub fn decompress<'a>(
    bytes: &'a [u8],
    encoding: &Encoding,
    url: &str,
) -> Result<Cow<'a, [u8]>, DocsError> {
    let effective = if encoding.is_identity() && is_gzip(bytes) {
        tracing::debug!("Undeclared gzip body from {}", url);
        Encoding::Gzip
    } else {
        encoding.clone()
    };

    let decoded = match &effective {
        Encoding::Identity => return Ok(Cow::Borrowed(bytes)),
        Encoding::Gzip => read_all(GzDecoder::new(bytes)),
        Encoding::Deflate => inflate(bytes),
        Encoding::Brotli => read_all(brotli::Decompressor::new(bytes, BROTLI_BUFFER_SIZE)),
        Encoding::Zstd => zstd::stream::decode_all(bytes),
        Encoding::Unknown(name) => {
            return Err(DocsError::Decompression {
                url: url.to_string(),
                encoding: name.clone(),
                message: format!("Unsupported content encoding: {name}"),
            });
        }
    }
    .map_err(|e| DocsError::Decompression {
        url: url.to_string(),
        encoding: effective.to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!(
        "Decoded {} bytes of {} into {} bytes",
        bytes.len(),
        effective,
        decoded.len()
    );

    Ok(Cow::Owned(decoded))
}

fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// HTTP `deflate` is zlib-wrapped, but some servers send raw deflate
fn inflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    read_all(ZlibDecoder::new(bytes)).or_else(|_| read_all(DeflateDecoder::new(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use std::io::Write;

    const PAYLOAD: &str = r#"{"root":"0:0","crate_version":"1.0.0","format_version":39,"index":{}}"#;
    const URL: &str = "https://docs.rs/crate/demo/latest/json";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            writer.write_all(data).unwrap();
        }
        out
    }

    #[test]
    fn test_detect_from_content_encoding() {
        assert_eq!(Encoding::detect(Some("gzip"), None), Encoding::Gzip);
        assert_eq!(Encoding::detect(Some("x-gzip"), None), Encoding::Gzip);
        assert_eq!(Encoding::detect(Some("deflate"), None), Encoding::Deflate);
        assert_eq!(Encoding::detect(Some("BR"), None), Encoding::Brotli);
        assert_eq!(Encoding::detect(Some(" zstd "), None), Encoding::Zstd);
        assert_eq!(Encoding::detect(Some("identity"), None), Encoding::Identity);
        assert_eq!(Encoding::detect(None, None), Encoding::Identity);
        assert_eq!(
            Encoding::detect(Some("compress"), None),
            Encoding::Unknown("compress".to_string())
        );
    }

    #[test]
    fn test_detect_from_content_type() {
        assert_eq!(
            Encoding::detect(None, Some("application/zstd")),
            Encoding::Zstd
        );
        assert_eq!(
            Encoding::detect(None, Some("application/x-gzip; charset=binary")),
            Encoding::Gzip
        );
        assert_eq!(
            Encoding::detect(None, Some("application/json")),
            Encoding::Identity
        );
    }

    #[test]
    fn test_content_encoding_takes_precedence() {
        assert_eq!(
            Encoding::detect(Some("br"), Some("application/zstd")),
            Encoding::Brotli
        );
        assert_eq!(
            Encoding::detect(Some("gzip"), Some("application/json")),
            Encoding::Gzip
        );
    }

    #[test]
    fn test_decode_each_codec() {
        let bytes = PAYLOAD.as_bytes();
        let zstd_bytes = zstd::stream::encode_all(bytes, 3).unwrap();
        let cases = [
            (Encoding::Gzip, gzip(bytes)),
            (Encoding::Deflate, zlib(bytes)),
            (Encoding::Brotli, brotli(bytes)),
            (Encoding::Zstd, zstd_bytes),
            (Encoding::Identity, bytes.to_vec()),
        ];

        for (encoding, encoded) in cases {
            let decoded = decompress(&encoded, &encoding, URL)
                .unwrap_or_else(|e| panic!("{encoding} failed: {e}"));
            assert_eq!(&*decoded, PAYLOAD.as_bytes(), "{encoding} did not round-trip");
        }
    }

    #[test]
    fn test_raw_deflate_fallback() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD.as_bytes()).unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(
            &*decompress(&raw, &Encoding::Deflate, URL).unwrap(),
            PAYLOAD.as_bytes()
        );
    }

    #[test]
    fn test_gzip_magic_fallback() {
        let encoded = gzip(PAYLOAD.as_bytes());
        assert!(is_gzip(&encoded));
        assert_eq!(
            &*decompress(&encoded, &Encoding::Identity, URL).unwrap(),
            PAYLOAD.as_bytes()
        );
    }

    #[test]
    fn test_identity_body_is_passed_through() {
        let body = [b'{', 0xff, 0xfe, b'}'];
        let decoded = decompress(&body, &Encoding::Identity, URL).unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(&*decoded, &body[..]);
    }

    #[test]
    fn test_unknown_encoding_fails() {
        let err = decompress(b"abc", &Encoding::Unknown("compress".into()), URL).unwrap_err();
        match err {
            DocsError::Decompression { encoding, url, .. } => {
                assert_eq!(encoding, "compress");
                assert_eq!(url, URL);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_stream_fails() {
        let err = decompress(b"definitely not zstd", &Encoding::Zstd, URL).unwrap_err();
        assert!(matches!(err, DocsError::Decompression { ref encoding, .. } if encoding == "zstd"));
        assert!(err.to_string().starts_with("Failed to decompress zstd response"));
    }
}
