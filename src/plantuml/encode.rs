// laneforge — PlantUML payload encodings and diagram URLs
//
// Two encodings are supported:
//   - percent: the markup percent-encoded as a path segment
//   - deflate: raw DEFLATE (zlib without its 2-byte header and 4-byte
//     Adler-32 trailer), base64, then remapped onto PlantUML's alphabet
//     `0-9A-Za-z-_`. The server rejects anything that is not bit-exact.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;
use thiserror::Error;

/// Bytes escaped by the percent encoding: everything but `A-Za-z0-9_.-~/`.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

const ZLIB_HEADER_LEN: usize = 2;
const ZLIB_TRAILER_LEN: usize = 4;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PLANTUML_ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("invalid character {0:?} in encoded diagram")]
    InvalidCharacter(char),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded diagram is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("percent-decoded diagram is not UTF-8: {0}")]
    PercentUtf8(#[from] std::str::Utf8Error),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Percent,
    #[default]
    Deflate,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percent" => Ok(Encoding::Percent),
            "deflate" => Ok(Encoding::Deflate),
            other => Err(format!("unknown encoding '{}' (expected percent or deflate)", other)),
        }
    }
}

/// Output format requested from the rendering server.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    #[default]
    Svg,
    Png,
    Txt,
}

impl DiagramFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramFormat::Svg => "svg",
            DiagramFormat::Png => "png",
            DiagramFormat::Txt => "txt",
        }
    }
}

/// Encode markup as a URL path segment.
pub fn encode(text: &str, encoding: Encoding) -> Result<String, EncodeError> {
    match encoding {
        Encoding::Percent => Ok(utf8_percent_encode(text, PATH_ENCODE_SET).to_string()),
        Encoding::Deflate => encode_deflate(text),
    }
}

/// Inverse of [`encode`].
pub fn decode(segment: &str, encoding: Encoding) -> Result<String, EncodeError> {
    match encoding {
        Encoding::Percent => Ok(percent_decode_str(segment).decode_utf8()?.into_owned()),
        Encoding::Deflate => decode_deflate(segment),
    }
}

fn encode_deflate(text: &str) -> Result<String, EncodeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(EncodeError::Compress)?;
    let zlib = encoder.finish().map_err(EncodeError::Compress)?;

    let deflate = &zlib[ZLIB_HEADER_LEN..zlib.len() - ZLIB_TRAILER_LEN];
    let b64 = STANDARD.encode(deflate);

    Ok(b64.bytes().map(|b| translate(b, BASE64_ALPHABET, PLANTUML_ALPHABET)).collect())
}

fn decode_deflate(segment: &str) -> Result<String, EncodeError> {
    let mut b64 = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == '=' {
            b64.push(c);
            continue;
        }
        let b = u8::try_from(c).map_err(|_| EncodeError::InvalidCharacter(c))?;
        if !PLANTUML_ALPHABET.contains(&b) {
            return Err(EncodeError::InvalidCharacter(c));
        }
        b64.push(translate(b, PLANTUML_ALPHABET, BASE64_ALPHABET));
    }

    let deflate = STANDARD.decode(b64)?;
    let mut decoded = Vec::new();
    DeflateDecoder::new(deflate.as_slice())
        .read_to_end(&mut decoded)
        .map_err(EncodeError::Decompress)?;
    Ok(String::from_utf8(decoded)?)
}

/// Map `b` from one alphabet onto the same position in another.
/// Bytes outside `from` (base64 padding) pass through.
fn translate(b: u8, from: &[u8; 64], to: &[u8; 64]) -> char {
    match from.iter().position(|&c| c == b) {
        Some(i) => to[i] as char,
        None => b as char,
    }
}

/// Full diagram URL: `{server}/{format}/{segment}`.
pub fn diagram_url(server: &str, format: DiagramFormat, segment: &str) -> String {
    format!("{}/{}/{}", server.trim_end_matches('/'), format.as_str(), segment)
}
