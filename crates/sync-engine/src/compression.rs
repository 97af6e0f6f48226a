//! Optional gzip encoding of response bodies

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// A response body ready to send, with the `Content-Encoding` it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub body: Vec<u8>,
    pub content_encoding: Option<&'static str>,
}

/// Returns true if an `Accept-Encoding` header value allows gzip
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|part| {
        let mut pieces = part.split(';');
        let coding = pieces.next().unwrap_or("").trim();
        let refused = pieces.any(|p| {
            p.trim()
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q == 0.0)
        });

        (coding.eq_ignore_ascii_case("gzip") || coding == "*") && !refused
    })
}

/// Gzips `body` at maximum compression when the client accepts it
pub fn encode_body(body: Vec<u8>, accept_encoding: Option<&str>) -> io::Result<EncodedBody> {
    if !accept_encoding.is_some_and(accepts_gzip) {
        return Ok(EncodedBody {
            body,
            content_encoding: None,
        });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&body)?;

    Ok(EncodedBody {
        body: encoder.finish()?,
        content_encoding: Some("gzip"),
    })
}
