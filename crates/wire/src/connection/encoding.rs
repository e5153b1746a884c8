//! Response compression negotiated from `Accept-Encoding`.

use std::io;
use std::io::Write;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use tracing::trace;

/// Represents the supported content encodings.
pub(crate) enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
}

impl Encoder {
    fn gzip() -> Self {
        Self::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
    }

    fn deflate() -> Self {
        Self::Deflate(ZlibEncoder::new(Vec::new(), Compression::default()))
    }

    /// Selects an encoder from an `Accept-Encoding` value, gzip first; `q=0` opts out.
    pub(crate) fn select(accept_encodings: &str) -> Option<Self> {
        let accepts = |name: &str| {
            accept_encodings.split(',').any(|item| {
                let mut params = item.split(';');
                let coding = params.next().unwrap_or("").trim();
                let refused = params.any(|param| {
                    param.trim().strip_prefix("q=").is_some_and(|q| q.trim().parse::<f32>().is_ok_and(|q| q <= 0.0))
                });
                coding.eq_ignore_ascii_case(name) && !refused
            })
        };

        if accepts("gzip") {
            Some(Self::gzip())
        } else if accepts("deflate") {
            Some(Self::deflate())
        } else {
            None
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Encoder::Gzip(_) => "gzip",
            Encoder::Deflate(_) => "deflate",
        }
    }

    /// Compresses all of `data`.
    pub(crate) fn encode(self, data: &[u8]) -> Result<Bytes, io::Error> {
        let name = self.name();
        let encoded = match self {
            Self::Gzip(mut encoder) => {
                encoder.write_all(data)?;
                encoder.finish()?
            }
            Self::Deflate(mut encoder) => {
                encoder.write_all(data)?;
                encoder.finish()?
            }
        };
        trace!(encoding = name, from = data.len(), to = encoded.len(), "compressed response body");
        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use std::io::Read;

    #[test]
    fn select_by_accept_encoding() {
        assert_eq!(Encoder::select("gzip, deflate, br").map(|e| e.name()), Some("gzip"));
        assert_eq!(Encoder::select("br, deflate").map(|e| e.name()), Some("deflate"));
        assert_eq!(Encoder::select("gzip;q=0, deflate;q=0.5").map(|e| e.name()), Some("deflate"));
        assert_eq!(Encoder::select("identity").map(|e| e.name()), None);
        assert_eq!(Encoder::select("xgzip").map(|e| e.name()), None);
    }

    #[test]
    fn encoded_bodies_decode_back() {
        let data = "compress me ".repeat(200);

        let gzip = Encoder::gzip().encode(data.as_bytes()).unwrap();
        let mut decoded = String::new();
        GzDecoder::new(&gzip[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, data);
        assert!(gzip.len() < data.len());

        let deflate = Encoder::deflate().encode(data.as_bytes()).unwrap();
        let mut decoded = String::new();
        ZlibDecoder::new(&deflate[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }
}
