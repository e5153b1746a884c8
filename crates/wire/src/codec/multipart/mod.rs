//! `multipart/*` bodies: a streaming decoder for incoming parts and a form encoder for uploads.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_wire::codec::multipart::{boundary_from_content_type, MultipartDecoder, MultipartItem};
//! use tokio_util::codec::Decoder;
//!
//! let boundary = boundary_from_content_type("multipart/form-data; boundary=xyz").unwrap();
//! let mut decoder = MultipartDecoder::new(&boundary);
//! let mut body = BytesMut::from("--xyz\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--xyz--\r\n");
//!
//! assert!(matches!(decoder.decode(&mut body).unwrap(), Some(MultipartItem::PartBegin(_))));
//! ```

mod decoder;
mod form;

pub use decoder::{MultipartDecoder, MultipartItem, PartHeader, PartSink};
pub use form::MultipartForm;

/// Extracts the `boundary` parameter of a `multipart/*` content type, quoted or not.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mime: mime::Mime = content_type.parse().ok()?;
    if mime.type_() != mime::MULTIPART {
        return None;
    }
    let boundary = mime.get_param(mime::BOUNDARY)?.as_str();
    // RFC 2046 caps boundaries at 70 characters
    if boundary.is_empty() || boundary.len() > 70 {
        return None;
    }
    Some(boundary.to_owned())
}

/// A fresh boundary: `----0x` followed by 24 random hex characters.
pub fn generate_boundary() -> String {
    format!("----0x{:024x}", fastrand::u128(..) >> 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_parameter() {
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary=abc").as_deref(), Some("abc"));
        assert_eq!(
            boundary_from_content_type("multipart/byteranges; boundary=\"a b:c\"").as_deref(),
            Some("a b:c")
        );
        assert_eq!(boundary_from_content_type("text/plain; boundary=abc"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
    }

    #[test]
    fn generated_boundary_shape() {
        let boundary = generate_boundary();
        assert_eq!(boundary.len(), 30);
        assert!(boundary.starts_with("----0x"));
        assert!(boundary[6..].bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(boundary, generate_boundary());
    }
}
