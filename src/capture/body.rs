//! Request body decoding

use base64::{engine::general_purpose, Engine as _};

use crate::models::RequestBodyPayload;

/// Decode the raw body chunks into UTF-8 text.
///
/// Chunks are concatenated in order. Any chunk that is not valid base64, or a
/// result that is not valid UTF-8, yields `None`; an empty body also yields
/// `None`.
pub fn decode_body(payload: Option<&RequestBodyPayload>) -> Option<String> {
    let payload = payload?;
    let mut bytes = Vec::new();
    for part in &payload.raw {
        let Some(encoded) = part.bytes.as_deref() else {
            continue;
        };
        match general_purpose::STANDARD.decode(encoded) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(err) => {
                tracing::debug!("Discarding request body with invalid base64: {err}");
                return None;
            }
        }
    }
    if bytes.is_empty() {
        return None;
    }
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::debug!("Discarding non UTF-8 request body: {err}");
            None
        }
    }
}

/// Encode text the way the extension ships raw body bytes
pub fn encode_body(text: &str) -> RequestBodyPayload {
    RequestBodyPayload {
        raw: vec![crate::models::RawBodyPart {
            bytes: Some(general_purpose::STANDARD.encode(text.as_bytes())),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawBodyPart;

    fn payload(parts: &[Option<&str>]) -> RequestBodyPayload {
        RequestBodyPayload {
            raw: parts
                .iter()
                .map(|p| RawBodyPart {
                    bytes: p.map(str::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn decodes_single_chunk() {
        let body = encode_body("{\"a\":1}");
        assert_eq!(decode_body(Some(&body)).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn concatenates_chunks_in_order() {
        let body = payload(&[Some("aGVsbG8g"), None, Some("d29ybGQ=")]);
        assert_eq!(decode_body(Some(&body)).as_deref(), Some("hello world"));
    }

    #[test]
    fn invalid_input_leaves_body_absent() {
        assert_eq!(decode_body(None), None);
        assert_eq!(decode_body(Some(&payload(&[Some("%%%")]))), None);
        // 0xff 0xfe is not UTF-8
        assert_eq!(decode_body(Some(&payload(&[Some("//4=")]))), None);
        assert_eq!(decode_body(Some(&payload(&[]))), None);
    }
}
