use base64::Engine;

/// Decodes a base64 string carrying raw PCM16 bytes.
///
/// Malformed input yields an empty vector (logged); a bad payload is dropped
/// by the caller, never surfaced to the client.
pub fn decode_base64_pcm(fragment: &str) -> Vec<u8> {
    match base64::engine::general_purpose::STANDARD.decode(fragment) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Failed to decode base64 audio payload.");
            Vec::new()
        }
    }
}

/// Encodes raw PCM16 bytes as a base64 string for JSON envelopes.
pub fn encode_base64_pcm(pcm: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(pcm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let pcm: Vec<u8> = vec![0x00, 0x40, 0x00, 0x80, 0x7f, 0xff];
        let encoded = encode_base64_pcm(&pcm);
        assert_eq!(decode_base64_pcm(&encoded), pcm);
    }

    #[test]
    fn test_invalid_base64_decodes_to_empty() {
        assert!(decode_base64_pcm("not base64!!").is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(encode_base64_pcm(&[]), "");
        assert!(decode_base64_pcm("").is_empty());
    }
}
