use serde::de::DeserializeOwned;

use crate::{ManapoolError, ValidationError};

/// Decodes a successful response body into `T`.
///
/// A body that does not match the expected shape is a [`ValidationError`]
/// on the `response` field, never a panic.
pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ManapoolError> {
    serde_json::from_slice(body).map_err(|err| {
        let snippet = String::from_utf8_lossy(&body[..body.len().min(256)]);
        ValidationError::new(
            "response",
            format!("invalid response JSON: {err}; body: {snippet}"),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use crate::{decode::decode_json, ManapoolError};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        id: String,
    }

    #[test]
    fn decodes_matching_body() {
        let probe: Probe = decode_json(br#"{"id":"abc"}"#).expect("must decode");
        assert_eq!(probe.id, "abc");
    }

    #[test]
    fn invalid_json_is_validation_error() {
        let err = decode_json::<Probe>(b"{invalid json}").expect_err("must fail");
        match err {
            ManapoolError::Validation(err) => {
                assert_eq!(err.field, "response");
                assert!(err.message.contains("{invalid json}"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_validation_error() {
        let err = decode_json::<Probe>(br#"{"id": 5}"#).expect_err("must fail");
        assert!(matches!(err, ManapoolError::Validation(_)));
    }

    #[test]
    fn empty_body_is_validation_error() {
        let err = decode_json::<Probe>(b"").expect_err("must fail");
        assert!(matches!(err, ManapoolError::Validation(_)));
    }
}
