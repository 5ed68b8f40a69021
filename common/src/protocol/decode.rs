use crate::protocol::host::HostRecord;
use log::debug;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Turns one inbound payload into a batch of host records.
///
/// Unparseable text is an error. Elements that do not look like a host are
/// dropped one by one so a single bad entry never discards the batch. A lone
/// object is a batch of one; any other JSON value is an empty batch.
pub fn decode_batch(payload: &str) -> Result<Vec<HostRecord>, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;

    let elements = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            debug!("payload carries no host elements: {other}");
            return Ok(Vec::new());
        }
    };

    let mut batch = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<HostRecord>(element) {
            Ok(record) => batch.push(record),
            Err(err) => debug!("dropping malformed host element: {err}"),
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::host::HostStatus;

    #[test]
    fn decodes_full_batch() {
        let batch = decode_batch(
            r#"[
                {"ip":"10.0.0.1","status":"online","rtt":12,"delivered":99.5,"loss":0.5,"last_ping":"2024-01-01T00:00:00Z"},
                {"ip":"10.0.0.2","status":"offline","rtt":null,"delivered":0,"loss":100,"last_ping":"00:00:00"}
            ]"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].address, "10.0.0.1");
        assert_eq!(batch[0].round_trip_ms, Some(12.0));
        assert_eq!(batch[1].status, HostStatus::Offline);
        assert_eq!(batch[1].last_checked_at, None);
    }

    #[test]
    fn drops_malformed_elements_individually() {
        let batch = decode_batch(
            r#"[
                {"ip":"10.0.0.1","status":"online"},
                {"status":"online"},
                {"ip":""},
                {"ip":42},
                "10.0.0.9",
                {"ip":"10.0.0.2","rtt":"fast"},
                {"ip":"10.0.0.3"}
            ]"#,
        )
        .unwrap();

        let addresses: Vec<_> = batch.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.3"]);
    }

    #[test]
    fn odd_last_ping_shapes_keep_the_host() {
        let batch = decode_batch(
            r#"[
                {"ip":"10.0.0.1","status":"online","last_ping":true},
                {"ip":"10.0.0.2","status":"online","last_ping":"garbage"},
                {"ip":"10.0.0.3","status":"online","last_ping":{"at":1}},
                {"ip":"10.0.0.4","status":"online","last_ping":[]},
                {"ip":"10.0.0.5","status":"online","last_ping":null}
            ]"#,
        )
        .unwrap();

        let addresses: Vec<_> = batch.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]
        );
        assert!(batch.iter().all(|r| r.last_checked_at.is_none()));
        assert!(batch.iter().all(|r| r.status == HostStatus::Online));
    }

    #[test]
    fn zero_valid_elements_is_an_empty_batch() {
        assert!(decode_batch("[]").unwrap().is_empty());
        assert!(decode_batch(r#"[{"nope":1}]"#).unwrap().is_empty());
        assert!(decode_batch("null").unwrap().is_empty());
        assert!(decode_batch("17").unwrap().is_empty());
    }

    #[test]
    fn single_object_is_a_batch_of_one() {
        let batch = decode_batch(r#"{"ip":"10.0.0.8","status":"error"}"#).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].status, HostStatus::Error);
    }

    #[test]
    fn unparseable_payload_is_an_error() {
        assert!(matches!(
            decode_batch("[{\"ip\": "),
            Err(DecodeError::Malformed(_))
        ));
        assert!(decode_batch("refresh").is_err());
    }
}
