//! The record validation and transform stage.
//!
//! Each delivery micro-batch is processed record by record, in order. A
//! record's payload is base64-decoded, parsed as JSON, checked against the
//! [`RecordSchema`], and re-emitted as exactly one JSON line. Schema
//! violations only ever mark the record `Failed`; what happens on an
//! undecodable payload is governed by [`DecodeFailurePolicy`].

use super::schema::RecordSchema;
use super::wire::{DeliveryBatch, DeliveryRecord, TransformedBatch, TransformedRecord, ValidationOutcome};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use tracing::{debug, info, warn};
use wa_common::{Error, Result};
use wa_config::{DecodeFailurePolicy, ValidatorConfig};

/// Validation stage bound to a schema and a config for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationStage<'a> {
    schema: &'a RecordSchema,
    config: ValidatorConfig,
}

impl<'a> ValidationStage<'a> {
    pub fn new(schema: &'a RecordSchema, config: ValidatorConfig) -> Self {
        Self { schema, config }
    }

    /// Transform a batch. The output has one record per input record, in
    /// input order.
    ///
    /// # Errors
    ///
    /// With [`DecodeFailurePolicy::AbortBatch`], the first payload that is
    /// not base64 or not JSON fails the whole batch.
    pub fn process(&self, batch: &DeliveryBatch) -> Result<TransformedBatch> {
        debug!(
            invocation_id = batch.invocation_id.as_deref().unwrap_or("-"),
            delivery_stream = batch.delivery_stream_arn.as_deref().unwrap_or("-"),
            region = batch.region.as_deref().unwrap_or("-"),
            records = batch.records.len(),
            "received batch"
        );

        let records = batch
            .records
            .iter()
            .map(|record| self.process_record(record))
            .collect::<Result<Vec<_>>>()?;
        let output = TransformedBatch { records };

        let summary = output.summary();
        info!(
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            "batch validated"
        );
        Ok(output)
    }

    fn process_record(&self, record: &DeliveryRecord) -> Result<TransformedRecord> {
        let payload = match decode_payload(&record.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = Error::UndecodablePayload {
                    record_id: record.record_id.to_string(),
                    reason: e.to_string(),
                };
                return self.on_decode_failure(record, err, None);
            }
        };

        let value: Value = match serde_json::from_slice(&payload) {
            Ok(value) => value,
            Err(e) => {
                let err = Error::UnparsablePayload {
                    record_id: record.record_id.to_string(),
                    reason: e.to_string(),
                };
                return self.on_decode_failure(record, err, Some(&payload));
            }
        };

        let violations = self.schema.check(&value);
        let result = if violations.is_empty() {
            ValidationOutcome::Accepted
        } else {
            for violation in &violations {
                debug!(record_id = %record.record_id, %violation, "schema violation");
            }
            ValidationOutcome::Failed
        };
        debug!(record_id = %record.record_id, ?result, "record validated");

        Ok(TransformedRecord {
            record_id: record.record_id.clone(),
            result,
            data: BASE64.encode(reframe_json_line(&payload)),
        })
    }

    fn on_decode_failure(
        &self,
        record: &DeliveryRecord,
        err: Error,
        decoded: Option<&[u8]>,
    ) -> Result<TransformedRecord> {
        match self.config.decode_failure {
            DecodeFailurePolicy::AbortBatch => Err(err),
            DecodeFailurePolicy::IsolateRecord => {
                warn!(record_id = %record.record_id, error = %err, "isolating undecodable record");
                let data = match decoded {
                    Some(bytes) => BASE64.encode(reframe_json_line(bytes)),
                    None => record.data.clone(),
                };
                Ok(TransformedRecord {
                    record_id: record.record_id.clone(),
                    result: ValidationOutcome::Failed,
                    data,
                })
            }
        }
    }
}

/// Decode a record's base64 data, ignoring ASCII whitespace such as MIME
/// line wrapping.
fn decode_payload(data: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    if !data.bytes().any(|b| b.is_ascii_whitespace()) {
        return BASE64.decode(data);
    }
    let compact: Vec<u8> = data
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(compact)
}

/// Strip every trailing `\n` and append exactly one, so each record lands as
/// a single line in newline-delimited output.
pub fn reframe_json_line(payload: &[u8]) -> Vec<u8> {
    let end = payload
        .iter()
        .rposition(|&b| b != b'\n')
        .map_or(0, |i| i + 1);
    let mut framed = Vec::with_capacity(end + 1);
    framed.extend_from_slice(&payload[..end]);
    framed.push(b'\n');
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_common::RecordId;

    fn record(id: &str, payload: &[u8]) -> DeliveryRecord {
        DeliveryRecord {
            record_id: RecordId::from(id),
            approximate_arrival_timestamp: Some(1495072949453),
            data: BASE64.encode(payload),
        }
    }

    fn batch(records: Vec<DeliveryRecord>) -> DeliveryBatch {
        DeliveryBatch {
            invocation_id: Some("invocationIdExample".into()),
            delivery_stream_arn: None,
            region: None,
            records,
        }
    }

    const VALID: &[u8] = br#"{"userId":"u","sessionId":"s","ip":"1.2.3.4","hostname":"h","timestamp":"2022-09-16T07:35:46Z","uri":"/"}"#;

    #[test]
    fn test_reframe_appends_single_newline() {
        assert_eq!(reframe_json_line(b"{}"), b"{}\n");
        assert_eq!(reframe_json_line(b"{}\n"), b"{}\n");
        assert_eq!(reframe_json_line(b"{}\n\n\n"), b"{}\n");
        assert_eq!(reframe_json_line(b""), b"\n");
        assert_eq!(reframe_json_line(b"\n\n"), b"\n");
    }

    #[test]
    fn test_reframe_keeps_inner_newlines() {
        assert_eq!(reframe_json_line(b"{\n}\r\n"), b"{\n}\r\n");
    }

    #[test]
    fn test_accepted_record_is_reframed() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let out = stage.process(&batch(vec![record("a", VALID)])).unwrap();

        assert_eq!(out.records[0].record_id, RecordId::from("a"));
        assert_eq!(out.records[0].result, ValidationOutcome::Accepted);
        let data = BASE64.decode(&out.records[0].data).unwrap();
        assert_eq!(data.last(), Some(&b'\n'));
        assert_eq!(&data[..data.len() - 1], VALID);
    }

    #[test]
    fn test_line_wrapped_base64_is_accepted() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let encoded = BASE64.encode(VALID);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        let mut rec = record("a", VALID);
        rec.data = format!(" {wrapped}\n");

        let out = stage.process(&batch(vec![rec])).unwrap();
        assert_eq!(out.records[0].result, ValidationOutcome::Accepted);
        assert_eq!(BASE64.decode(&out.records[0].data).unwrap(), [VALID, b"\n".as_slice()].concat());
    }

    #[test]
    fn test_invalid_record_is_failed_not_dropped() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let out = stage
            .process(&batch(vec![record("a", br#"{"userId":"u"}"#)]))
            .unwrap();
        assert_eq!(out.records[0].result, ValidationOutcome::Failed);
    }

    #[test]
    fn test_unparsable_payload_aborts_batch_by_default() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let err = stage
            .process(&batch(vec![record("a", VALID), record("b", b"not json")]))
            .unwrap_err();
        assert!(matches!(err, Error::UnparsablePayload { ref record_id, .. } if record_id == "b"));
    }

    #[test]
    fn test_bad_base64_aborts_batch_by_default() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let mut bad = record("a", VALID);
        bad.data = "***".into();
        assert!(matches!(
            stage.process(&batch(vec![bad])),
            Err(Error::UndecodablePayload { .. })
        ));
    }

    #[test]
    fn test_isolate_policy_keeps_rest_of_batch() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::isolating());
        let mut bad_b64 = record("c", VALID);
        bad_b64.data = "***".into();

        let out = stage
            .process(&batch(vec![
                record("a", VALID),
                record("b", b"not json\n\n"),
                bad_b64,
            ]))
            .unwrap();

        assert_eq!(
            out.outcomes(),
            vec![
                ValidationOutcome::Accepted,
                ValidationOutcome::Failed,
                ValidationOutcome::Failed
            ]
        );
        assert_eq!(BASE64.decode(&out.records[1].data).unwrap(), b"not json\n");
        assert_eq!(out.records[2].data, "***");
        assert_eq!(out.summary().invalid, 2);
    }

    #[test]
    fn test_empty_batch() {
        let schema = RecordSchema::web_logs();
        let stage = ValidationStage::new(&schema, ValidatorConfig::default());
        let out = stage.process(&batch(vec![])).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.summary().total, 0);
    }
}
