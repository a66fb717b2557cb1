//! Local record validation, run before any I/O.

use crate::error::{DeliveryError, ErrorCode, XaseResult};
use crate::types::Record;

/// Check the required fields and the confidence range.
pub fn validate_record(record: &Record) -> XaseResult<()> {
    if record.policy.trim().is_empty() {
        return Err(DeliveryError::new(ErrorCode::MissingPolicy, "Policy is required"));
    }

    if record.input.is_empty() {
        return Err(DeliveryError::new(
            ErrorCode::InvalidInput,
            "Input must be a non-empty object",
        ));
    }

    if record.output.is_empty() {
        return Err(DeliveryError::new(
            ErrorCode::InvalidOutput,
            "Output must be a non-empty object",
        ));
    }

    if let Some(confidence) = record.confidence {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(DeliveryError::new(
                ErrorCode::InvalidConfidence,
                "Confidence must be a number between 0 and 1",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JsonMap;
    use serde_json::json;

    fn map(key: &str, value: serde_json::Value) -> JsonMap {
        let mut m = JsonMap::new();
        m.insert(key.to_string(), value);
        m
    }

    fn valid() -> Record {
        Record::new(
            "credit_policy_v4",
            map("amount", json!(50000)),
            map("decision", json!("APPROVED")),
        )
    }

    #[test]
    fn accepts_valid_record() {
        assert!(validate_record(&valid()).is_ok());
        assert!(validate_record(&valid().with_confidence(0.0)).is_ok());
        assert!(validate_record(&valid().with_confidence(1.0)).is_ok());
    }

    #[test]
    fn rejects_blank_policy() {
        let mut record = valid();
        record.policy = "  ".to_string();
        let err = validate_record(&record).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingPolicy);
    }

    #[test]
    fn rejects_empty_input_and_output() {
        let mut record = valid();
        record.input.clear();
        assert_eq!(validate_record(&record).unwrap_err().code, ErrorCode::InvalidInput);

        let mut record = valid();
        record.output.clear();
        assert_eq!(validate_record(&record).unwrap_err().code, ErrorCode::InvalidOutput);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            let err = validate_record(&valid().with_confidence(bad)).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidConfidence, "confidence {bad}");
        }
    }
}
