//! Decoding of remote test payloads into typed results.
//!
//! The test service returns `results` either as an object or as a JSON string
//! holding one. Counts live inside `results` or at the top level of the test
//! object; the completion flag is `completed` or `completedBool`.

use serde_json::{Map, Value};

use crate::core::types::{FetchedTest, ResultSummary, TestResults};
use crate::error::{SessionError, SessionResult};

const COUNT_FIELDS: [&str; 3] = ["total", "correct", "incorrect"];

/// Decode a scorer payload into [`TestResults`].
pub fn summarize_results(payload: &Value) -> SessionResult<TestResults> {
    let object = payload
        .as_object()
        .ok_or_else(|| malformed("result payload is not an object"))?;

    let breakdown = decode_breakdown(object.get("results"))?;
    let completed = read_completed(object)?;

    let mut counts = [0u32; 3];
    for (slot, field) in counts.iter_mut().zip(COUNT_FIELDS) {
        let nested = match breakdown.as_ref().and_then(Value::as_object) {
            Some(results) => read_count(results, field)?,
            None => None,
        };
        let top_level = read_count(object, field)?;
        *slot = nested.or(top_level).unwrap_or(0);
    }
    let [total, correct, incorrect] = counts;

    Ok(TestResults {
        summary: ResultSummary {
            total,
            correct,
            incorrect,
            completed,
        },
        breakdown,
    })
}

/// Decode a fetched test object (`testId`, `referenceRecord`, results fields).
pub fn decode_fetched_test(payload: &Value) -> SessionResult<FetchedTest> {
    let object = payload
        .as_object()
        .ok_or_else(|| malformed("test payload is not an object"))?;

    let test_id = match object.get("testId") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(malformed("test payload is missing testId")),
    };

    let reference_record = match object.get("referenceRecord") {
        Some(Value::Null) | None => {
            return Err(malformed("test payload is missing referenceRecord"));
        }
        Some(record) => record.clone(),
    };

    Ok(FetchedTest {
        test_id,
        reference_record,
        results: summarize_results(payload)?,
    })
}

fn decode_breakdown(raw: Option<&Value>) -> SessionResult<Option<Value>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(None),
        Some(Value::String(encoded)) => {
            let decoded: Value = serde_json::from_str(encoded)
                .map_err(|err| malformed(&format!("results string is not JSON: {err}")))?;
            match decoded {
                Value::Null => Ok(None),
                Value::Object(_) | Value::Array(_) => Ok(Some(decoded)),
                _ => Err(malformed("decoded results is not an object")),
            }
        }
        Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(Some(value.clone())),
        Some(_) => Err(malformed("results is neither an object nor a string")),
    }
}

fn read_completed(object: &Map<String, Value>) -> SessionResult<bool> {
    let flag = object
        .get("completedBool")
        .filter(|value| !value.is_null())
        .or_else(|| object.get("completed").filter(|value| !value.is_null()));
    match flag {
        Some(Value::Bool(done)) => Ok(*done),
        Some(_) => Err(malformed("completion flag is not a boolean")),
        None => Err(malformed("payload is missing the completion flag")),
    }
}

fn read_count(object: &Map<String, Value>, field: &str) -> SessionResult<Option<u32>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|count| u32::try_from(count).ok())
            .map(Some)
            .ok_or_else(|| malformed(&format!("{field} is not a non-negative integer"))),
    }
}

fn malformed(detail: &str) -> SessionError {
    SessionError::MalformedPayload(detail.to_string())
}
