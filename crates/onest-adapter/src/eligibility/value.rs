use serde_json::Value;

/// Structural equality where numbers compare by value, so `5` equals `5.0`.
pub(crate) fn structurally_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .map(|y| structurally_equal(x, y))
                        .unwrap_or(false)
                })
        }
        _ => left == right,
    }
}

/// Coerce a JSON value to a finite number.
///
/// Integers, floats, and numeric strings qualify. A string ending in `%` is read as a
/// percentage, so `"50%"` becomes `0.5`. Anything else yields `None`.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) => parse_numeric(raw)?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Some(percent) = trimmed.strip_suffix('%') {
        return strict_float(percent.trim_end()).map(|value| value / 100.0);
    }
    strict_float(trimmed)
}

// Rust accepts "inf"/"nan" spellings; only plain decimal notation counts here.
fn strict_float(raw: &str) -> Option<f64> {
    let plain = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !plain {
        return None;
    }
    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_floats_are_equal_by_value() {
        assert!(structurally_equal(&json!(5), &json!(5.0)));
        assert!(structurally_equal(
            &json!({"min": 1, "tags": [2, 3]}),
            &json!({"tags": [2.0, 3], "min": 1.0})
        ));
        assert!(!structurally_equal(&json!("5"), &json!(5)));
        assert!(!structurally_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn coerces_numeric_strings_and_percentages() {
        assert_eq!(as_number(&json!("42")), Some(42.0));
        assert_eq!(as_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(as_number(&json!("50%")), Some(0.5));
        assert_eq!(as_number(&json!(7)), Some(7.0));
        assert_eq!(as_number(&json!("seven")), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&json!("%")), None);
    }
}
