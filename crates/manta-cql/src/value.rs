//! Value currency and ordering.
//!
//! Bound values travel as `serde_json::Value`. A driver adapter converts them
//! to native protocol types using the column's declared CQL type; the
//! in-memory session uses [`value_cmp`] to reproduce clustering order.

use std::cmp::Ordering;

/// The bound-value currency used throughout manta.
pub type Value = serde_json::Value;

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// A deterministic total order over values: null < bool < number < string <
/// array < object, with same-type values compared naturally. Numbers compare
/// through `f64`, which is adequate for key ordering.
pub fn value_cmp(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xa, ya) in x.iter().zip(y.iter()) {
                let ord = value_cmp(xa, ya);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let xs: Vec<_> = x.iter().collect();
            let ys: Vec<_> = y.iter().collect();
            for ((xk, xv), (yk, yv)) in xs.iter().zip(ys.iter()) {
                let ord = xk.cmp(yk).then_with(|| value_cmp(xv, yv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => Ordering::Equal,
    }
}

/// Compares ordered value lists (e.g. primary keys) element-wise.
pub fn values_cmp(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = value_cmp(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ordering_across_types() {
        assert_eq!(value_cmp(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(value_cmp(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(value_cmp(&json!(99), &json!("a")), Ordering::Less);
    }

    #[test]
    fn test_ordering_within_types() {
        assert_eq!(value_cmp(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(value_cmp(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(value_cmp(&json!("APAC"), &json!("EMEA")), Ordering::Less);
        assert_eq!(value_cmp(&json!("x"), &json!("x")), Ordering::Equal);
    }

    #[test]
    fn test_key_list_ordering() {
        let a = vec![json!("t1"), json!(5)];
        let b = vec![json!("t1"), json!(10)];
        assert_eq!(values_cmp(&a, &b), Ordering::Less);
        assert_eq!(values_cmp(&a, &a), Ordering::Equal);
    }
}
