use bson::Bson;
use std::cmp::Ordering;

pub fn is_number(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

pub fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality where numbers compare by value across representations (`1 == 1.0`) and
/// arrays/documents compare element-wise with the same rule.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_number(a) && is_number(b) {
        return as_f64(a) == as_f64(b);
    }
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same comparable kind (numbers, strings, dates,
/// booleans); `None` for mixed kinds, which never satisfy range operators.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if is_number(a) && is_number(b) {
        return Some(as_f64(a)?.total_cmp(&as_f64(b)?));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
