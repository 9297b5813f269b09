#![forbid(unsafe_code)]

//! Sibling order keys.
//!
//! Keys are opaque strings compared bytewise. The store only compares keys and
//! guards uniqueness; callers pick the key. [`key_between`] is the generator
//! callers are expected to use: base-62 fractional indexing where every key is
//! a variable-length integer head (`a0`, `a1`, ... `az`, `b00`, ...) followed by
//! an optional fractional tail that never ends in `0`. Appends and prepends
//! walk the integer head, so keys grow logarithmically in common editing
//! patterns; inserts between neighbours extend the fractional tail.

use std::cmp::Ordering;

const DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: usize = 62;
const INTEGER_ZERO: &str = "a0";
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";
const MAX_ORDER_KEY_LEN: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKeyError {
    Empty,
    TooLong,
    InvalidChar { index: usize },
    InvalidHead,
    TrailingZero,
    OutOfOrder,
    Exhausted,
}

impl OrderKeyError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "orderKey must not be empty".to_string(),
            Self::TooLong => "orderKey is too long".to_string(),
            Self::InvalidChar { index } => format!("orderKey has invalid char at {index}"),
            Self::InvalidHead => "orderKey has an invalid integer head".to_string(),
            Self::TrailingZero => "orderKey fraction must not end with '0'".to_string(),
            Self::OutOfOrder => "lower orderKey must sort before upper orderKey".to_string(),
            Self::Exhausted => "orderKey space exhausted".to_string(),
        }
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Accepts any non-empty printable-ascii key; this is all the store requires.
pub fn validate_order_key(key: &str) -> Result<(), OrderKeyError> {
    if key.is_empty() {
        return Err(OrderKeyError::Empty);
    }
    if key.len() > MAX_ORDER_KEY_LEN {
        return Err(OrderKeyError::TooLong);
    }
    if let Some(index) = key.bytes().position(|b| !(0x21..=0x7e).contains(&b)) {
        return Err(OrderKeyError::InvalidChar { index });
    }
    Ok(())
}

/// Stricter check for keys that were produced by [`key_between`].
pub fn validate_generated_key(key: &str) -> Result<(), OrderKeyError> {
    validate_order_key(key)?;
    if key == SMALLEST_INTEGER {
        return Err(OrderKeyError::InvalidHead);
    }
    let integer = integer_part(key)?;
    for (index, b) in key.bytes().enumerate().skip(1) {
        digit_index(b).map_err(|_| OrderKeyError::InvalidChar { index })?;
    }
    if key[integer.len()..].ends_with('0') {
        return Err(OrderKeyError::TrailingZero);
    }
    Ok(())
}

/// A key strictly between `lower` and `upper`; `None` means open-ended.
pub fn key_between(lower: Option<&str>, upper: Option<&str>) -> Result<String, OrderKeyError> {
    if let Some(a) = lower {
        validate_generated_key(a)?;
    }
    if let Some(b) = upper {
        validate_generated_key(b)?;
    }
    if let (Some(a), Some(b)) = (lower, upper) {
        if compare(a, b) != Ordering::Less {
            return Err(OrderKeyError::OutOfOrder);
        }
    }

    match (lower, upper) {
        (None, None) => Ok(INTEGER_ZERO.to_string()),
        (None, Some(b)) => {
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ib == SMALLEST_INTEGER {
                return Ok(format!("{ib}{}", midpoint("", Some(fb))?));
            }
            if ib.len() < b.len() {
                return Ok(ib.to_string());
            }
            decrement_integer(ib)?.ok_or(OrderKeyError::Exhausted)
        }
        (Some(a), None) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            match increment_integer(ia)? {
                Some(next) => Ok(next),
                None => Ok(format!("{ia}{}", midpoint(fa, None)?)),
            }
        }
        (Some(a), Some(b)) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ia == ib {
                return Ok(format!("{ia}{}", midpoint(fa, Some(fb))?));
            }
            let next = increment_integer(ia)?.ok_or(OrderKeyError::Exhausted)?;
            if compare(&next, b) == Ordering::Less {
                return Ok(next);
            }
            Ok(format!("{ia}{}", midpoint(fa, None)?))
        }
    }
}

/// `count` ascending keys strictly between `lower` and `upper`, spread so that
/// no single key grows much longer than the others.
pub fn n_keys_between(
    lower: Option<&str>,
    upper: Option<&str>,
    count: usize,
) -> Result<Vec<String>, OrderKeyError> {
    match count {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![key_between(lower, upper)?]),
        _ => {}
    }

    if upper.is_none() {
        let mut out = Vec::with_capacity(count);
        let mut current = key_between(lower, None)?;
        for _ in 1..count {
            let next = key_between(Some(&current), None)?;
            out.push(std::mem::replace(&mut current, next));
        }
        out.push(current);
        return Ok(out);
    }

    if lower.is_none() {
        let mut out = Vec::with_capacity(count);
        let mut current = key_between(None, upper)?;
        for _ in 1..count {
            let next = key_between(None, Some(&current))?;
            out.push(std::mem::replace(&mut current, next));
        }
        out.push(current);
        out.reverse();
        return Ok(out);
    }

    let half = count / 2;
    let middle = key_between(lower, upper)?;
    let mut out = n_keys_between(lower, Some(&middle), half)?;
    let right = n_keys_between(Some(&middle), upper, count - half - 1)?;
    out.push(middle);
    out.extend(right);
    Ok(out)
}

fn digit_index(b: u8) -> Result<usize, OrderKeyError> {
    match b {
        b'0'..=b'9' => Ok(usize::from(b - b'0')),
        b'A'..=b'Z' => Ok(usize::from(b - b'A') + 10),
        b'a'..=b'z' => Ok(usize::from(b - b'a') + 36),
        _ => Err(OrderKeyError::InvalidChar { index: 0 }),
    }
}

fn integer_len(head: u8) -> Result<usize, OrderKeyError> {
    match head {
        b'a'..=b'z' => Ok(usize::from(head - b'a') + 2),
        b'A'..=b'Z' => Ok(usize::from(b'Z' - head) + 2),
        _ => Err(OrderKeyError::InvalidHead),
    }
}

fn integer_part(key: &str) -> Result<&str, OrderKeyError> {
    let head = *key.as_bytes().first().ok_or(OrderKeyError::Empty)?;
    let len = integer_len(head)?;
    if len > key.len() {
        return Err(OrderKeyError::InvalidHead);
    }
    Ok(&key[..len])
}

fn increment_integer(integer: &str) -> Result<Option<String>, OrderKeyError> {
    let (head, mut digits) = split_integer(integer)?;
    let mut carry = true;
    for slot in digits.iter_mut().rev() {
        let next = digit_index(*slot)? + 1;
        if next == BASE {
            *slot = b'0';
        } else {
            *slot = DIGITS[next];
            carry = false;
            break;
        }
    }

    if !carry {
        return Ok(Some(join_integer(head, digits)));
    }
    match head {
        b'Z' => Ok(Some(INTEGER_ZERO.to_string())),
        b'z' => Ok(None),
        _ => {
            let head = head + 1;
            if head > b'a' {
                digits.push(b'0');
            } else {
                digits.pop();
            }
            Ok(Some(join_integer(head, digits)))
        }
    }
}

fn decrement_integer(integer: &str) -> Result<Option<String>, OrderKeyError> {
    let (head, mut digits) = split_integer(integer)?;
    let mut borrow = true;
    for slot in digits.iter_mut().rev() {
        let index = digit_index(*slot)?;
        if index == 0 {
            *slot = DIGITS[BASE - 1];
        } else {
            *slot = DIGITS[index - 1];
            borrow = false;
            break;
        }
    }

    if !borrow {
        return Ok(Some(join_integer(head, digits)));
    }
    match head {
        b'a' => Ok(Some(format!("Z{}", DIGITS[BASE - 1] as char))),
        b'A' => Ok(None),
        _ => {
            let head = head - 1;
            if head < b'Z' {
                digits.push(DIGITS[BASE - 1]);
            } else {
                digits.pop();
            }
            Ok(Some(join_integer(head, digits)))
        }
    }
}

fn split_integer(integer: &str) -> Result<(u8, Vec<u8>), OrderKeyError> {
    let bytes = integer.as_bytes();
    let head = *bytes.first().ok_or(OrderKeyError::Empty)?;
    if integer_len(head)? != bytes.len() {
        return Err(OrderKeyError::InvalidHead);
    }
    Ok((head, bytes[1..].to_vec()))
}

fn join_integer(head: u8, digits: Vec<u8>) -> String {
    let mut out = String::with_capacity(digits.len() + 1);
    out.push(head as char);
    out.extend(digits.into_iter().map(char::from));
    out
}

/// Midpoint of two fractional tails; `upper = None` means 1.
fn midpoint(lower: &str, upper: Option<&str>) -> Result<String, OrderKeyError> {
    if let Some(b) = upper {
        if compare(lower, b) != Ordering::Less {
            return Err(OrderKeyError::OutOfOrder);
        }
    }
    if lower.ends_with('0') || upper.is_some_and(|b| b.ends_with('0')) {
        return Err(OrderKeyError::TrailingZero);
    }

    if let Some(b) = upper {
        let a_bytes = lower.as_bytes();
        let b_bytes = b.as_bytes();
        let mut shared = 0;
        while shared < b_bytes.len()
            && a_bytes.get(shared).copied().unwrap_or(b'0') == b_bytes[shared]
        {
            shared += 1;
        }
        if shared > 0 {
            let tail = midpoint(lower.get(shared..).unwrap_or(""), Some(&b[shared..]))?;
            return Ok(format!("{}{tail}", &b[..shared]));
        }
    }

    let digit_a = match lower.as_bytes().first() {
        Some(b) => digit_index(*b)?,
        None => 0,
    };
    let digit_b = match upper {
        Some(b) => digit_index(*b.as_bytes().first().ok_or(OrderKeyError::OutOfOrder)?)?,
        None => BASE,
    };

    if digit_b - digit_a > 1 {
        let middle = (digit_a + digit_b + 1) / 2;
        return Ok((DIGITS[middle] as char).to_string());
    }

    match upper {
        Some(b) if b.len() > 1 => Ok(b[..1].to_string()),
        _ => {
            let tail = midpoint(lower.get(1..).unwrap_or(""), None)?;
            Ok(format!("{}{tail}", DIGITS[digit_a] as char))
        }
    }
}

#[cfg(test)]
mod tests;
