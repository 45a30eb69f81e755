//! Decoded scalar values, as bound into a [`Scope`](crate::scope::Scope) by linearization.

/// A single decoded scalar field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            other => other.as_i64().map(|i| i as f64).or_else(|| other.as_u64().map(|u| u as f64)),
        }
    }

    /// Coerce to a repetition/byte count. Negative, NaN and infinite values give 0;
    /// floats are truncated.
    pub fn as_count(&self) -> u64 {
        match self {
            Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) => self.as_u64().unwrap_or(0),
            Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => {
                self.as_i64().map_or(0, |i| i.max(0) as u64)
            }
            Value::Float(_) | Value::Double(_) => match self.as_f64() {
                Some(f) if f.is_finite() && f > 0.0 => f as u64,
                _ => 0,
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::U8(x) => write!(f, "{}", x),
            Value::U16(x) => write!(f, "{}", x),
            Value::U32(x) => write!(f, "{}", x),
            Value::U64(x) => write!(f, "{}", x),
            Value::I8(x) => write!(f, "{}", x),
            Value::I16(x) => write!(f, "{}", x),
            Value::I32(x) => write!(f, "{}", x),
            Value::I64(x) => write!(f, "{}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_coercion_clamps_negatives_and_truncates_floats() {
        assert_eq!(Value::U16(0x0100).as_count(), 256);
        assert_eq!(Value::I8(-3).as_count(), 0);
        assert_eq!(Value::I32(7).as_count(), 7);
        assert_eq!(Value::Double(2.9).as_count(), 2);
        assert_eq!(Value::Float(f32::NAN).as_count(), 0);
        assert_eq!(Value::Double(-1.0).as_count(), 0);
    }

    #[test]
    fn large_unsigned_is_not_a_signed_value() {
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::U64(u64::MAX).as_count(), u64::MAX);
    }
}
