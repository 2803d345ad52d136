use serde::{Deserialize, Serialize};

/// Generic intermediate representation every typed value is converted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PersistedValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(PersistedArray),
}

impl PersistedValue {
    /// Build a number array from single-precision components.
    pub fn from_f32s(values: &[f32]) -> Self {
        Self::Array(
            values
                .iter()
                .map(|v| PersistedValue::Float(f64::from(*v)))
                .collect(),
        )
    }

    /// Build a number array from integer components.
    pub fn from_i32s(values: &[i32]) -> Self {
        Self::Array(
            values
                .iter()
                .map(|v| PersistedValue::Integer(i64::from(*v)))
                .collect(),
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floating point.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PersistedArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }
}

/// Ordered array of persisted values.
///
/// The number-array tag is computed from the elements whenever an array is
/// built, including on decode, so it can never disagree with the contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PersistedValue>", into = "Vec<PersistedValue>")]
pub struct PersistedArray {
    values: Vec<PersistedValue>,
    number_array: bool,
}

impl PersistedArray {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every element is numeric, so positional numeric access is valid.
    pub fn is_number_array(&self) -> bool {
        self.number_array
    }

    pub fn get(&self, index: usize) -> Option<&PersistedValue> {
        self.values.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PersistedValue> {
        self.values.iter()
    }

    pub fn as_f32_array(&self) -> Option<Vec<f32>> {
        if !self.number_array {
            return None;
        }
        self.values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    }

    pub fn as_f64_array(&self) -> Option<Vec<f64>> {
        if !self.number_array {
            return None;
        }
        self.values.iter().map(PersistedValue::as_f64).collect()
    }

    /// Integer view; floating point elements are truncated.
    pub fn as_i32_array(&self) -> Option<Vec<i32>> {
        if !self.number_array {
            return None;
        }
        self.values
            .iter()
            .map(|v| match v {
                PersistedValue::Integer(i) => i32::try_from(*i).ok(),
                PersistedValue::Float(f) => Some(*f as i32),
                _ => None,
            })
            .collect()
    }
}

impl From<Vec<PersistedValue>> for PersistedArray {
    fn from(values: Vec<PersistedValue>) -> Self {
        let number_array = values.iter().all(PersistedValue::is_number);
        Self {
            values,
            number_array,
        }
    }
}

impl From<PersistedArray> for Vec<PersistedValue> {
    fn from(array: PersistedArray) -> Self {
        array.values
    }
}

impl FromIterator<PersistedValue> for PersistedArray {
    fn from_iter<I: IntoIterator<Item = PersistedValue>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a PersistedArray {
    type Item = &'a PersistedValue;
    type IntoIter = std::slice::Iter<'a, PersistedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
