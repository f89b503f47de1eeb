use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by an extractor.
///
/// Serialized as a bare JSON array so stored templates stay portable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|value| value.is_finite())
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl AsRef<[f64]> for Embedding {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_array() {
        let embedding = Embedding::new(vec![0.25, -0.5]);
        let json = serde_json::to_string(&embedding).unwrap();
        assert_eq!(json, "[0.25,-0.5]");

        let parsed: Embedding = serde_json::from_str("[1.0, 2.0, 3.0]").unwrap();
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn detects_non_finite_values() {
        assert!(Embedding::new(vec![0.1, 0.2]).is_finite());
        assert!(!Embedding::new(vec![0.1, f64::NAN]).is_finite());
    }
}
