//! In-memory accumulation of delta records.

use serde::{Deserialize, Serialize};

/// A single change record. The engine never inspects its content.
pub type DeltaRecord = serde_json::Value;

/// Ordered records waiting for the next flush.
#[derive(Debug, Default)]
pub struct DeltaBuffer {
    records: Vec<DeltaRecord>,
}

impl DeltaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to the tail, preserving their order.
    pub fn append<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = DeltaRecord>,
    {
        self.records.extend(records);
    }

    /// Detach every held record as one batch, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Batch {
        Batch::new(std::mem::take(&mut self.records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The records captured by one drain, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<DeltaRecord>,
}

impl Batch {
    pub fn new(records: Vec<DeltaRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DeltaRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DeltaRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_preserves_order() {
        let mut buffer = DeltaBuffer::new();
        buffer.append(vec![json!({"n": 1}), json!({"n": 2})]);
        buffer.append(vec![json!({"n": 3})]);

        let batch = buffer.drain_all();
        assert_eq!(
            batch.into_records(),
            vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]
        );
    }

    #[test]
    fn test_drain_leaves_buffer_empty() {
        let mut buffer = DeltaBuffer::new();
        buffer.append(vec![json!("a")]);
        assert_eq!(buffer.len(), 1);

        let batch = buffer.drain_all();
        assert_eq!(batch.len(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn test_append_after_drain_goes_to_next_batch() {
        let mut buffer = DeltaBuffer::new();
        buffer.append(vec![json!(1), json!(2)]);
        let first = buffer.drain_all();
        buffer.append(vec![json!(3)]);
        let second = buffer.drain_all();

        assert_eq!(first.records(), &[json!(1), json!(2)]);
        assert_eq!(second.records(), &[json!(3)]);
    }

    #[test]
    fn test_batch_serializes_as_array() {
        let batch = Batch::new(vec![json!({"inserts": []}), json!({"deletes": []})]);
        let text = serde_json::to_string(&batch).unwrap();
        assert_eq!(text, r#"[{"inserts":[]},{"deletes":[]}]"#);
    }
}
