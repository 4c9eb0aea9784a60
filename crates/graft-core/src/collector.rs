//! Output collection for scripts that emit zero or more rows per record.
//!
//! Each `transform` call gets its own [`RecordCollector`]. The script pushes
//! rows into it; once the call returns successfully the host forwards the
//! rows to the pipeline's [`OutputRowCollector`]. Because every call has its
//! own view, concurrent calls never interleave rows of one record.

use crate::value::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// One output record: field values in output-column order, `None` is null.
pub type OutputRow = Vec<Option<String>>;

/// Pipeline-side sink for rows produced by a transformer.
pub trait OutputRowCollector: Send + Sync {
    /// Accept one output row.
    fn put_row(&self, row: OutputRow);

    /// Accept all rows produced for one record.
    ///
    /// Sinks that can should keep the rows contiguous.
    fn put_rows(&self, rows: Vec<OutputRow>) {
        for row in rows {
            self.put_row(row);
        }
    }
}

/// Per-call collector handed to a script.
///
/// Cloning yields another handle to the same buffer, which lets interpreter
/// adapters pass it into the script by value.
#[derive(Debug, Clone, Default)]
pub struct RecordCollector {
    rows: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one output record with one field per value.
    pub fn put_values(&self, values: Vec<Value>) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(values);
    }

    /// Number of records emitted so far.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all emitted records, leaving the collector empty.
    pub fn take(&self) -> Vec<Vec<Value>> {
        std::mem::take(&mut *self.rows.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Thread-safe in-memory sink.
#[derive(Debug, Default)]
pub struct RowBuffer {
    rows: Mutex<Vec<OutputRow>>,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take all buffered rows, in arrival order.
    pub fn drain(&self) -> Vec<OutputRow> {
        std::mem::take(&mut *self.rows.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputRowCollector for RowBuffer {
    fn put_row(&self, row: OutputRow) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    fn put_rows(&self, rows: Vec<OutputRow>) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rows);
    }
}

impl<T: OutputRowCollector + ?Sized> OutputRowCollector for Arc<T> {
    fn put_row(&self, row: OutputRow) {
        (**self).put_row(row);
    }

    fn put_rows(&self, rows: Vec<OutputRow>) {
        (**self).put_rows(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_calls_zero_rows() {
        let collector = RecordCollector::new();
        assert!(collector.is_empty());
        assert!(collector.take().is_empty());
    }

    #[test]
    fn test_k_calls_k_rows() {
        let collector = RecordCollector::new();
        let handle = collector.clone();

        handle.put_values(vec![Value::from("a")]);
        handle.put_values(vec![Value::from("b"), Value::from("c")]);
        handle.put_values(Vec::new());

        assert_eq!(collector.len(), 3);
        let rows = collector.take();
        assert_eq!(rows[1].len(), 2);
        assert!(rows[2].is_empty());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_row_buffer_from_threads() {
        let buffer = Arc::new(RowBuffer::new());

        std::thread::scope(|s| {
            for i in 0..4 {
                let buffer = buffer.clone();
                s.spawn(move || {
                    for _ in 0..10 {
                        buffer.put_row(vec![Some(i.to_string())]);
                    }
                });
            }
        });

        assert_eq!(buffer.len(), 40);
        assert_eq!(buffer.drain().len(), 40);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_put_rows_contiguous() {
        let buffer = RowBuffer::new();

        std::thread::scope(|s| {
            for i in 0..4 {
                let buffer = &buffer;
                s.spawn(move || {
                    for _ in 0..10 {
                        buffer.put_rows(vec![vec![Some(i.to_string())]; 3]);
                    }
                });
            }
        });

        let rows = buffer.drain();
        assert_eq!(rows.len(), 120);
        for chunk in rows.chunks(3) {
            assert!(chunk.iter().all(|row| row == &chunk[0]));
        }
    }
}
