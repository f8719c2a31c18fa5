//! In-memory media stream connecting synthetic filters

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::pipeline::{MediaFormat, MediaStream};

/// Bounded queue of generated buffers with a fixed format
pub struct SyntheticStream {
    format: MediaFormat,
    capacity: usize,
    queue: Mutex<VecDeque<Bytes>>,
}

impl SyntheticStream {
    pub fn new(format: MediaFormat, capacity: usize) -> Self {
        Self {
            format,
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Queue a buffer; returns false and drops it when the queue is full
    pub fn push(&self, buffer: Bytes) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(buffer);
        true
    }

    /// Drop everything queued
    pub fn clear(&self) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaStream for SyntheticStream {
    fn media_format(&self) -> MediaFormat {
        self.format.clone()
    }

    fn read(&self) -> Option<Bytes> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::mime_type;

    #[test]
    fn test_bounded_fifo() {
        let stream = SyntheticStream::new(MediaFormat::new(mime_type::APPLICATION_OCTET_STREAM), 2);
        assert!(stream.push(Bytes::from_static(b"a")));
        assert!(stream.push(Bytes::from_static(b"b")));
        assert!(!stream.push(Bytes::from_static(b"c")));

        assert_eq!(stream.read(), Some(Bytes::from_static(b"a")));
        assert_eq!(stream.len(), 1);
        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.read(), None);
    }
}
