//! Per-connection byte buffering: inbound message framing and the outbound
//! queue that carries unsent broadcast bytes across ticks.

use shared::MESSAGE_TERMINATOR;

/// Accumulates raw socket reads and yields `#`-terminated messages.
///
/// Bytes are appended as they arrive and consumed only when a complete
/// message is extracted, so a delimiter split across any number of reads
/// still frames correctly.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    data: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Extracts the longest prefix before the first terminator, consuming
    /// both from the buffer. Returns `None` while no terminator is present.
    pub fn next_message(&mut self) -> Option<String> {
        let index = self.data.iter().position(|&b| b == MESSAGE_TERMINATOR)?;
        let message = String::from_utf8_lossy(&self.data[..index]).into_owned();
        self.data.drain(..=index);
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered outbound bytes a connection has not yet accepted.
///
/// The tick driver appends whole payloads and consumes exactly as many
/// bytes as the transport takes, deferring the remainder to later ticks.
#[derive(Debug, Default)]
pub struct SendQueue {
    data: Vec<u8>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Discards the `count` oldest bytes after the transport accepted them.
    pub fn consume(&mut self, count: usize) {
        self.data.drain(..count);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_terminator_yields_nothing() {
        let mut buffer = MessageBuffer::new();
        buffer.extend(b"MOVE 5");
        assert_eq!(buffer.next_message(), None);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_single_message_extracted_and_consumed() {
        let mut buffer = MessageBuffer::new();
        buffer.extend(b"MOVE 5 0#");
        assert_eq!(buffer.next_message(), Some("MOVE 5 0".to_string()));
        assert!(buffer.is_empty());
        assert_eq!(buffer.next_message(), None);
    }

    #[test]
    fn test_message_split_across_reads() {
        let mut buffer = MessageBuffer::new();
        buffer.extend(b"MOV");
        assert_eq!(buffer.next_message(), None);
        buffer.extend(b"E 5");
        assert_eq!(buffer.next_message(), None);
        buffer.extend(b" 0#");
        assert_eq!(buffer.next_message(), Some("MOVE 5 0".to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_framing_identical_regardless_of_split_points() {
        let payload = b"GRAB -12 34#";
        for split in 0..payload.len() {
            let mut buffer = MessageBuffer::new();
            buffer.extend(&payload[..split]);
            buffer.extend(&payload[split..]);
            assert_eq!(buffer.next_message(), Some("GRAB -12 34".to_string()));
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_one_message_per_call() {
        let mut buffer = MessageBuffer::new();
        buffer.extend(b"MOVE 1 1#MOVE 2 2#MOVE 3");
        assert_eq!(buffer.next_message(), Some("MOVE 1 1".to_string()));
        assert_eq!(buffer.next_message(), Some("MOVE 2 2".to_string()));
        assert_eq!(buffer.next_message(), None);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_empty_message() {
        let mut buffer = MessageBuffer::new();
        buffer.extend(b"#");
        assert_eq!(buffer.next_message(), Some(String::new()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_send_queue_fifo_consume() {
        let mut queue = SendQueue::new();
        queue.push_bytes(b"PLAYER_UPDATE\n");
        queue.push_bytes(b"0 0 5 0\n#");
        assert_eq!(queue.len(), 23);

        queue.consume(14);
        assert_eq!(queue.as_slice(), b"0 0 5 0\n#");
        queue.consume(9);
        assert!(queue.is_empty());
    }
}
