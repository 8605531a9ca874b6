//! Terrain collaborator seam. The synchronization engine treats chunk
//! payloads as opaque bytes produced for a center coordinate; the real
//! terrain subsystem lives elsewhere.

use shared::MESSAGE_TERMINATOR;

/// Supplies the serialized map chunk sent as the first handshake part.
pub trait ChunkProvider {
    fn chunk_bytes(&self, center_x: i32, center_y: i32) -> Vec<u8>;
}

/// Placeholder terrain: a square of empty tiles around the center.
///
/// The payload layout is a `MAP_CHUNK` header naming the edge length and
/// center, followed by one row of tile characters per line, terminated
/// like every other server message.
pub struct FlatChunkProvider {
    pub radius: i32,
}

impl Default for FlatChunkProvider {
    fn default() -> Self {
        Self { radius: 8 }
    }
}

impl ChunkProvider for FlatChunkProvider {
    fn chunk_bytes(&self, center_x: i32, center_y: i32) -> Vec<u8> {
        let edge = self.radius * 2 + 1;
        let mut payload = format!("MAP_CHUNK\n{} {} {}\n", edge, center_x, center_y).into_bytes();
        for _ in 0..edge {
            payload.extend(std::iter::repeat(b'0').take(edge as usize));
            payload.push(b'\n');
        }
        payload.push(MESSAGE_TERMINATOR);
        payload
    }
}
