//! Fixed buffers reused for every write the engine issues.
//!
//! Both buffers are allocated once when the player is built. The refill path only ever
//! borrows them, so no allocation happens while audio is streaming.

pub struct BufferPool {
    silence: Box<[u8]>,
    stream: Box<[u8]>,
}

impl BufferPool {
    pub fn new(silence_len: usize, stream_len: usize) -> Self {
        Self {
            silence: vec![0u8; silence_len].into_boxed_slice(),
            stream: vec![0u8; stream_len].into_boxed_slice(),
        }
    }

    pub fn silence(&self) -> &[u8] {
        &self.silence
    }

    pub fn silence_len(&self) -> usize {
        self.silence.len()
    }

    pub fn stream_len(&self) -> usize {
        self.stream.len()
    }

    /// Whole streaming buffer, for a refill to read into
    pub fn stream_mut(&mut self) -> &mut [u8] {
        &mut self.stream
    }

    /// First `len` bytes of the streaming buffer
    pub fn stream(&self, len: usize) -> &[u8] {
        &self.stream[..len.min(self.stream.len())]
    }
}
