//! Encoding session: ordered accumulation of encoder output

use crate::domain::model::{CodecPreference, OutputArtifact};

/// Lifecycle of an encoding session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

/// Append-only list of compressed chunks for one run.
///
/// Chunks are kept in emission order and concatenated once on finish.
#[derive(Debug)]
pub struct EncodingSession {
    state: SessionState,
    chunks: Vec<Vec<u8>>,
    byte_len: usize,
}

impl Default for EncodingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            chunks: Vec::new(),
            byte_len: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Idle -> Recording`; returns false from any other state
    pub fn begin(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::Recording;
        true
    }

    /// Append one chunk. Empty chunks and chunks outside `Recording` are dropped.
    pub fn append(&mut self, chunk: Vec<u8>) -> bool {
        if self.state != SessionState::Recording || chunk.is_empty() {
            return false;
        }
        self.byte_len += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// `Recording -> Stopped`, concatenating every chunk into the artifact
    pub fn finish(&mut self, codec: &CodecPreference) -> Option<OutputArtifact> {
        if self.state != SessionState::Recording {
            return None;
        }
        self.state = SessionState::Stopped;

        let mut bytes = Vec::with_capacity(self.byte_len);
        for chunk in self.chunks.drain(..) {
            bytes.extend_from_slice(&chunk);
        }
        self.byte_len = 0;

        Some(OutputArtifact {
            bytes,
            mime_type: codec.mime_type.clone(),
            codec: Some(codec.codec.clone()),
            extension: codec.extension().to_string(),
        })
    }

    /// Drop accumulated chunks without producing an artifact
    pub fn discard(&mut self) {
        self.chunks.clear();
        self.byte_len = 0;
        self.state = SessionState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp9() -> CodecPreference {
        CodecPreference::new("libvpx-vp9", "webm", "video/webm;codecs=vp9")
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = EncodingSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.append(vec![1]));

        assert!(session.begin());
        assert!(!session.begin());
        assert_eq!(session.state(), SessionState::Recording);

        assert!(session.append(vec![1, 2]));
        assert!(!session.append(Vec::new()));
        assert!(session.append(vec![3]));
        assert_eq!(session.chunk_count(), 2);
        assert_eq!(session.byte_len(), 3);

        let artifact = session.finish(&vp9()).unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
        assert_eq!(artifact.codec.as_deref(), Some("libvpx-vp9"));
        assert_eq!(artifact.extension, "webm");
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_finish_only_once() {
        let mut session = EncodingSession::new();
        session.begin();
        session.append(vec![9]);
        assert!(session.finish(&vp9()).is_some());
        assert!(session.finish(&vp9()).is_none());
        assert!(!session.append(vec![1]));
    }

    #[test]
    fn test_discard_drops_chunks() {
        let mut session = EncodingSession::new();
        session.begin();
        session.append(vec![1, 2, 3]);
        session.discard();
        assert_eq!(session.byte_len(), 0);
        assert!(session.finish(&vp9()).is_none());
    }
}
