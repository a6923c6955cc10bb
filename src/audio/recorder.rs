/// An assembled recording, ready to hand to the transcription service
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    /// Encoded audio bytes (fragments concatenated in delivery order)
    pub bytes: Vec<u8>,
    /// MIME type of the encoding (configuration, e.g. `audio/webm;codecs=opus`)
    pub mime_type: String,
}

impl RecordedAudio {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Accumulates audio fragments for one recording.
///
/// A fresh buffer is created per recording; fragments append in delivery
/// order and empty fragments are ignored.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    fragments: Vec<Vec<u8>>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment. Empty fragments are a no-op.
    pub fn push(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.fragments.push(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(|f| f.len()).sum()
    }

    /// Concatenate the fragments into one artifact.
    ///
    /// Returns `None` when nothing was captured.
    pub fn assemble(&self, mime_type: &str) -> Option<RecordedAudio> {
        if self.fragments.is_empty() {
            return None;
        }

        let mut bytes = Vec::with_capacity(self.total_bytes());
        for fragment in &self.fragments {
            bytes.extend_from_slice(fragment);
        }

        Some(RecordedAudio {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }
}
