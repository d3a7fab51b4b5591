use std::sync::Mutex;

/// Fixed-capacity ring of recent PCM samples, normalized to `f32` in
/// `[-1.0, 1.0]`. The only cross-task mutable state in the pipeline: one
/// appender (the transport task) and one reader (the orchestrator task)
/// share it through a short-critical-section mutex rather than a lock-free
/// structure — operations here are O(chunk length) and never block on I/O.
pub struct AudioBuffer {
    sample_rate: u32,
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    buf: Vec<f32>,
    /// Monotonically increasing total sample count. Never wraps; only
    /// indices into `buf` wrap.
    write_pos: u64,
}

impl AudioBuffer {
    pub fn new(max_duration_sec: f64, sample_rate: u32) -> Self {
        let capacity = (max_duration_sec * sample_rate as f64) as usize;
        Self {
            sample_rate,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                buf: vec![0.0; capacity.max(1)],
                write_pos: 0,
            }),
        }
    }

    /// Append float32 samples, advancing `write_position` by the full
    /// input length regardless of how much of it is retained.
    pub fn append(&self, samples: &[f32]) {
        let mut inner = self.inner.lock().unwrap();
        let n = samples.len();
        let capacity = self.capacity;

        if n >= capacity {
            inner.buf.copy_from_slice(&samples[n - capacity..]);
            inner.write_pos += n as u64;
            return;
        }

        let start = (inner.write_pos % capacity as u64) as usize;
        let end = start + n;
        if end <= capacity {
            inner.buf[start..end].copy_from_slice(samples);
        } else {
            let first = capacity - start;
            inner.buf[start..].copy_from_slice(&samples[..first]);
            inner.buf[..n - first].copy_from_slice(&samples[first..]);
        }
        inner.write_pos += n as u64;
    }

    /// Interpret `bytes` as little-endian signed 16-bit PCM, normalize to
    /// `f32`, and append.
    pub fn append_pcm16(&self, bytes: &[u8]) {
        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
            .collect();
        self.append(&samples);
    }

    /// Return the most recent `duration_sec` seconds of audio, in
    /// chronological order, or `None` if nothing has been written yet.
    pub fn last(&self, duration_sec: f64) -> Option<Vec<f32>> {
        let inner = self.inner.lock().unwrap();
        let total_written = inner.write_pos;
        if total_written == 0 {
            return None;
        }

        let capacity = self.capacity as u64;
        let n_want = ((duration_sec * self.sample_rate as f64) as u64)
            .min(capacity)
            .min(total_written) as usize;

        let end = (total_written % capacity) as i64;
        let start = end - n_want as i64;

        let out = if start >= 0 {
            inner.buf[start as usize..end as usize].to_vec()
        } else {
            let wrapped_start = (self.capacity as i64 + start) as usize;
            let mut v = Vec::with_capacity(n_want);
            v.extend_from_slice(&inner.buf[wrapped_start..]);
            v.extend_from_slice(&inner.buf[..end as usize]);
            v
        };
        Some(out)
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.buf.iter_mut().for_each(|s| *s = 0.0);
        inner.write_pos = 0;
    }

    pub fn total_samples_written(&self) -> u64 {
        self.inner.lock().unwrap().write_pos
    }

    pub fn duration_available_sec(&self) -> f64 {
        let written = self.inner.lock().unwrap().write_pos;
        written.min(self.capacity as u64) as f64 / self.sample_rate as f64
    }
}
