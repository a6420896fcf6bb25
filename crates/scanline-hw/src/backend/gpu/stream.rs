/// Fixed-size GPU buffer filled front to back between submissions.
///
/// Each push lands in a region no earlier push of the same submission used, so data
/// queued with `Queue::write_buffer` never overwrites what a recorded-but-unsubmitted
/// command still reads. When a push does not fit, the owner submits and calls
/// [`reset`](Self::reset).
pub(super) struct StreamBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    used: u64,
    label: &'static str,
}

impl StreamBuffer {
    pub fn new(
        device: &wgpu::Device,
        usage: wgpu::BufferUsages,
        capacity: u64,
        label: &'static str,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self { buffer, capacity, used: 0, label }
    }

    #[inline]
    fn aligned_used(&self, align: u64) -> u64 {
        self.used.div_ceil(align) * align
    }

    /// Whether `bytes` more fit at `align`.
    pub fn has_space(&self, bytes: u64, align: u64) -> bool {
        self.aligned_used(align) + bytes <= self.capacity
    }

    /// Copies `data` into the buffer at the next `align`-aligned offset.
    ///
    /// Returns the byte offset, or `None` if the data does not fit.
    pub fn push(&mut self, queue: &wgpu::Queue, data: &[u8], align: u64) -> Option<u64> {
        let offset = self.aligned_used(align);
        let size = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if offset + size > self.capacity {
            log::debug!("stream '{}' full ({} of {} bytes)", self.label, self.used, self.capacity);
            return None;
        }

        if data.len() as u64 == size {
            queue.write_buffer(&self.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(size as usize, 0);
            queue.write_buffer(&self.buffer, offset, &padded);
        }
        self.used = offset + size;
        Some(offset)
    }

    /// Starts over at offset zero. Only valid once everything referencing the
    /// buffer has been submitted.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}
