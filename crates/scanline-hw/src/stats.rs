/// Per-frame renderer counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Draw submissions; a two-pass batch counts twice.
    pub num_batches: u32,
    pub num_vram_read_texture_updates: u32,
    pub num_uniform_buffer_updates: u32,
}

/// Counters for the frame in progress plus a snapshot of the previous one.
#[derive(Debug, Default)]
pub struct StatsCollector {
    current: RendererStats,
    last: RendererStats,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> &RendererStats {
        &self.current
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut RendererStats {
        &mut self.current
    }

    #[inline]
    pub fn last_frame(&self) -> &RendererStats {
        &self.last
    }

    /// Frame boundary: the in-progress counters become the previous frame's.
    pub fn end_frame(&mut self) {
        self.last = std::mem::take(&mut self.current);
        log::trace!(
            "frame stats: {} batches, {} read-texture updates, {} uniform updates",
            self.last.num_batches,
            self.last.num_vram_read_texture_updates,
            self.last.num_uniform_buffer_updates
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_frame_rolls_counters() {
        let mut s = StatsCollector::new();
        s.current_mut().num_batches = 3;
        s.current_mut().num_uniform_buffer_updates = 1;
        s.end_frame();

        assert_eq!(*s.current(), RendererStats::default());
        assert_eq!(s.last_frame().num_batches, 3);
        assert_eq!(s.last_frame().num_uniform_buffer_updates, 1);

        s.end_frame();
        assert_eq!(*s.last_frame(), RendererStats::default());
    }
}
