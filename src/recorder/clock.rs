use std::time::Duration;

/// Maps wall-clock time onto a constant frame-rate timeline.
///
/// Screenshots arrive at an irregular pace. The clock says how many copies
/// of each grab are needed so that frame `n` lands at `n / fps` seconds.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fps: u32,
    total: u64,
    written: u64,
}

impl FrameClock {
    pub fn new(fps: u32, duration: Duration) -> Self {
        let fps = fps.max(1);
        Self {
            fps,
            total: total_frames(fps, duration),
            written: 0,
        }
    }

    /// Frames the output must contain to last at least the duration.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Frames that should exist once `elapsed` has passed, capped at the total.
    pub fn due(&self, elapsed: Duration) -> u64 {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let due = ms.saturating_mul(self.fps as u64) / 1000 + 1;
        due.min(self.total)
    }

    /// Record a grab taken at `elapsed` and return how many times to write it.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        let due = self.due(elapsed);
        let n = due.saturating_sub(self.written);
        self.written += n;
        n
    }

    /// Frames still missing after the capture loop ends.
    pub fn finish(&mut self) -> u64 {
        let n = self.total.saturating_sub(self.written);
        self.written = self.total;
        n
    }

    /// Time at which the next frame becomes due.
    pub fn next_frame_at(&self) -> Duration {
        let micros = u128::from(self.written) * 1_000_000 / u128::from(self.fps);
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}

fn total_frames(fps: u32, duration: Duration) -> u64 {
    let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    ms.saturating_mul(fps as u64).div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_total_rounds_up() {
        assert_eq!(FrameClock::new(30, ms(1000)).total(), 30);
        assert_eq!(FrameClock::new(30, ms(19_000)).total(), 570);
        // 10ms at 30fps is 0.3 of a frame
        assert_eq!(FrameClock::new(30, ms(10)).total(), 1);
        assert_eq!(FrameClock::new(24, ms(1010)).total(), 25);
    }

    #[test]
    fn test_first_grab_writes_one_frame() {
        let mut clock = FrameClock::new(30, ms(1000));
        assert_eq!(clock.advance(ms(0)), 1);
        assert_eq!(clock.written(), 1);
    }

    #[test]
    fn test_slow_grab_is_duplicated() {
        let mut clock = FrameClock::new(30, ms(1000));
        clock.advance(ms(0));
        // 100ms later, frames 1..=3 are due
        assert_eq!(clock.advance(ms(100)), 3);
        assert_eq!(clock.written(), 4);
        // Same instant again owes nothing
        assert_eq!(clock.advance(ms(100)), 0);
    }

    #[test]
    fn test_advance_is_capped_at_total() {
        let mut clock = FrameClock::new(10, ms(500));
        assert_eq!(clock.advance(ms(10_000)), 5);
        assert_eq!(clock.finish(), 0);
    }

    #[test]
    fn test_finish_pads_to_total() {
        let mut clock = FrameClock::new(30, ms(1000));
        clock.advance(ms(0));
        clock.advance(ms(500));
        assert_eq!(clock.written(), 16);
        assert_eq!(clock.finish(), 14);
        assert_eq!(clock.written(), 30);
    }

    #[test]
    fn test_next_frame_at() {
        let mut clock = FrameClock::new(25, ms(1000));
        assert_eq!(clock.next_frame_at(), ms(0));
        clock.advance(ms(0));
        assert_eq!(clock.next_frame_at(), ms(40));
        clock.advance(ms(85));
        assert_eq!(clock.written(), 3);
        assert_eq!(clock.next_frame_at(), ms(120));
    }

    #[test]
    fn test_huge_duration_saturates() {
        let mut clock = FrameClock::new(u32::MAX, Duration::MAX);
        assert_eq!(clock.total(), u64::MAX / 1000 + 1);
        assert_eq!(clock.advance(Duration::MAX), clock.total());
        assert_eq!(clock.finish(), 0);
        assert!(clock.next_frame_at() > ms(0));
    }
}
