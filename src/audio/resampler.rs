/// Streaming linear-interpolation resampler for interleaved f32 audio.
///
/// Narration arrives at 24 kHz while most output devices run at 44.1 or
/// 48 kHz. The unconsumed tail of each chunk carries over to the next
/// `process` call, so chunked input yields the same frames as one call.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
    // source frames consumed per output frame
    step: f64,
    // position relative to the first frame of `carry`
    pos: f64,
    carry: Vec<f32>,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        Self {
            src_rate,
            dst_rate,
            channels,
            step: step_for(src_rate, dst_rate),
            pos: 0.0,
            carry: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.carry.clear();
    }

    pub fn set_rates(&mut self, src_rate: u32, dst_rate: u32) {
        self.src_rate = src_rate;
        self.dst_rate = dst_rate;
        self.step = step_for(src_rate, dst_rate);
        self.reset();
    }

    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        if ch == 0 || self.src_rate == 0 || self.dst_rate == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        let in_frames = input.len() / ch;
        let mut work = std::mem::take(&mut self.carry);
        work.extend_from_slice(&input[..in_frames * ch]);
        let total_frames = work.len() / ch;
        if total_frames == 0 {
            return Vec::new();
        }

        let ratio = self.dst_rate as f64 / self.src_rate as f64;
        let mut out = Vec::with_capacity(((total_frames as f64 * ratio).ceil() as usize + 1) * ch);
        while self.pos + 1.0 <= (total_frames - 1) as f64 {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let (a, b) = (i * ch, (i + 1) * ch);
            out.extend((0..ch).map(|c| work[a + c] + (work[b + c] - work[a + c]) * frac));
            self.pos += self.step;
        }

        // keep every frame the next output may still interpolate from
        let first_needed = (self.pos.floor() as usize).min(total_frames);
        self.carry = work.split_off(first_needed * ch);
        self.pos -= first_needed as f64;

        out
    }
}

fn step_for(src_rate: u32, dst_rate: u32) -> f64 {
    if dst_rate == 0 {
        0.0
    } else {
        src_rate as f64 / dst_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_upsample_length_24k_to_48k() {
        let input = sine(440.0, 24_000, 2400);
        let mut rs = LinearResampler::new(24_000, 48_000, 1);
        let out = rs.process(&input);

        // the last input frame has no right-hand neighbour yet
        let expected = 4800isize;
        assert!((out.len() as isize - expected).abs() <= 4, "got {}", out.len());
    }

    #[test]
    fn test_chunked_matches_one_shot() {
        let input = sine(300.0, 24_000, 5000);

        let mut one = LinearResampler::new(24_000, 44_100, 1);
        let whole = one.process(&input);

        let mut two = LinearResampler::new(24_000, 44_100, 1);
        let mut streamed = Vec::new();
        for chunk in input.chunks(777) {
            streamed.extend(two.process(chunk));
        }

        assert!(
            (whole.len() as isize - streamed.len() as isize).abs() <= 1,
            "whole={} streamed={}",
            whole.len(),
            streamed.len()
        );
        let common = whole.len().min(streamed.len());
        for k in 0..common {
            assert!((whole[k] - streamed[k]).abs() < 1e-4, "mismatch at {}", k);
        }
    }

    #[test]
    fn test_tiny_chunks_keep_fractional_phase() {
        let input = sine(200.0, 24_000, 600);

        let whole = LinearResampler::new(24_000, 44_100, 1).process(&input);

        let mut rs = LinearResampler::new(24_000, 44_100, 1);
        let mut streamed = Vec::new();
        for chunk in input.chunks(1) {
            streamed.extend(rs.process(chunk));
        }
        assert_eq!(whole.len(), streamed.len());
    }

    #[test]
    fn test_downsample_chunks_skip_consumed_frames() {
        let input = sine(100.0, 48_000, 4000);
        let whole = LinearResampler::new(48_000, 16_000, 1).process(&input);

        let mut rs = LinearResampler::new(48_000, 16_000, 1);
        let mut streamed = Vec::new();
        for chunk in input.chunks(5) {
            streamed.extend(rs.process(chunk));
        }
        assert!((whole.len() as isize - streamed.len() as isize).abs() <= 1);
        for (a, b) in whole.iter().zip(&streamed) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_same_rate_passes_through() {
        let mut rs = LinearResampler::new(48_000, 48_000, 2);
        assert!(rs.is_passthrough());
        assert_eq!(rs.process(&[0.1, 0.2, 0.3, 0.4]), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_set_rates_resets_state() {
        let mut rs = LinearResampler::new(24_000, 48_000, 1);
        rs.process(&[0.5; 100]);
        rs.set_rates(24_000, 44_100);
        assert!(rs.carry.is_empty());
        assert_eq!(rs.pos, 0.0);
    }
}
