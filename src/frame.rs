//! Frames of samples as they come off the device

use byte_slice_cast::{AsByteSlice, ToByteSlice};

/// What a frame holds. The sample width on disk follows from this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FrameKind {
    /// Raw backscatter ADC counts (int16)
    RawIq,
    /// Phase-demodulated values (int32)
    Phase,
    /// Monitor data that rides along with phase batches (uint32)
    Monitor,
}

impl FrameKind {
    /// Bytes per sample in the canonical representation
    pub fn sample_size(self) -> usize {
        match self {
            FrameKind::RawIq => 2,
            FrameKind::Phase | FrameKind::Monitor => 4,
        }
    }
}

/// The sample buffer itself, typed by the canonical width of each kind
#[derive(Clone, PartialEq, Debug)]
pub enum Samples {
    I16(Vec<i16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::I16(v) => v.len(),
            Samples::I32(v) => v.len(),
            Samples::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Samples::I16(_) => FrameKind::RawIq,
            Samples::I32(_) => FrameKind::Phase,
            Samples::U32(_) => FrameKind::Monitor,
        }
    }

    /// Widen every sample to f64, leaving values untouched
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::I16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::U32(v) => v.iter().map(|&x| f64::from(x)).collect(),
        }
    }
}

// Apply the same reordering to whichever sample type is inside
macro_rules! map_samples {
    ($samples:expr, |$v:ident| $body:expr) => {
        match $samples {
            Samples::I16($v) => Samples::I16($body),
            Samples::I32($v) => Samples::I32($body),
            Samples::U32($v) => Samples::U32($body),
        }
    };
}

/// Memory order of a multi-channel frame
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Layout {
    /// ch0[0], ch1[0], ch0[1], ch1[1], ... (acquisition order)
    Interleaved,
    /// all of ch0, then all of ch1, ...
    Planar,
}

/// One batch of samples from the device. Cloning gives every consumer its own copy.
#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    channel_count: usize,
    layout: Layout,
    samples: Samples,
}

impl Frame {
    fn new(samples: Samples, channel_count: usize) -> Self {
        Self {
            channel_count: channel_count.max(1),
            layout: Layout::Interleaved,
            samples,
        }
    }

    pub fn raw(samples: Vec<i16>, channel_count: usize) -> Self {
        Self::new(Samples::I16(samples), channel_count)
    }

    pub fn phase(samples: Vec<i32>, channel_count: usize) -> Self {
        Self::new(Samples::I32(samples), channel_count)
    }

    pub fn monitor(samples: Vec<u32>, channel_count: usize) -> Self {
        Self::new(Samples::U32(samples), channel_count)
    }

    pub fn kind(&self) -> FrameKind {
        self.samples.kind()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples each channel contributes
    pub fn points_per_channel(&self) -> usize {
        self.samples.len() / self.channel_count
    }

    /// Size of the frame in its canonical on-disk form
    pub fn byte_len(&self) -> usize {
        self.samples.len() * self.kind().sample_size()
    }

    /// Regroup samples so each channel is contiguous. Single channel frames are unchanged.
    pub fn into_planar(self) -> Self {
        if self.layout == Layout::Planar || self.channel_count == 1 {
            return Self {
                layout: Layout::Planar,
                ..self
            };
        }
        let channels = self.channel_count;
        Self {
            samples: map_samples!(&self.samples, |v| deinterleave(v, channels)),
            layout: Layout::Planar,
            channel_count: channels,
        }
    }

    /// Copy out a single channel's samples in time order
    pub fn channel(&self, index: usize) -> Option<Samples> {
        if index >= self.channel_count {
            return None;
        }
        let (channels, layout) = (self.channel_count, self.layout);
        Some(map_samples!(&self.samples, |v| {
            pick_channel(v, index, channels, layout)
        }))
    }

    /// Little-endian bytes in acquisition order, whatever the in-memory layout
    pub fn encode_le(&self) -> Vec<u8> {
        let interleaved;
        let samples = if self.layout == Layout::Planar && self.channel_count > 1 {
            let channels = self.channel_count;
            interleaved = map_samples!(&self.samples, |v| interleave(v, channels));
            &interleaved
        } else {
            &self.samples
        };
        match samples {
            Samples::I16(v) => le_bytes(v, |x| x.to_le_bytes()),
            Samples::I32(v) => le_bytes(v, |x| x.to_le_bytes()),
            Samples::U32(v) => le_bytes(v, |x| x.to_le_bytes()),
        }
    }
}

fn le_bytes<T: ToByteSlice, const N: usize>(v: &[T], to_le: fn(&T) -> [u8; N]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        v.as_byte_slice().to_vec()
    } else {
        v.iter().flat_map(to_le).collect()
    }
}

/// Reorder `data` (interleaved, `channels` wide) so each channel is contiguous.
/// Trailing samples that don't fill a whole row are dropped.
pub fn deinterleave<T: Copy>(data: &[T], channels: usize) -> Vec<T> {
    let rows = data.len() / channels;
    let data = &data[..rows * channels];
    let mut out = Vec::with_capacity(data.len());
    for ch in 0..channels {
        out.extend(data.iter().skip(ch).step_by(channels).copied());
    }
    out
}

/// Inverse of [`deinterleave`]
pub fn interleave<T: Copy>(data: &[T], channels: usize) -> Vec<T> {
    let rows = data.len() / channels;
    let mut out = Vec::with_capacity(rows * channels);
    for row in 0..rows {
        for ch in 0..channels {
            out.push(data[ch * rows + row]);
        }
    }
    out
}

fn pick_channel<T: Copy>(data: &[T], index: usize, channels: usize, layout: Layout) -> Vec<T> {
    let rows = data.len() / channels;
    match layout {
        Layout::Interleaved => data
            .iter()
            .skip(index)
            .step_by(channels)
            .take(rows)
            .copied()
            .collect(),
        Layout::Planar => data[index * rows..(index + 1) * rows].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_sample_type() {
        assert_eq!(Frame::raw(vec![1, 2], 1).kind(), FrameKind::RawIq);
        assert_eq!(Frame::phase(vec![1, 2], 1).kind(), FrameKind::Phase);
        assert_eq!(Frame::monitor(vec![1, 2], 1).kind(), FrameKind::Monitor);
        assert_eq!(Frame::phase(vec![0; 10], 2).byte_len(), 40);
        assert_eq!(Frame::raw(vec![0; 10], 2).byte_len(), 20);
    }

    #[test]
    fn deinterleave_two_channels() {
        let data = [0, 10, 1, 11, 2, 12];
        assert_eq!(deinterleave(&data, 2), vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(interleave(&deinterleave(&data, 2), 2), data.to_vec());
    }

    #[test]
    fn deinterleave_drops_partial_row() {
        assert_eq!(deinterleave(&[0, 10, 1, 11, 2], 2), vec![0, 1, 10, 11]);
    }

    #[test]
    fn channels_match_across_layouts() {
        let frame = Frame::phase(vec![0, 100, 200, 1, 101, 201], 3);
        let planar = frame.clone().into_planar();
        assert_eq!(planar.layout(), Layout::Planar);
        for ch in 0..3 {
            assert_eq!(frame.channel(ch), planar.channel(ch));
        }
        assert_eq!(planar.channel(1), Some(Samples::I32(vec![100, 101])));
        assert_eq!(planar.channel(3), None);
    }

    #[test]
    fn encoding_is_acquisition_order() {
        let frame = Frame::raw(vec![1, -1, 2, -2], 2);
        let bytes = frame.encode_le();
        assert_eq!(bytes, vec![1, 0, 0xff, 0xff, 2, 0, 0xfe, 0xff]);
        assert_eq!(frame.into_planar().encode_le(), bytes);
    }

    #[test]
    fn phase_encodes_as_i32() {
        let bytes = Frame::phase(vec![-2], 1).encode_le();
        assert_eq!(bytes, (-2i32).to_le_bytes().to_vec());
    }
}
