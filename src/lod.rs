//! Level-of-detail pyramids over decoded channels.
//!
//! Every layer halves its parent. Master channels (time axes) are averaged
//! pairwise; other channels keep whichever value of a pair lies farther from
//! the value last emitted into that layer, so short spikes survive zooming
//! out.

use crate::{Error, Result, sampler::BufferView};

/// A decoded buffer plus its downsampled layers.
#[derive(Debug, Clone)]
pub struct LodBuffer<'b> {
    original: &'b [f64],
    /// Layer `i` here is pyramid layer `i + 1`.
    layers: Vec<Vec<f64>>,
    averaging: bool,
}

impl<'b> LodBuffer<'b> {
    /// Builds the pyramid over `original`, halving while a layer holds more
    /// than `min_samples` values.
    ///
    /// A single pass over the odd indices: each completed pair is pushed up
    /// as long as the index it lands on is odd, i.e. completes a pair in the
    /// next layer too.
    pub fn build(original: &'b [f64], averaging: bool, min_samples: usize) -> Self {
        let min_samples = min_samples.max(1);
        let mut layers: Vec<Vec<f64>> = Vec::new();
        let mut count = original.len();
        while count > min_samples {
            count /= 2;
            layers.push(vec![0.0; count]);
        }

        let mut last_emitted = vec![0.0; layers.len()];
        for i in (1..original.len()).step_by(2) {
            let mut index = i;
            for level in 0..layers.len() {
                let (parents, children) = layers.split_at_mut(level);
                let parent: &[f64] = match parents.last() {
                    Some(layer) => layer,
                    None => original,
                };
                let child = &mut children[0];
                let target = index / 2;
                if target >= child.len() {
                    break;
                }

                let (a, b) = (parent[index - 1], parent[index]);
                let value = if averaging {
                    (a + b) * 0.5
                } else {
                    let last = last_emitted[level];
                    if (a - last).abs() > (b - last).abs() { a } else { b }
                };
                child[target] = value;
                last_emitted[level] = value;

                if target % 2 == 0 {
                    break;
                }
                index = target;
            }
        }

        Self {
            original,
            layers,
            averaging,
        }
    }

    /// Pyramid over a numeric view, averaging when the view's channel is its
    /// group's master. Layers stop at the file's `lod_min_samples`.
    pub fn from_view(view: &'b BufferView<'_>) -> Result<Self> {
        let min_samples = view.channel().file().options.lod_min_samples;
        Self::from_view_with(view, min_samples)
    }

    /// [`LodBuffer::from_view`] with an explicit smallest layer size.
    pub fn from_view_with(view: &'b BufferView<'_>, min_samples: usize) -> Result<Self> {
        let values = view.data::<f64>().ok_or_else(|| {
            Error::InvalidArgument("level of detail needs a numeric channel".into())
        })?;
        Ok(Self::build(values, view.channel().is_master(), min_samples))
    }

    /// Number of layers, the original included.
    pub fn layer_count(&self) -> usize {
        self.layers.len() + 1
    }

    /// Layer `level`; layer 0 is the original buffer.
    pub fn layer(&self, level: usize) -> Option<&[f64]> {
        match level {
            0 => Some(self.original),
            n => self.layers.get(n - 1).map(Vec::as_slice),
        }
    }

    /// The finest layer with at most `max_samples` values, or the coarsest
    /// one if none is that small.
    pub fn layer_for(&self, max_samples: usize) -> &[f64] {
        if self.original.len() <= max_samples {
            return self.original;
        }
        self.layers
            .iter()
            .find(|layer| layer.len() <= max_samples)
            .or(self.layers.last())
            .map_or(self.original, Vec::as_slice)
    }

    pub fn is_averaging(&self) -> bool {
        self.averaging
    }
}
