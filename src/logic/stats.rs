use itertools::{Itertools, MinMaxResult};
use log::debug;
use std::collections::BTreeMap;

use crate::error::{AssemblyError, IndexSlot, Phase, Result};
use crate::logic::ImportSession;
use crate::model::{ObjectKind, StatsInfo, CHANNEL_INDEX, IMAGE_INDEX, PIXELS_INDEX};

impl ImportSession {
    /// Statistics callback: record the global range of one channel of
    /// `Image[image_index]`'s primary pixel set.
    pub fn set_channel_global_min_max(
        &mut self,
        channel_index: usize,
        min: f64,
        max: f64,
        image_index: usize,
    ) -> Result<()> {
        self.require_phase(
            &[Phase::Populating, Phase::Linked],
            "set_channel_global_min_max",
        )?;
        let graph = &mut self.graph;
        let image = graph.image_registry.get(image_index).ok_or_else(|| {
            AssemblyError::dangling(
                "channel-stats",
                ObjectKind::Image,
                IndexSlot::out_of_range(IMAGE_INDEX, image_index, graph.image_registry.len()),
            )
        })?;
        let image_node = &graph.images[image];
        let pixels = image_node.pixels.first().copied().ok_or_else(|| {
            AssemblyError::dangling(
                &image_node.lsid,
                ObjectKind::Image,
                IndexSlot::out_of_range(PIXELS_INDEX, 0, 0),
            )
        })?;
        let pixels_node = &graph.pixels[pixels];
        let channel = pixels_node
            .channels
            .get(channel_index)
            .copied()
            .ok_or_else(|| {
                AssemblyError::dangling(
                    &pixels_node.lsid,
                    ObjectKind::Pixels,
                    IndexSlot::out_of_range(CHANNEL_INDEX, channel_index, pixels_node.channels.len()),
                )
            })?;

        graph.channels[channel].stats = Some(StatsInfo {
            global_min: min,
            global_max: max,
        });
        debug!(
            "Channel {} of image {} global range [{}, {}]",
            channel_index, image_index, min, max
        );
        Ok(())
    }
}

/// Folds plane samples into per-(image, channel) ranges on the wrapper
/// side, then reports them through the statistics callback.
#[derive(Debug, Clone, Default)]
pub struct MinMaxAccumulator {
    ranges: BTreeMap<(usize, usize), StatsInfo>,
}

impl MinMaxAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// NaN samples are ignored
    pub fn add_plane(&mut self, image_index: usize, channel_index: usize, samples: &[f64]) {
        let (lo, hi) = match samples.iter().copied().filter(|v| !v.is_nan()).minmax() {
            MinMaxResult::NoElements => return,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        self.ranges
            .entry((image_index, channel_index))
            .and_modify(|range| {
                range.global_min = range.global_min.min(lo);
                range.global_max = range.global_max.max(hi);
            })
            .or_insert(StatsInfo {
                global_min: lo,
                global_max: hi,
            });
    }

    pub fn range(&self, image_index: usize, channel_index: usize) -> Option<StatsInfo> {
        self.ranges.get(&(image_index, channel_index)).copied()
    }

    /// Push every accumulated range into the session; returns how many were applied
    pub fn apply(&self, session: &mut ImportSession) -> Result<usize> {
        for (&(image_index, channel_index), range) in &self.ranges {
            session.set_channel_global_min_max(
                channel_index,
                range.global_min,
                range.global_max,
                image_index,
            )?;
        }
        Ok(self.ranges.len())
    }
}
