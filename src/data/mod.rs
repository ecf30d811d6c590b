//! Synthetic color segmentation data: images of colored blobs, where the red ones are to be segmented.

mod batcher;
mod color_shapes;
mod whitening;

pub use batcher::{ColorShapesBatcher, SegmentationBatch};
pub use color_shapes::{
    CHANNELS, ColorShapesConfig, ColorShapesDataset, ColorShapesItem, NUM_OUTPUTS, batch_count,
    generate_item,
};
pub use whitening::Whitening;
