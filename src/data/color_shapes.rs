use crate::data::Whitening;
use crate::error::{Error, Result};
use burn::data::dataset::{Dataset, InMemDataset};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// RGB.
pub const CHANNELS: usize = 3;
/// Background and target.
pub const NUM_OUTPUTS: usize = 2;

// keeps the test stream apart from the training one for the same seed
const TEST_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Config, Debug)]
pub struct ColorShapesConfig {
    #[config(default = 64)]
    pub width: usize,
    #[config(default = 64)]
    pub height: usize,
    #[config(default = 512)]
    pub num_train: usize,
    #[config(default = 32)]
    pub num_test: usize,
    /// Each image has between one and this many blobs.
    #[config(default = 6)]
    pub max_shapes: usize,
    /// Smallest blob extent, in pixels.
    #[config(default = 4)]
    pub min_size: usize,
    #[config(default = 0)]
    pub seed: u64,
}

impl ColorShapesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Dataset(format!(
                "empty images ({}x{})",
                self.height, self.width
            )));
        }
        if self.max_shapes == 0 || self.min_size == 0 {
            return Err(Error::Dataset(
                "max_shapes and min_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One generated image and its segmentation mask.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ColorShapesItem {
    /// Planar RGB, each value in between 0.0 and 1.0.
    ///
    /// # Shape
    /// [CHANNELS * height * width]
    pub image: Vec<f32>,
    /// Class of each pixel: 1 for the red blobs, 0 elsewhere.
    ///
    /// # Shape
    /// [height * width]
    pub mask: Vec<u8>,
    pub height: usize,
    pub width: usize,
}

enum Blob {
    Rect {
        top: usize,
        left: usize,
        height: usize,
        width: usize,
    },
    Disk {
        cy: f32,
        cx: f32,
        radius: f32,
    },
}

impl Blob {
    fn random<R: Rng>(rng: &mut R, config: &ColorShapesConfig) -> Self {
        let (h, w) = (config.height, config.width);
        let max_size = (h.min(w) / 2).max(config.min_size);
        let mut extent = |limit: usize| {
            let size = rng.random_range(config.min_size..=max_size);
            size.min(limit)
        };
        let (height, width) = (extent(h), extent(w));
        if rng.random_bool(0.5) {
            let top = rng.random_range(0..=h - height);
            let left = rng.random_range(0..=w - width);
            Blob::Rect {
                top,
                left,
                height,
                width,
            }
        } else {
            let radius = height.min(width) as f32 / 2.0;
            let cy = rng.random_range(0.0..h as f32);
            let cx = rng.random_range(0.0..w as f32);
            Blob::Disk { cy, cx, radius }
        }
    }

    fn contains(&self, y: usize, x: usize) -> bool {
        match *self {
            Blob::Rect {
                top,
                left,
                height,
                width,
            } => (top..top + height).contains(&y) && (left..left + width).contains(&x),
            Blob::Disk { cy, cx, radius } => {
                let dy = y as f32 + 0.5 - cy;
                let dx = x as f32 + 0.5 - cx;
                dy * dy + dx * dx <= radius * radius
            }
        }
    }
}

/// Red dominant.
fn target_color<R: Rng>(rng: &mut R) -> [f32; CHANNELS] {
    [
        rng.random_range(0.7..1.0),
        rng.random_range(0.0..0.3),
        rng.random_range(0.0..0.3),
    ]
}

/// Green or blue dominant.
fn distractor_color<R: Rng>(rng: &mut R) -> [f32; CHANNELS] {
    let mut color = [
        rng.random_range(0.0..0.4),
        rng.random_range(0.0..0.4),
        rng.random_range(0.0..0.4),
    ];
    let dominant = rng.random_range(1..CHANNELS);
    color[dominant] = rng.random_range(0.6..1.0);
    color
}

/// Draws a noisy background and paints blobs over it, later blobs covering earlier ones.
pub fn generate_item<R: Rng>(rng: &mut R, config: &ColorShapesConfig) -> ColorShapesItem {
    let (height, width) = (config.height, config.width);
    let plane = height * width;
    let mut image = vec![0f32; CHANNELS * plane];
    let mut mask = vec![0u8; plane];

    let base: f32 = rng.random_range(0.1..0.4);
    for v in image.iter_mut() {
        *v = (base + rng.random_range(-0.05..0.05)).clamp(0.0, 1.0);
    }

    let num_shapes = rng.random_range(1..=config.max_shapes);
    for _ in 0..num_shapes {
        let is_target = rng.random_bool(0.5);
        let color = if is_target {
            target_color(rng)
        } else {
            distractor_color(rng)
        };
        let blob = Blob::random(rng, config);
        for y in 0..height {
            for x in 0..width {
                if !blob.contains(y, x) {
                    continue;
                }
                let p = y * width + x;
                for (c, value) in color.iter().enumerate() {
                    image[c * plane + p] = *value;
                }
                mask[p] = is_target as u8;
            }
        }
    }

    ColorShapesItem {
        image,
        mask,
        height,
        width,
    }
}

/// Number of batches needed to go over `len` items, counting the last partial one.
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    len.div_ceil(batch_size.max(1))
}

/// In-memory images of red, green and blue blobs, generated deterministically from the seed.
pub struct ColorShapesDataset {
    dataset: InMemDataset<ColorShapesItem>,
    split: &'static str,
    height: usize,
    width: usize,
}

impl Dataset<ColorShapesItem> for ColorShapesDataset {
    fn get(&self, index: usize) -> Option<ColorShapesItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl ColorShapesDataset {
    /// Creates a new train dataset.
    pub fn train(config: &ColorShapesConfig) -> Result<Self> {
        Self::new(config, "train", config.num_train, config.seed)
    }

    /// Creates a new test dataset.
    pub fn test(config: &ColorShapesConfig) -> Result<Self> {
        Self::new(config, "test", config.num_test, config.seed ^ TEST_STREAM)
    }

    fn new(config: &ColorShapesConfig, split: &'static str, len: usize, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let items: Vec<_> = (0..len).map(|_| generate_item(&mut rng, config)).collect();
        Ok(Self {
            dataset: InMemDataset::new(items),
            split,
            height: config.height,
            width: config.width,
        })
    }

    pub fn split(&self) -> &str {
        self.split
    }

    /// Per-channel statistics of this split.
    pub fn whitening(&self) -> Whitening {
        let plane = self.height * self.width;
        let items: Vec<ColorShapesItem> = self.dataset.iter().collect();
        Whitening::from_images(items.iter().map(|item| item.image.as_slice()), plane)
    }

    /// Fraction of pixels labeled as target.
    pub fn target_ratio(&self) -> f32 {
        let (targets, total) = self.dataset.iter().fold((0usize, 0usize), |(t, n), item| {
            let hits = item.mask.iter().filter(|class| **class == 1).count();
            (t + hits, n + item.mask.len())
        });
        if total == 0 {
            0.0
        } else {
            targets as f32 / total as f32
        }
    }

    pub fn print(&self) {
        log::info!(
            "color shapes {}: {} images of {}x{}x{}, {} classes, {:.1}% target pixels",
            self.split,
            self.len(),
            self.height,
            self.width,
            CHANNELS,
            NUM_OUTPUTS,
            100.0 * self.target_ratio()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ColorShapesConfig {
        ColorShapesConfig::new()
            .with_width(16)
            .with_height(8)
            .with_num_train(6)
            .with_num_test(3)
    }

    #[test]
    fn items_have_the_configured_shape() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(1);
        let item = generate_item(&mut rng, &config);
        assert_eq!(CHANNELS * 8 * 16, item.image.len());
        assert_eq!(8 * 16, item.mask.len());
        assert!(item.image.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(item.mask.iter().all(|class| (*class as usize) < NUM_OUTPUTS));
    }

    #[test]
    fn target_pixels_are_red_dominant() {
        let config = small_config().with_max_shapes(8);
        let mut rng = StdRng::seed_from_u64(7);
        let plane = 8 * 16;
        for _ in 0..20 {
            let item = generate_item(&mut rng, &config);
            for (p, class) in item.mask.iter().enumerate() {
                let [r, g, b] = [0, 1, 2].map(|c| item.image[c * plane + p]);
                if *class == 1 {
                    assert!(r >= 0.7 && g < 0.3 && b < 0.3, "pixel {p}: {r} {g} {b}");
                } else {
                    assert!(r < 0.7, "pixel {p}: {r} {g} {b}");
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let config = small_config().with_seed(3);
        let a = ColorShapesDataset::train(&config).unwrap();
        let b = ColorShapesDataset::train(&config).unwrap();
        assert_eq!(6, a.len());
        for i in 0..a.len() {
            let (x, y) = (a.get(i).unwrap(), b.get(i).unwrap());
            assert_eq!(x.image, y.image);
            assert_eq!(x.mask, y.mask);
        }

        let test = ColorShapesDataset::test(&config).unwrap();
        assert_eq!(3, test.len());
        assert_ne!(a.get(0).unwrap().image, test.get(0).unwrap().image);
    }

    #[test]
    fn empty_images_are_rejected() {
        let config = small_config().with_width(0);
        assert!(matches!(
            ColorShapesDataset::train(&config),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn batch_count_includes_the_partial_batch() {
        assert_eq!(3, batch_count(10, 4));
        assert_eq!(2, batch_count(8, 4));
        assert_eq!(0, batch_count(0, 4));
    }
}
