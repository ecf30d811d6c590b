use crate::common::backend::Element;
use crate::common::error::{DemoError, Result};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use burn_dataset::network::downloader::download_file_as_bytes;
use burn_dataset::{
    Dataset, InMemDataset,
    transform::{Mapper, MapperDataset, PartialDataset, ShuffledDataset},
};
use flate2::read::GzDecoder;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// from the burn-dataset vision source, without pulling the "vision" feature and its dependencies

// CVDF mirror of http://yann.lecun.com/exdb/mnist/
const URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";
const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

pub const WIDTH: usize = 28;
pub const HEIGHT: usize = 28;
pub const NUM_CLASSES: usize = 10;

/// MNIST item.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MnistItem {
    /// Row-major image.
    /// Each value is a brightness, in between 0.0 and 1.0.
    ///
    /// # Shape
    /// [HEIGHT * WIDTH]
    pub image: Vec<Element>,

    /// Label of the image.
    /// Each value is in between 0 and 9.
    pub label: u8,
}

#[derive(Deserialize, Debug, Clone)]
struct MnistItemRaw {
    pub image_bytes: Vec<u8>,
    pub label: u8,
}

struct BytesToImage;

impl Mapper<MnistItemRaw, MnistItem> for BytesToImage {
    /// Scales the brightness bytes into [0, 1].
    fn map(&self, item: &MnistItemRaw) -> MnistItem {
        debug_assert_eq!(item.image_bytes.len(), WIDTH * HEIGHT);

        let image: Vec<Element> = item
            .image_bytes
            .iter()
            .map(|brightness| {
                let scaled: f32 = (*brightness).as_();
                (scaled / 255.0).as_()
            })
            .collect();

        MnistItem {
            image,
            label: item.label,
        }
    }
}

type MappedDataset = MapperDataset<InMemDataset<MnistItemRaw>, BytesToImage, MnistItemRaw>;

/// The MNIST dataset consists of 70,000 28x28 black-and-white images in 10 classes (one for each digits), with 7,000
/// images per class. There are 60,000 training images and 10,000 test images.
///
/// The data is downloaded from the web from the [CVDF mirror](https://github.com/cvdfoundation/mnist).
pub struct MnistDataset {
    dataset: MappedDataset,
}

impl Dataset<MnistItem> for MnistDataset {
    fn get(&self, index: usize) -> Option<MnistItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

/// A shuffled share of the training images.
pub type MnistSplit = PartialDataset<Arc<ShuffledDataset<MnistDataset, MnistItem>>, MnistItem>;

impl MnistDataset {
    /// Creates a new train dataset.
    pub fn train() -> Result<Self> {
        Self::new("train")
    }

    /// Creates a new test dataset.
    pub fn test() -> Result<Self> {
        Self::new("test")
    }

    /// Shuffles the training images with `seed` and holds out the last `validation_ratio` of
    /// them, returning the (train, validation) parts.
    pub fn train_valid_split(validation_ratio: f64, seed: u64) -> Result<(MnistSplit, MnistSplit)> {
        if !(0.0..1.0).contains(&validation_ratio) {
            return Err(DemoError::Dataset(format!(
                "validation ratio {validation_ratio} is not in [0, 1)"
            )));
        }
        let dataset = Arc::new(ShuffledDataset::with_seed(Self::train()?, seed));
        let len = dataset.len();
        let num_valid = (len as f64 * validation_ratio).round() as usize;
        let train = PartialDataset::new(Arc::clone(&dataset), 0, len - num_valid);
        let valid = PartialDataset::new(dataset, len - num_valid, len);
        Ok((train, valid))
    }

    fn new(split: &str) -> Result<Self> {
        let root = MnistDataset::download(split)?;

        // MNIST is tiny so we can load it in-memory
        // Train images (u8): 28 * 28 * 60000 = 47.04Mb
        // Test images (u8): 28 * 28 * 10000 = 7.84Mb
        let images = MnistDataset::read_images(&root, split)?;
        let labels = MnistDataset::read_labels(&root, split)?;
        if images.len() != labels.len() {
            return Err(DemoError::Dataset(format!(
                "{split}: {} images but {} labels",
                images.len(),
                labels.len()
            )));
        }

        let items: Vec<_> = images
            .into_iter()
            .zip(labels)
            .map(|(image_bytes, label)| MnistItemRaw { image_bytes, label })
            .collect();

        let dataset = InMemDataset::new(items);
        let dataset = MapperDataset::new(dataset, BytesToImage);

        Ok(Self { dataset })
    }

    /// Downloads the split files into the burn-dataset cache directory, unless already there.
    fn download(split: &str) -> Result<PathBuf> {
        let cache_dir = dirs::home_dir()
            .ok_or_else(|| DemoError::Dataset("could not get the home directory".to_string()))?
            .join(".cache")
            .join("burn-dataset");
        let split_dir = cache_dir.join("mnist").join(split);

        if !split_dir.exists() {
            create_dir_all(&split_dir)?;
        }

        match split {
            "train" => {
                MnistDataset::download_file(TRAIN_IMAGES, &split_dir)?;
                MnistDataset::download_file(TRAIN_LABELS, &split_dir)?;
            }
            "test" => {
                MnistDataset::download_file(TEST_IMAGES, &split_dir)?;
                MnistDataset::download_file(TEST_LABELS, &split_dir)?;
            }
            _ => return Err(DemoError::Dataset(format!("invalid split {split}"))),
        };

        Ok(split_dir)
    }

    fn download_file<P: AsRef<Path>>(name: &str, dest_dir: &P) -> Result<PathBuf> {
        let file_name = dest_dir.as_ref().join(name);

        if !file_name.exists() {
            log::info!("Downloading {name}");
            let bytes = download_file_as_bytes(&format!("{URL}{name}.gz"), name);
            let mut output_file = File::create(&file_name)?;
            let mut gz_buffer = GzDecoder::new(&bytes[..]);
            std::io::copy(&mut gz_buffer, &mut output_file)?;
        }

        Ok(file_name)
    }

    /// Each image is a vector of bytes.
    fn read_images<P: AsRef<Path>>(root: &P, split: &str) -> Result<Vec<Vec<u8>>> {
        let file_name = if split == "train" {
            TRAIN_IMAGES
        } else {
            TEST_IMAGES
        };
        let mut f = File::open(root.as_ref().join(file_name))?;

        // number of images, from the 16-byte header
        let mut buf = [0u8; 4];
        f.seek(SeekFrom::Start(4))?;
        f.read_exact(&mut buf)?;
        let size = u32::from_be_bytes(buf) as usize;

        let mut buf_images: Vec<u8> = vec![0u8; WIDTH * HEIGHT * size];
        f.seek(SeekFrom::Start(16))?;
        f.read_exact(&mut buf_images)?;

        Ok(buf_images
            .chunks(WIDTH * HEIGHT)
            .map(|chunk| chunk.to_vec())
            .collect())
    }

    fn read_labels<P: AsRef<Path>>(root: &P, split: &str) -> Result<Vec<u8>> {
        let file_name = if split == "train" {
            TRAIN_LABELS
        } else {
            TEST_LABELS
        };
        let mut f = File::open(root.as_ref().join(file_name))?;

        // number of labels, from the 8-byte header
        let mut buf = [0u8; 4];
        f.seek(SeekFrom::Start(4))?;
        f.read_exact(&mut buf)?;
        let size = u32::from_be_bytes(buf) as usize;

        let mut buf_labels: Vec<u8> = vec![0u8; size];
        f.seek(SeekFrom::Start(8))?;
        f.read_exact(&mut buf_labels)?;

        Ok(buf_labels)
    }
}

#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Brightness in between 0.0 and 1.0.
    ///
    /// # Shape
    /// [batch_size, HEIGHT, WIDTH]
    pub images: Tensor<B, 3>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let batch_size = items.len();
        let (images, labels): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.image, item.label as i64))
            .unzip();
        let images: Vec<Element> = images.into_iter().flatten().collect();

        let images = TensorData::new(images, [batch_size, HEIGHT, WIDTH]).convert::<B::FloatElem>();
        let targets = TensorData::new(labels, [batch_size]).convert::<B::IntElem>();

        MnistBatch {
            images: Tensor::from_data(images, device),
            targets: Tensor::from_data(targets, device),
        }
    }
}
