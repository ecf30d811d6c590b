mod block;
mod network;
mod skip;

pub use block::{ConvBlock, ConvBlockConfig, UpBlock, UpBlockConfig};
pub use network::{UNet, UNetConfig};
pub use skip::{SkipRecord, SkipStack};
