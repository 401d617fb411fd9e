mod dataloader;
mod dataset;
mod downscale;
mod ensemble;
mod in_memory;
mod shard;

pub use dataloader::DataLoader;
pub use dataset::Dataset;
pub use downscale::downscale;
pub use ensemble::EnsembleDataset;
pub use in_memory::InMemoryDataset;
pub use shard::shard_range;
