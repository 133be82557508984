//! Client for the shop's public, unauthenticated item pages

pub mod booth;

pub use booth::{BoothClient, DownloadedImage, PublicItemMeta};
