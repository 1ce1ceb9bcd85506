mod loader;
mod types;

pub use loader::{CONFIG_FILE_NAME, load};
pub use types::{Config, ConversionConfig};
