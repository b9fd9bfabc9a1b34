pub mod io;
pub mod traits;
pub mod u8;

pub use self::traits::{ImageView, Rows};
pub use self::u8::{ImageError, ImageU8};
