pub mod backends;
pub mod preferences;

pub use backends::*;
pub use preferences::MemoryPreferences;

pub mod prelude {
    pub use super::backends::*;
    pub use super::preferences::MemoryPreferences;
    pub use nd_core::{ArticleStore, UserNewsStore};
}
