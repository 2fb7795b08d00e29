pub mod id;
pub mod sync;
pub mod types;

pub use sync::AccountSynchronizer;
pub use types::*;
