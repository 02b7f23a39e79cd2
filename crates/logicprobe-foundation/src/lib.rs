pub mod buffer;
pub mod config;
pub mod error;
pub mod notify;
pub mod state;

pub use buffer::*;
pub use config::*;
pub use error::*;
pub use notify::*;
pub use state::*;
