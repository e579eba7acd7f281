//! Browse vibe encoding files, edit their import settings and inspect the
//! potions a generated image was made from.

pub mod config;
pub mod error;
pub mod potion;
pub mod state;
pub mod thumbnail;

pub use error::{Error, Result};
