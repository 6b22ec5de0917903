pub mod bcd;
pub mod bitmap;
pub mod chain;
pub mod codec;
pub mod config;
pub mod dir;
pub mod error;
pub mod image;
pub mod layout;
pub mod mbr;
pub mod resolve;
pub mod volume;
