pub mod bitmap;
pub mod error;
pub mod registry;
pub mod renderer;
pub mod request;
