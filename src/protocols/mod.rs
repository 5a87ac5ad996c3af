// Request-side types shared with the serving layer
pub mod common;
