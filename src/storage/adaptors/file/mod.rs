mod file_backend;

pub use file_backend::*;
