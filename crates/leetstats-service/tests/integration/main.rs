mod cache;
mod upstream;
mod utils;
