pub mod text_normalizer;
pub mod threads;
