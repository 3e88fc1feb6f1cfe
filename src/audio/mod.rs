pub mod append_buffer;
pub mod constants;
pub mod envelope;
pub mod fft_engine;
pub mod memory_sequence;
pub mod read_cache;
pub mod sample_format;
pub mod sequence;
pub mod spectrum;
pub mod summary;
pub mod window_functions;
