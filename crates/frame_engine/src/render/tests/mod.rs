//! Test support and end-to-end frame pipeline tests

pub mod mock_gpu;

mod frame_pipeline;
