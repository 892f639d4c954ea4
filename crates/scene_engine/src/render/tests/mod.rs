//! Frame pipeline tests running full scenes against the recording backend

mod frame_pipeline;
