pub mod nal_splitter;

pub use nal_splitter::{NalSplitter, NAL_DELIMITER};
