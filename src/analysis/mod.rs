pub mod batch;
pub mod confidence;
pub mod extractor;
pub mod master;
pub mod narrative;
pub mod payload;
pub mod quant;
pub mod single_match;
