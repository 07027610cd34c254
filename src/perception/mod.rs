pub mod box_parser;
pub mod screenshot;
pub mod types;
