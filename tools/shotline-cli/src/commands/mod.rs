pub mod apply;
pub mod paths;
pub mod range;
pub mod script;
