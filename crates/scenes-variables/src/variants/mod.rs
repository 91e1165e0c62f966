//! Concrete variable kinds

pub mod constant;
pub mod custom;
pub mod test;
pub mod text_box;

pub use constant::{ConstantVariable, ConstantVariableState};
pub use custom::{CustomOptions, CustomVariable};
pub use test::{query_metric_tree, TestOptions, TestVariable};
pub use text_box::{TextBoxVariable, TextBoxVariableState};
