//! Email parsing: `.eml` files into renderer input values.

pub mod eml;
