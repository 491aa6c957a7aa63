pub mod history;
pub mod paint_fill;
pub mod tools;
