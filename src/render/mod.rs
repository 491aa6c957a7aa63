pub mod compositor;
pub mod renderer;

pub use compositor::BlendMode;
pub use renderer::{render_full, render_incremental, render_operation};
