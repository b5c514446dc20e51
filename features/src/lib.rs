pub mod descriptor;
pub mod detector;
pub mod estimate;
pub mod matcher;

pub use descriptor::*;
pub use detector::*;
pub use estimate::*;
pub use matcher::*;
