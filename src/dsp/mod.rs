pub mod auto_leveler;
pub mod coefficients;
pub mod controls;
pub mod gain;
pub mod leveler;
pub mod utils;

pub use auto_leveler::{AutoLeveler, BlockStats};
pub use coefficients::{ControlMapper, KnobPositions, MappedControls};
pub use controls::SharedControls;
pub use leveler::{ChannelLeveler, ReleaseLaw};
