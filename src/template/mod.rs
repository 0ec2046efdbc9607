pub mod options;
pub mod rule;
pub mod state;
pub mod template;
pub mod value;

pub use options::ValueOption;
pub use rule::{LineOp, RecordOp, Rule};
pub use state::State;
pub use template::Template;
pub use value::Value;
