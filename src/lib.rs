pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod table;
pub mod template;

pub use config::Config;
pub use error::{Error, Result};
pub use record::{Cell, ListItem, Record};
pub use table::Table;
pub use template::Template;
