mod instance;
mod session;
mod settings;
mod table;

pub use instance::*;
pub use session::*;
pub use settings::*;
pub use table::*;
