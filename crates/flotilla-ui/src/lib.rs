mod app;
mod colors;
mod command;
mod detail;
mod forms;
mod users;
mod widgets;

pub use app::{App, Msg, Refresh, Screen, StatusLevel, UiError};
pub use colors::{Theme, ThemeMode};
pub use command::{Command, CommandKind, CommandRegistry, DirectOp, PageKind};
pub use forms::{FormKind, FormOutcome, FormState, FormSubmit};
