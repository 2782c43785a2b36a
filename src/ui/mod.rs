pub mod form_field;
pub mod record_form;
pub mod terminal_guard;

pub use form_field::FormField;
pub use record_form::{display_value, FormAction, RecordForm};
pub use terminal_guard::{install_panic_hook, TerminalGuard, Tui};
