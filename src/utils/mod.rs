pub mod logging;
pub mod time_format;

pub use time_format::{format_duration, format_pill_text, format_timer, local_session_date, session_date};
