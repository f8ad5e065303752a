//! quizkit-report — Self-contained HTML reports for graded sessions.

pub mod html;

pub use html::{generate_html, write_html_report};
