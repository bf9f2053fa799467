mod dashboard;
mod export;

pub use dashboard::dashboard;
pub use export::{summary_json, summary_xlsx};
