use chrono::{DateTime, Local};

/// Local-time stamp embedded in output file names, e.g. `20240309_140507`.
pub fn output_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn now() -> DateTime<Local> {
    Local::now()
}
