//! Order identifiers: epoch milliseconds followed by a four digit random suffix.
//!
//! Two requests landing in the same millisecond draw from only 10 000 suffixes,
//! so identifiers are not guaranteed to be unique under concurrent load.

use chrono::Utc;
use rand::Rng;

pub fn generate() -> String {
    let suffix = rand::thread_rng().gen_range(0..10_000);
    format_order_id(Utc::now().timestamp_millis(), suffix)
}

fn format_order_id(epoch_millis: i64, suffix: u16) -> String {
    format!("{epoch_millis}{suffix:04}")
}
