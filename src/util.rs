use chrono::Local;
use uuid::Uuid;

pub fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Identifier that scopes one generation's output directory.
pub fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}
