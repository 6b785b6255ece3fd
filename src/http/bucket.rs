use http::StatusCode;

/// Classifies a status code by its leading digit.
///
/// Returns one of `"1xx"` to `"5xx"`, or an empty string for codes outside
/// of those classes.
pub fn status_bucket(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "",
    }
}
