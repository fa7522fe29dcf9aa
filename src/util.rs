use chrono::NaiveDate;

pub(crate) const MM_PER_INCH: f64 = 25.4;

pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().and_then(|s| {
        if s.is_empty() || s.contains(':') {
            None
        } else {
            Some(s.to_string())
        }
    })
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Calendar date from the leading `YYYY-MM-DD` of a timestamp.
///
/// Accepts `2021-03-15`, `2021-03-15T00:00:00` and `2021-03-15 00:00:00+00:00`.
pub(crate) fn leading_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10)?;
    if s.len() > 10 && !matches!(s.as_bytes()[10], b'T' | b' ') {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub(crate) fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

pub(crate) fn inches_to_mm(inches: f64) -> f64 {
    inches * MM_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_slash() {
        assert_eq!(urljoin("https://openet-api.org/", "/account/status"), "https://openet-api.org/account/status");
        assert_eq!(urljoin("https://openet-api.org", "account/status"), "https://openet-api.org/account/status");
        assert_eq!(urljoin("https://a.org", "https://b.org/x"), "https://b.org/x");
    }

    #[test]
    fn filename_from_signed_url() {
        assert_eq!(
            guess_filename_from_url("https://storage.googleapis.com/bucket/export_123.csv?X-Goog-Signature=abc"),
            Some("export_123.csv".to_string())
        );
        assert_eq!(guess_filename_from_url("https://storage.googleapis.com/"), None);
    }

    #[test]
    fn leading_date_accepts_timestamps() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 15).unwrap();
        assert_eq!(leading_date("2021-03-15"), Some(d));
        assert_eq!(leading_date("2021-03-15T00:00:00"), Some(d));
        assert_eq!(leading_date("2021-03-15 00:00:00+00:00"), Some(d));
        assert_eq!(leading_date("2021-03-150"), None);
        assert_eq!(leading_date("15/03/2021"), None);
        assert_eq!(leading_date("202"), None);
    }

    #[test]
    fn unit_conversion_round_trips() {
        for v in [0.0, 1.0, 25.4, 3.14159, 1234.5678, 1e-6] {
            assert!((inches_to_mm(mm_to_inches(v)) - v).abs() < 1e-9);
            assert!((mm_to_inches(inches_to_mm(v)) - v).abs() < 1e-9);
        }
        assert!((mm_to_inches(25.4) - 1.0).abs() < 1e-12);
    }
}
