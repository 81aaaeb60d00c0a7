use chrono::NaiveDate;
use qg_metadata::MaskingFn;
use serde_json::Value;

/// Applies a masking function to one cell value (§4.2). Applied
/// post-execution and never to aggregation aliases; `null`/`undefined`
/// values pass through unchanged for every function, and masking is
/// idempotent (re-masking an already-masked value is a no-op in practice
/// since the masked shape no longer carries the original structure).
pub fn mask(value: &Value, f: MaskingFn) -> Value {
    if value.is_null() {
        return value.clone();
    }
    if f == MaskingFn::Number {
        return Value::from(0);
    }
    let Some(s) = value.as_str() else {
        return value.clone();
    };
    let masked = match f {
        MaskingFn::Email => mask_email(s),
        MaskingFn::Phone => mask_phone(s),
        MaskingFn::Name => mask_name(s),
        MaskingFn::Uuid => mask_uuid(s),
        MaskingFn::Number => unreachable!("handled above"),
        MaskingFn::Date => mask_date(s),
        MaskingFn::Full => "***".to_string(),
    };
    Value::String(masked)
}

fn mask_email(s: &str) -> String {
    match s.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            let tld = domain.rsplit('.').next().unwrap_or("");
            format!("{first}***@***.{tld}")
        }
        None => "***".to_string(),
    }
}

fn mask_phone(s: &str) -> String {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 3 {
        return "***".to_string();
    }
    let (cc, last3) = digits.split_at(digits.len() - 3);
    format!("+{cc}***{last3}")
}

fn mask_name(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 2 {
        return "***".to_string();
    }
    let first = chars[0];
    let last = chars[chars.len() - 1];
    let fill = "*".repeat(chars.len() - 2);
    format!("{first}{fill}{last}")
}

fn mask_uuid(s: &str) -> String {
    if s.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &s[..4])
}

fn mask_date(s: &str) -> String {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => format!("{:04}-01-01", d.format("%Y").to_string().parse::<i32>().unwrap_or_default()),
        Err(_) => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_email_preserving_first_char_and_tld() {
        assert_eq!(mask(&json!("alice@example.com"), MaskingFn::Email), json!("a***@***.com"));
        assert_eq!(mask(&json!("no-at-sign"), MaskingFn::Email), json!("***"));
    }

    #[test]
    fn masks_phone_preserving_country_code_and_last_three() {
        assert_eq!(mask(&json!("+15551234567"), MaskingFn::Phone), json!("+15551234***567"));
        assert_eq!(mask(&json!("12"), MaskingFn::Phone), json!("***"));
    }

    #[test]
    fn masks_name_preserving_first_and_last_char() {
        assert_eq!(mask(&json!("Alice"), MaskingFn::Name), json!("A***e"));
        assert_eq!(mask(&json!("Al"), MaskingFn::Name), json!("***"));
    }

    #[test]
    fn masks_uuid_preserving_first_four_chars() {
        assert_eq!(
            mask(&json!("abcdef12-3456-7890"), MaskingFn::Uuid),
            json!("abcd****")
        );
        assert_eq!(mask(&json!("ab"), MaskingFn::Uuid), json!("****"));
    }

    #[test]
    fn masks_number_to_zero() {
        assert_eq!(mask(&json!(42), MaskingFn::Number), json!(0));
        assert_eq!(mask(&json!(42.5), MaskingFn::Number), json!(0));
    }

    #[test]
    fn masks_date_keeping_year() {
        assert_eq!(mask(&json!("2024-06-15"), MaskingFn::Date), json!("2024-01-01"));
        assert_eq!(mask(&json!("garbage"), MaskingFn::Date), json!("***"));
    }

    #[test]
    fn masks_full_unconditionally() {
        assert_eq!(mask(&json!("anything"), MaskingFn::Full), json!("***"));
    }

    #[test]
    fn null_passes_through_for_every_function() {
        for f in [
            MaskingFn::Email,
            MaskingFn::Phone,
            MaskingFn::Name,
            MaskingFn::Uuid,
            MaskingFn::Number,
            MaskingFn::Date,
            MaskingFn::Full,
        ] {
            assert_eq!(mask(&Value::Null, f), Value::Null);
        }
    }
}
