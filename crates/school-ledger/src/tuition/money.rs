use super::domain::Xof;

/// Currency suffix printed after every amount.
pub const XOF_SUFFIX: &str = " F CFA";

/// Space-grouped integer amount, e.g. `1 234 567 F CFA`.
pub fn format_xof(amount: Xof) -> String {
    let mut formatted = group_thousands(amount);
    formatted.push_str(XOF_SUFFIX);
    formatted
}

/// Digits grouped by three with a plain space, without currency suffix.
pub fn group_thousands(amount: Xof) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        grouped.push('-');
    }

    let lead = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && (index + 3 - lead) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

/// Rounded percentage of `part` over `whole`; zero when nothing is expected.
pub fn percentage(part: Xof, whole: Xof) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 1000.0).round() / 10.0
}
