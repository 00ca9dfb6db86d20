// utils/currency.rs
/// Convert whole pesos to centavos, the unit processors charge in.
pub fn pesos_to_centavos(pesos: i64) -> i64 {
    pesos * 100
}

/// Format a peso amount for display
pub fn format_pesos(pesos: i64, currency: &str) -> String {
    let sign = if pesos < 0 { "-" } else { "" };
    let digits = pesos.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.00 {}", sign, grouped, currency.to_uppercase())
}
