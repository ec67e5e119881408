//! pt-BR formatting used in mail bodies.

use chrono::{DateTime, Utc};

/// `dd/MM/yyyy`.
pub fn date(value: &DateTime<Utc>) -> String {
    value.format("%d/%m/%Y").to_string()
}

/// `dd/MM/yyyy HH:mm`.
pub fn date_time(value: &DateTime<Utc>) -> String {
    value.format("%d/%m/%Y %H:%M").to_string()
}

/// Format an amount in cents as Brazilian reais, e.g. `R$ 1.234,56`.
pub fn brl(cents: u64) -> String {
    let reais = (cents / 100).to_string();
    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, digit) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("R$ {grouped},{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn brl_groups_thousands() {
        assert_eq!(brl(0), "R$ 0,00");
        assert_eq!(brl(5), "R$ 0,05");
        assert_eq!(brl(12_990), "R$ 129,90");
        assert_eq!(brl(123_456), "R$ 1.234,56");
        assert_eq!(brl(100_000_000), "R$ 1.000.000,00");
    }

    #[test]
    fn dates_use_day_first() {
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 9, 5, 0).unwrap();
        assert_eq!(date(&t), "10/01/2024");
        assert_eq!(date_time(&t), "10/01/2024 09:05");
    }
}
