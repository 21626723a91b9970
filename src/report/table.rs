//! Console tables and number formatting

use console::style;
use prettytable::{format, Cell, Row, Table};

// ============================================
// FORMATTERS
// ============================================

/// `1234567.891` → `"1,234,567.89"` with `decimals` fraction digits
pub fn thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn usd(value: f64) -> String {
    dollars(value, 2, false)
}

pub fn usd0(value: f64) -> String {
    dollars(value, 0, false)
}

pub fn signed_usd(value: f64) -> String {
    dollars(value, 2, true)
}

fn dollars(value: f64, decimals: usize, signed: bool) -> String {
    let body = thousands(value.abs(), decimals);
    if value < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-${}", body)
    } else if signed {
        format!("+${}", body)
    } else {
        format!("${}", body)
    }
}

pub fn pct(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn signed_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

pub fn opt_usd(value: Option<f64>) -> String {
    value.map(usd).unwrap_or_else(|| "N/A".to_string())
}

pub fn opt_pct(value: Option<f64>) -> String {
    value.map(pct).unwrap_or_else(|| "N/A".to_string())
}

/// `═══ TITLE ═══` section header
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("═══ {} ═══", title)).cyan().bold());
    println!();
}

// ============================================
// TABLE
// ============================================

/// Borderless table with a bold title row
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(
        headers.iter().map(|h| Cell::new(h).style_spec("Fb")).collect(),
    ));
    table
}

/// First cell left-aligned, numeric cells after it right-aligned
pub fn numeric_row(cells: Vec<String>) -> Row {
    Row::new(
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == 0 {
                    Cell::new(cell)
                } else {
                    Cell::new(cell).style_spec("r")
                }
            })
            .collect(),
    )
}
