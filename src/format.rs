use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of process names in tables.
pub const NAME_WIDTH: usize = 30;

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

/// Left-aligns `s` in `width` display columns, truncating when longer.
pub fn pad_unicode(s: &str, width: usize) -> String {
    let mut out = truncate_unicode(s, width);
    let fill = width.saturating_sub(out.width());
    out.extend(std::iter::repeat_n(' ', fill));
    out
}

/// `Xd Yh Zm`.
pub fn format_uptime(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    format!("{days}d {hours}h {minutes}m")
}

pub fn format_gb(gb: f64) -> String {
    format!("{gb:.1} GB")
}

pub fn format_pct(pct: f32) -> String {
    format!("{pct:.1}%")
}

pub fn or_na<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| "N/A".to_string())
}
