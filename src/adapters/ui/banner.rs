//! Startup banner with a vertical gradient (TG-EXPORT).

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

/// Telegram blue (#229ed9).
const TG_BLUE: (u8, u8, u8) = (0x22, 0x9e, 0xd9);
/// Cyber Green (#0ff0fc).
const CYBER_GREEN: (u8, u8, u8) = (0x0f, 0xf0, 0xfc);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let r = (f64::from(a.0) * (1.0 - t) + f64::from(b.0) * t).round() as u8;
    let g = (f64::from(a.1) * (1.0 - t) + f64::from(b.1) * t).round() as u8;
    let bl = (f64::from(a.2) * (1.0 - t) + f64::from(b.2) * t).round() as u8;
    (r, g, bl)
}

/// Banner art; plain title if the built-in font cannot render it.
fn render(title: &str) -> String {
    FIGfont::standard()
        .ok()
        .and_then(|font| font.convert(title).map(|figure| figure.to_string()))
        .unwrap_or_else(|| format!("{}\n", title))
}

/// Prints "TG-EXPORT" in figlet art, fading from Telegram blue to green, then the version.
pub fn print_welcome() {
    let mut out = stdout();
    let art = render("TG-EXPORT");
    let lines: Vec<&str> = art.lines().collect();
    let total = lines.len().max(1);

    for (i, line) in lines.iter().enumerate() {
        let t = if total <= 1 {
            1.0
        } else {
            i as f64 / (total - 1) as f64
        };
        let (r, g, b) = lerp_rgb(TG_BLUE, CYBER_GREEN, t);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let version = env!("CARGO_PKG_VERSION");
    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: CYBER_GREEN.0,
        g: CYBER_GREEN.1,
        b: CYBER_GREEN.2,
    }));
    let _ = out.execute(Print(format!("v{}  chat & media export\r\n", version)));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(lerp_rgb(TG_BLUE, CYBER_GREEN, 0.0), TG_BLUE);
        assert_eq!(lerp_rgb(TG_BLUE, CYBER_GREEN, 1.0), CYBER_GREEN);
    }

    #[test]
    fn test_render_is_multiline() {
        assert!(render("TG-EXPORT").lines().count() > 1);
    }
}
