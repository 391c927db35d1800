//! Text cleanup and confidence scoring for recognized text.

/// Text shorter than this (in characters) has its confidence halved.
const SHORT_TEXT_CHARS: usize = 10;

/// Normalise recognized text for display.
///
/// Converts CRLF to LF, strips trailing whitespace from each line, collapses
/// runs of blank lines into one and trims leading/trailing blank lines.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.replace("\r\n", "\n").split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
    }
    out
}

/// Score recognized text in `[0, 1]`.
///
/// Starts from the mean of the non-zero per-word confidences (0 when there
/// are none), halves it for very short text and scales it by the share of
/// "ordinary" characters (ASCII letters and digits, whitespace and
/// `.,!?-`). The result is rounded to five decimal places.
pub fn confidence_score(text: &str, word_confidences: &[f64]) -> f64 {
    let text = text.trim();

    let scored: Vec<f64> = word_confidences
        .iter()
        .copied()
        .filter(|c| *c != 0.0)
        .collect();
    let mut confidence = if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64
    };

    let chars = text.chars().count();
    if chars < SHORT_TEXT_CHARS {
        confidence *= 0.5;
    }

    let unusual = text.chars().filter(|c| !is_ordinary(*c)).count();
    confidence *= 1.0 - unusual as f64 / chars.max(1) as f64;

    (confidence.clamp(0.0, 1.0) * 100_000.0).round() / 100_000.0
}

fn is_ordinary(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | '-')
}
