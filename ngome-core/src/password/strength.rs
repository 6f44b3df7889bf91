//! Password strength estimation
//!
//! A deterministic entropy-based estimator producing a 0-4 score, a coarse
//! strength label, a human-readable crack-time estimate, and actionable
//! feedback. The estimator is monotonic: appending characters or adding a
//! new character class never lowers the score of the same base password.

use serde::Serialize;

use super::common::is_common_password;

/// Assumed offline attack rate, guesses per second.
const GUESSES_PER_SECOND: f64 = 1e10;

/// Coarse strength label derived from the 0-4 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => Strength::Weak,
            2 => Strength::Medium,
            3 => Strength::Strong,
            _ => Strength::VeryStrong,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Medium => "medium",
            Strength::Strong => "strong",
            Strength::VeryStrong => "very-strong",
        }
    }
}

/// User-facing guidance accompanying a score.
#[derive(Debug, Clone, Serialize)]
pub struct Feedback {
    pub warning: Option<String>,
    pub suggestions: Vec<String>,
}

/// Full result of a strength evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct StrengthReport {
    /// 0 (trivially guessable) through 4 (resistant to offline attack).
    pub score: u8,
    pub strength: Strength,
    pub crack_time_display: String,
    pub feedback: Feedback,
}

/// Estimate the strength of a password.
///
/// Entropy is modeled as `length * log2(charset)`, where the charset is the
/// union of the character classes actually present. Membership in the
/// known-weak list floors the score at 0 regardless of composition.
pub fn score_strength(password: &str) -> StrengthReport {
    if password.is_empty() {
        return StrengthReport {
            score: 0,
            strength: Strength::Weak,
            crack_time_display: "instantly".to_string(),
            feedback: Feedback {
                warning: Some("Password is empty".to_string()),
                suggestions: vec!["Choose a password of at least 8 characters".to_string()],
            },
        };
    }

    if is_common_password(password) {
        return StrengthReport {
            score: 0,
            strength: Strength::Weak,
            crack_time_display: "instantly".to_string(),
            feedback: Feedback {
                warning: Some("This is one of the most commonly used passwords".to_string()),
                suggestions: vec!["Choose a password attackers will not try first".to_string()],
            },
        };
    }

    let entropy = entropy_bits(password);
    let score = score_from_bits(entropy);
    let seconds = crack_seconds(entropy);

    StrengthReport {
        score,
        strength: Strength::from_score(score),
        crack_time_display: humanize_seconds(seconds),
        feedback: build_feedback(password, score),
    }
}

fn entropy_bits(password: &str) -> f64 {
    let mut charset = 0u32;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        charset += 26;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        charset += 26;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        charset += 10;
    }
    if password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        charset += 33;
    }
    if password.chars().any(|c| !c.is_ascii()) {
        charset += 64;
    }
    // Whitespace-only input still draws from some alphabet
    let charset = charset.max(2) as f64;

    password.chars().count() as f64 * charset.log2()
}

fn score_from_bits(bits: f64) -> u8 {
    if bits < 28.0 {
        0
    } else if bits < 40.0 {
        1
    } else if bits < 60.0 {
        2
    } else if bits < 80.0 {
        3
    } else {
        4
    }
}

fn crack_seconds(bits: f64) -> f64 {
    // Expected guesses to hit the password is half the keyspace
    (bits - 1.0).exp2() / GUESSES_PER_SECOND
}

fn humanize_seconds(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3600.0;
    const DAY: f64 = 86_400.0;
    const YEAR: f64 = 365.25 * DAY;
    const CENTURY: f64 = 100.0 * YEAR;

    if seconds < 1.0 {
        "instantly".to_string()
    } else if seconds < MINUTE {
        format!("{} seconds", seconds.round() as u64)
    } else if seconds < HOUR {
        format!("{} minutes", (seconds / MINUTE).round() as u64)
    } else if seconds < DAY {
        format!("{} hours", (seconds / HOUR).round() as u64)
    } else if seconds < YEAR {
        format!("{} days", (seconds / DAY).round() as u64)
    } else if seconds < CENTURY {
        format!("{} years", (seconds / YEAR).round() as u64)
    } else {
        "centuries".to_string()
    }
}

fn build_feedback(password: &str, score: u8) -> Feedback {
    let mut suggestions = Vec::new();

    if password.chars().count() < 12 {
        suggestions.push("Use 12 or more characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        suggestions.push("Add uppercase letters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        suggestions.push("Add numbers".to_string());
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        suggestions.push("Add special characters (!@#$%...)".to_string());
    }

    let warning = if score == 0 {
        Some("This password could be guessed almost immediately".to_string())
    } else if score == 1 {
        Some("This password would not survive an offline attack".to_string())
    } else {
        None
    };

    Feedback {
        warning,
        suggestions,
    }
}
