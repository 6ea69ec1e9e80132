pub const PHONE_NUMBER_LEN: usize = 11;

const VISIBLE_PREFIX: usize = 3;
const VISIBLE_SUFFIX: usize = 4;

pub fn is_valid_phone_number(value: &str) -> bool {
    value.len() == PHONE_NUMBER_LEN && value.chars().all(|ch| ch.is_ascii_digit())
}

/// Keeps the first 3 and last 4 characters; anything too short to leave a
/// redacted middle is masked entirely.
pub fn mask_phone_number(value: &str) -> String {
    let chars = value.trim().chars().collect::<Vec<_>>();
    if chars.len() <= VISIBLE_PREFIX + VISIBLE_SUFFIX {
        return "*".repeat(chars.len());
    }

    let head = chars[..VISIBLE_PREFIX].iter().collect::<String>();
    let tail = chars[chars.len() - VISIBLE_SUFFIX..].iter().collect::<String>();
    let hidden = chars.len() - VISIBLE_PREFIX - VISIBLE_SUFFIX;
    format!("{head}{}{tail}", "*".repeat(hidden))
}
