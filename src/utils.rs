const VISIBLE_CHARS: usize = 3;
const MIN_VISIBLE_LEN: usize = 6;

/// Mask an identifier for log output.
///
/// Ids longer than six characters keep their first and last three
/// characters; anything shorter is fully masked.
pub fn anonymize(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= MIN_VISIBLE_LEN {
        return "*".repeat(chars.len().max(1));
    }

    let head: String = chars[..VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE_CHARS..].iter().collect();
    format!("{}**{}", head, tail)
}
