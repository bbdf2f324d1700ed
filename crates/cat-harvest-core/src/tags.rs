//! Tag extraction from breed temperament text.

use crate::models::Breed;

const TEMPERAMENT_SEPARATOR: &str = ", ";

/// Splits the temperament of every breed into tag names.
///
/// Tokens are split on `", "`, trimmed, and empty tokens dropped. A name
/// that appears more than once (within one breed or across breeds) is
/// returned only once, in first-seen order.
pub fn temperament_tags(breeds: &[Breed]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for breed in breeds {
        for token in breed.temperament.split(TEMPERAMENT_SEPARATOR) {
            let token = token.trim();
            if token.is_empty() || names.iter().any(|n| n == token) {
                continue;
            }
            names.push(token.to_string());
        }
    }
    names
}
