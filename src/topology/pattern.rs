//! Topic pattern matching.
//!
//! Routing keys and binding patterns are dot-separated words. In a pattern,
//! `*` stands for exactly one word and `#` for zero or more words.

/// Returns `true` when `routing_key` is routed by a binding with `pattern`.
///
/// ```
/// use petclinic_bus::topology::topic_matches;
///
/// assert!(topic_matches("pet.id.#", "pet.id.42"));
/// assert!(topic_matches("pet.*.42", "pet.id.42"));
/// assert!(!topic_matches("pet.id.#", "other.id.1"));
/// ```
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    // matched[j]: the pattern words consumed so far match the first j key words.
    let mut matched = vec![false; key.len() + 1];
    matched[0] = true;

    let mut previous = None;
    for &word in pattern {
        if word == "#" && previous == Some("#") {
            continue;
        }
        previous = Some(word);

        let mut next = vec![false; key.len() + 1];
        match word {
            "#" => {
                let mut reachable = false;
                for (j, slot) in next.iter_mut().enumerate() {
                    reachable |= matched[j];
                    *slot = reachable;
                }
            }
            "*" => {
                for j in 1..=key.len() {
                    next[j] = matched[j - 1];
                }
            }
            literal => {
                for j in 1..=key.len() {
                    next[j] = matched[j - 1] && key[j - 1] == literal;
                }
            }
        }
        matched = next;
    }

    matched[key.len()]
}
