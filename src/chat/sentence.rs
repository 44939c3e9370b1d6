use rand::seq::SliceRandom;
use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const EMOJIS: &[&str] = &[
    "😊", "🚀", "🍎", "🌍", "🐶", "🏞️", "🎉", "💡", "⚡", "❤️", "🔥", "🐱", "🌟", "🦄", "🍔", "🏖️",
    "🌈",
];
const EMOJI_CHANCE: f64 = 0.3;

/// Builds a throwaway chat line of random words and emoji, at most
/// `max_len` characters long.
pub fn random_sentence(max_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut sentence = String::new();
    let mut len = 0;

    loop {
        let part = if rng.gen_bool(EMOJI_CHANCE) {
            EMOJIS.choose(&mut rng).copied().unwrap_or("🙂").to_string()
        } else {
            random_word(&mut rng)
        };

        let part_len = part.chars().count();
        let separator = usize::from(len > 0);
        if len + part_len + separator > max_len {
            break;
        }

        if separator == 1 {
            sentence.push(' ');
        }
        sentence.push_str(&part);
        len += part_len + separator;
    }

    sentence
}

fn random_word(rng: &mut impl Rng) -> String {
    let length = rng.gen_range(2..=7);
    (0..length)
        .map(|_| char::from(LETTERS[rng.gen_range(0..LETTERS.len())]))
        .collect()
}
