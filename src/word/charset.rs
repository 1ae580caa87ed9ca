//! The Digiac typewriter character code.
//!
//! Characters are six bits, packed four to a word with the first character
//! in the most significant position. The same code is used by Type Alpha
//! (output), Type In (keyboard input), and for showing memory as text.

use crate::word::Word;

/// Code that the typewriter skips without printing (BLANK).
pub const BLANK: u8 = 0o66;

/// Stop code; like BLANK it produces no output.
pub const STOP: u8 = 0o57;

/// Carriage return.
pub const CARRIAGE_RETURN: u8 = 0o37;

/// Tab.
pub const TAB: u8 = 0o40;

/// Typewriter glyph for each code. Codes 0o37, 0o40 and 0o57 are control
/// codes and code 0o66 is the blank; they are patched in [`typed`] and
/// [`printable`].
const GLYPHS: [char; 64] = [
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '-', ';', '/', '!', '\'', '=',
    ' ', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', 'J', 'K', 'L', 'M', ',', '\n',
    '\t', 'N', 'O', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z', '.', '\0',
    ')', '±', '@', '#', '$', '%', '¢', '&',
    '*', '(', '_', ':', '?', '°', '"', '+',
];

/// What the typewriter produces for a code, if anything.
pub fn typed(code: u8) -> Option<char> {
    match code & 0o77 {
        BLANK | STOP => None,
        c => Some(GLYPHS[c as usize]),
    }
}

/// A single visible character for a code, with '.' for control codes.
pub fn printable(code: u8) -> char {
    match code & 0o77 {
        CARRIAGE_RETURN | TAB | STOP => '.',
        c => GLYPHS[c as usize],
    }
}

/// The code for a keyboard character, if the typewriter has it.
///
/// Letters are accepted in either case.
pub fn encode(c: char) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    match c {
        '\r' => Some(CARRIAGE_RETURN),
        _ => GLYPHS.iter().position(|&g| g == c).map(|code| code as u8),
    }
}

/// The text a Type Alpha of `word` produces.
pub fn type_word(word: Word, out: &mut String) {
    out.extend(word.char_codes().into_iter().filter_map(typed));
}

/// The word as four printable characters, as shown by `examine`.
pub fn word_chars(word: Word) -> String {
    word.char_codes().into_iter().map(printable).collect()
}

/// Pack text into words, four codes per word, padding the last with BLANK.
///
/// Returns `None` if any character is not in the charset.
pub fn pack(text: &str) -> Option<Vec<Word>> {
    let codes = text.chars().map(encode).collect::<Option<Vec<u8>>>()?;
    Some(
        codes
            .chunks(4)
            .map(|chunk| {
                let mut group = [BLANK; 4];
                group[..chunk.len()].copy_from_slice(chunk);
                Word::from_char_codes(group)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world_words() {
        let mut out = String::new();
        for raw in ["30253434", "42205242", "45342437"] {
            type_word(Word::parse_octal(raw).unwrap(), &mut out);
        }
        assert_eq!(out, "HELLO WORLD\n");
    }

    #[test]
    fn test_blank_and_stop_are_silent() {
        assert_eq!(typed(BLANK), None);
        assert_eq!(typed(STOP), None);
        assert_eq!(typed(0o21), Some('A'));
    }

    #[test]
    fn test_printable() {
        let w = Word::from_char_codes([0o30, CARRIAGE_RETURN, TAB, 0o66]);
        assert_eq!(word_chars(w), "H..¢");
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode('h'), Some(0o30));
        assert_eq!(encode('0'), Some(0));
        assert_eq!(encode('\n'), Some(CARRIAGE_RETURN));
        assert_eq!(encode('\r'), Some(CARRIAGE_RETURN));
        assert_eq!(encode('¢'), Some(BLANK));
        assert_eq!(encode('\0'), Some(STOP));
        assert_eq!(encode('~'), None);
    }

    #[test]
    fn test_encode_inverts_glyphs() {
        for code in 0..64u8 {
            assert_eq!(encode(GLYPHS[code as usize]), Some(code));
        }
    }

    #[test]
    fn test_pack() {
        let words = pack("HELLO").unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(word_chars(words[0]), "HELL");
        assert_eq!(words[1].char_codes(), [0o42, BLANK, BLANK, BLANK]);
        assert!(pack("{").is_none());
    }
}
