// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of hello-cafe.
//
// hello-cafe is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// hello-cafe is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with hello-cafe.  If not,
// see <http://www.gnu.org/licenses/>.

//! # Hangul Initial Consonants
//!
//! Korean users commonly search by typing only the leading consonant (*choseong*) of each syllable:
//! "ㅇㅁㄹㅋㄴ" for "아메리카노". Every item carries a derived index of those initials alongside its
//! name so that search can match against either.
//!
//! Precomposed Hangul syllables occupy the contiguous block U+AC00..=U+D7A3 and are laid out
//! arithmetically: `syllable = 0xAC00 + (initial * 21 + medial) * 28 + final`. Recovering the
//! initial is therefore a division by 588 (21 * 28). The nineteen initials are rendered as Hangul
//! Compatibility Jamo, since that's what a keyboard produces when the user types a bare consonant.

const SYLLABLE_BASE: u32 = 0xac00;
const SYLLABLE_LAST: u32 = 0xd7a3;
/// Number of syllables sharing one initial (21 medials * 28 finals)
const SYLLABLES_PER_INITIAL: u32 = 588;

const INITIALS: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ',
    'ㅍ', 'ㅎ',
];

/// Return the leading consonant of `c`, if `c` is a precomposed Hangul syllable
pub fn initial_of(c: char) -> Option<char> {
    let code = c as u32;
    if (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&code) {
        INITIALS
            .get(((code - SYLLABLE_BASE) / SYLLABLES_PER_INITIAL) as usize)
            .copied()
    } else {
        None
    }
}

/// Compute the initial-consonant index for an item name
///
/// The name is trimmed, then the leading consonant of every Hangul syllable is emitted in order.
/// Anything that isn't a precomposed syllable (Latin letters, digits, bare jamo, punctuation) is
/// skipped, so a name with no syllables at all yields the empty string.
pub fn initials(name: &str) -> String {
    name.trim().chars().filter_map(initial_of).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn americano() {
        assert_eq!("ㅇㅁㄹㅋㄴ", initials("아메리카노"));
        assert_eq!("ㅇㅁㄹㅋㄴ", initials("  아메리카노 \t"));
    }

    #[test]
    fn block_boundaries() {
        assert_eq!(Some('ㄱ'), initial_of('가'));
        assert_eq!(Some('ㅎ'), initial_of('힣'));
        assert_eq!(Some('ㄲ'), initial_of('까'));
        assert_eq!(Some('ㄲ'), initial_of('깋'));
        assert_eq!(None, initial_of('\u{abff}'));
        assert_eq!(None, initial_of('\u{d7a4}'));
    }

    #[test]
    fn mixed_and_empty() {
        assert_eq!("ㅋㅍㄹㄸ", initials("카페 라떼 (ICE)"));
        assert_eq!("ㅊㅋ", initials("Choco 초코 123"));
        assert_eq!("", initials("Cafe Latte"));
        assert_eq!("", initials("   "));
        assert_eq!("", initials("ㅇㅁㄹ"));
    }
}
