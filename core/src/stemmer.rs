//! Classical Porter suffix-stripping stemmer.
//!
//! Follows the rule table of M.F. Porter, "An algorithm for suffix
//! stripping" (1980), including the two departures of the reference C
//! implementation (`bli -> ble`, `logi -> log` in step 2). Words of two
//! letters or fewer and words containing non-ASCII bytes are returned as-is.

/// Stem a lowercase word.
pub fn porter_stem(word: &str) -> String {
    if word.len() <= 2 || !word.is_ascii() {
        return word.to_string();
    }

    let mut w = Word {
        b: word.as_bytes().to_vec(),
    };
    w.step1ab();
    w.step1c();
    w.step2();
    w.step3();
    w.step4();
    w.step5();
    w.b.iter().map(|&c| c as char).collect()
}

const STEP2: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("bli", "ble"),
    ("alli", "al"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
    ("logi", "log"),
];

const STEP3: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

// Within a group sharing the same penultimate letter, longer suffixes come first.
const STEP4: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion", "ou",
    "ism", "ate", "iti", "ous", "ive", "ize",
];

struct Word {
    b: Vec<u8>,
}

impl Word {
    fn is_consonant(&self, i: usize) -> bool {
        match self.b[i] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.is_consonant(i - 1),
            _ => true,
        }
    }

    /// Number of vowel-consonant sequences in `b[..len]`, the `m` of `[C](VC)^m[V]`.
    fn measure(&self, len: usize) -> usize {
        let mut i = 0;
        while i < len && self.is_consonant(i) {
            i += 1;
        }
        let mut m = 0;
        loop {
            while i < len && !self.is_consonant(i) {
                i += 1;
            }
            if i >= len {
                return m;
            }
            while i < len && self.is_consonant(i) {
                i += 1;
            }
            m += 1;
        }
    }

    fn has_vowel(&self, len: usize) -> bool {
        (0..len).any(|i| !self.is_consonant(i))
    }

    fn ends_double_consonant(&self, len: usize) -> bool {
        len >= 2 && self.b[len - 1] == self.b[len - 2] && self.is_consonant(len - 1)
    }

    /// `b[..len]` ends consonant-vowel-consonant and the last consonant is not w, x or y.
    fn ends_cvc(&self, len: usize) -> bool {
        if len < 3 {
            return false;
        }
        let i = len - 1;
        self.is_consonant(i - 2)
            && !self.is_consonant(i - 1)
            && self.is_consonant(i)
            && !matches!(self.b[i], b'w' | b'x' | b'y')
    }

    fn ends_with(&self, suffix: &str) -> bool {
        self.b.ends_with(suffix.as_bytes())
    }

    fn last(&self) -> u8 {
        self.b[self.b.len() - 1]
    }

    /// Length of the word with `suffix` removed. Caller checks `ends_with` first.
    fn stem_len(&self, suffix: &str) -> usize {
        self.b.len() - suffix.len()
    }

    fn replace_suffix(&mut self, suffix: &str, replacement: &str) {
        let stem = self.stem_len(suffix);
        self.b.truncate(stem);
        self.b.extend_from_slice(replacement.as_bytes());
    }

    fn step1ab(&mut self) {
        if self.last() == b's' {
            if self.ends_with("sses") {
                self.replace_suffix("sses", "ss");
            } else if self.ends_with("ies") {
                self.replace_suffix("ies", "i");
            } else if self.b[self.b.len() - 2] != b's' {
                self.b.pop();
            }
        }

        if self.ends_with("eed") {
            if self.measure(self.stem_len("eed")) > 0 {
                self.b.pop();
            }
            return;
        }

        let suffix = if self.ends_with("ed") {
            "ed"
        } else if self.ends_with("ing") {
            "ing"
        } else {
            return;
        };
        let stem = self.stem_len(suffix);
        if !self.has_vowel(stem) {
            return;
        }
        self.b.truncate(stem);

        if self.ends_with("at") || self.ends_with("bl") || self.ends_with("iz") {
            self.b.push(b'e');
        } else if self.ends_double_consonant(stem) {
            if !matches!(self.last(), b'l' | b's' | b'z') {
                self.b.pop();
            }
        } else if self.measure(stem) == 1 && self.ends_cvc(stem) {
            self.b.push(b'e');
        }
    }

    fn step1c(&mut self) {
        if self.ends_with("y") && self.has_vowel(self.stem_len("y")) {
            let last = self.b.len() - 1;
            self.b[last] = b'i';
        }
    }

    fn apply_rules(&mut self, rules: &[(&str, &str)]) {
        if let Some(&(suffix, replacement)) = rules.iter().find(|(s, _)| self.ends_with(s)) {
            if self.measure(self.stem_len(suffix)) > 0 {
                self.replace_suffix(suffix, replacement);
            }
        }
    }

    fn step2(&mut self) {
        self.apply_rules(STEP2);
    }

    fn step3(&mut self) {
        self.apply_rules(STEP3);
    }

    fn step4(&mut self) {
        let Some(suffix) = STEP4.iter().copied().find(|s| self.ends_with(s)) else {
            return;
        };
        let stem = self.stem_len(suffix);
        if suffix == "ion" && (stem == 0 || !matches!(self.b[stem - 1], b's' | b't')) {
            return;
        }
        if self.measure(stem) > 1 {
            self.b.truncate(stem);
        }
    }

    fn step5(&mut self) {
        if self.last() == b'e' {
            let stem = self.b.len() - 1;
            let m = self.measure(stem);
            if m > 1 || (m == 1 && !self.ends_cvc(stem)) {
                self.b.pop();
            }
        }
        let len = self.b.len();
        if self.last() == b'l' && self.ends_double_consonant(len) && self.measure(len) > 1 {
            self.b.pop();
        }
    }
}
