use std::collections::HashSet;

use regex::Regex;

use super::Tokenizer;

/// Prefixes that keep their trailing period (English)
const NONBREAKING_PREFIXES: &[&str] = &[
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z", "Adj", "Adm", "Adv", "Asst", "Bart", "Bldg", "Brig",
    "Bros", "Capt", "Cmdr", "Col", "Comdr", "Con", "Corp", "Cpl", "DR", "Dr", "Drs", "Ens",
    "Gen", "Gov", "Hon", "Hr", "Hosp", "Insp", "Lt", "MM", "MR", "MRS", "MS", "Maj", "Messrs",
    "Mlle", "Mme", "Mr", "Mrs", "Ms", "Msgr", "Op", "Ord", "Pfc", "Ph", "Prof", "Pvt", "Rep",
    "Reps", "Res", "Rev", "Rt", "Sen", "Sens", "Sfc", "Sgt", "Sr", "St", "Supt", "Surg", "v",
    "vs", "i.e", "rev", "e.g", "Nos", "Nr", "Jan", "Feb", "Mar", "Apr", "Jun", "Jul", "Aug",
    "Sep", "Oct", "Nov", "Dec", "Jr",
];

/// Prefixes that keep their period only before a number ("No. 5")
const NUMERIC_ONLY_PREFIXES: &[&str] = &["No", "Art", "pp"];

const XML_ESCAPES: &[(&str, &str)] = &[
    ("&", "&amp;"),
    ("|", "&#124;"),
    ("<", "&lt;"),
    (">", "&gt;"),
    ("'", "&apos;"),
    ("\"", "&quot;"),
    ("[", "&#91;"),
    ("]", "&#93;"),
];

const CONTRACTION_SUFFIXES: &[&str] = &["'s", "'re", "'ve", "'ll", "'d", "'m", "'t", "n't"];

fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).expect("tokenizer pattern must compile")
}

/// Moses-compatible English word tokenizer
pub struct MosesTokenizer {
    dedup_space: Regex,
    ascii_junk: Regex,
    pad_not_alnum: Regex,
    multidot: Regex,
    multidot_split: Regex,
    multidot_join: Regex,
    comma_rules: Vec<(Regex, &'static str)>,
    apostrophe_rules: Vec<(Regex, &'static str)>,
    trailing_dot_apostrophe: Regex,
    leading_digits: Regex,
    closing_punct: Regex,
    opening_punct: Regex,
    nonbreaking: HashSet<&'static str>,
    numeric_only: HashSet<&'static str>,
}

impl Default for MosesTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MosesTokenizer {
    pub fn new() -> Self {
        Self {
            dedup_space: rule(r"\s+"),
            ascii_junk: rule(r"[\x00-\x1f]"),
            pad_not_alnum: rule(r"([^\p{L}\p{M}\p{N}\s\.'`,\-])"),
            multidot: rule(r"\.(\.+)"),
            multidot_split: rule(r"DOTMULTI\.([^\.])"),
            multidot_join: rule(r"DOTMULTI\."),
            comma_rules: vec![
                (rule(r"([^\p{N}]),"), "${1} , "),
                (rule(r",([^\p{N}])"), " , ${1}"),
                (rule(r"(\p{N}),$"), "${1} , "),
            ],
            apostrophe_rules: vec![
                (rule(r"([^\p{L}\p{M}])'([^\p{L}\p{M}])"), "${1} ' ${2}"),
                (rule(r"([^\p{L}\p{M}\p{N}])'([\p{L}\p{M}])"), "${1} ' ${2}"),
                (rule(r"([\p{L}\p{M}])'([^\p{L}\p{M}])"), "${1} ' ${2}"),
                (rule(r"([\p{L}\p{M}])'([\p{L}\p{M}])"), "${1} '${2}"),
                (rule(r"(\p{N})'(s)"), "${1} '${2}"),
            ],
            trailing_dot_apostrophe: rule(r"\.' ?$"),
            leading_digits: rule(r"^[0-9]+"),
            closing_punct: rule(r"^[,\.\?!:;\\%\}\]\)]+$"),
            opening_punct: rule(r"^[\(\[\{\p{Sc}¿¡]+$"),
            nonbreaking: NONBREAKING_PREFIXES.iter().copied().collect(),
            numeric_only: NUMERIC_ONLY_PREFIXES.iter().copied().collect(),
        }
    }

    fn replace_multidots(&self, text: &str) -> String {
        let mut text = self.multidot.replace_all(text, " DOTMULTI${1}").into_owned();
        while text.contains("DOTMULTI.") {
            text = self.multidot_split.replace_all(&text, "DOTDOTMULTI ${1}").into_owned();
            text = self.multidot_join.replace_all(&text, "DOTDOTMULTI").into_owned();
        }
        text
    }

    fn restore_multidots(text: &str) -> String {
        let mut text = text.to_string();
        while text.contains("DOTDOTMULTI") {
            text = text.replace("DOTDOTMULTI", "DOTMULTI.");
        }
        text.replace("DOTMULTI", ".")
    }

    /// Split "word." into "word ." unless the period belongs to the word
    fn handle_nonbreaking_prefixes(&self, text: &str) -> String {
        let mut tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let count = tokens.len();

        for i in 0..count {
            let Some(prefix) = tokens[i].strip_suffix('.').map(str::to_string) else {
                continue;
            };
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                continue;
            }

            let next = tokens.get(i + 1);
            let keeps_period = (prefix.contains('.') && prefix.chars().any(char::is_alphabetic))
                || (self.nonbreaking.contains(prefix.as_str())
                    && !self.numeric_only.contains(prefix.as_str()))
                || next
                    .and_then(|t| t.chars().next())
                    .is_some_and(char::is_lowercase)
                || (self.numeric_only.contains(prefix.as_str())
                    && next.is_some_and(|t| self.leading_digits.is_match(t)));

            if !keeps_period {
                tokens[i] = format!("{} .", prefix);
            }
        }

        tokens.join(" ")
    }

    fn escape_xml(text: &str) -> String {
        XML_ESCAPES
            .iter()
            .fold(text.to_string(), |acc, (raw, escaped)| acc.replace(raw, escaped))
    }

    fn unescape_xml(token: &str) -> String {
        // `&amp;` last so "&amp;lt;" stays "&lt;"
        XML_ESCAPES
            .iter()
            .rev()
            .fold(token.to_string(), |acc, (raw, escaped)| acc.replace(escaped, raw))
    }
}

impl Tokenizer for MosesTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let text = self.dedup_space.replace_all(text, " ");
        let text = self.ascii_junk.replace_all(&text, "");
        let text = self.pad_not_alnum.replace_all(text.trim(), " ${1} ");
        let mut text = self.replace_multidots(&text);

        for (pattern, replacement) in self.comma_rules.iter().chain(&self.apostrophe_rules) {
            text = pattern.replace_all(&text, *replacement).into_owned();
        }

        let text = self.handle_nonbreaking_prefixes(&text);
        let text = self.dedup_space.replace_all(text.trim(), " ");
        let text = self.trailing_dot_apostrophe.replace_all(&text, " . ' ");
        let text = Self::restore_multidots(&text);
        let text = Self::escape_xml(&text);

        text.split_whitespace().map(str::to_string).collect()
    }

    fn detokenize(&self, tokens: &[String]) -> String {
        let mut out = String::new();
        let mut glue_next = true;
        let mut open_double = false;
        let mut open_single = false;

        for raw in tokens {
            let token = Self::unescape_xml(raw);
            if token.is_empty() {
                continue;
            }

            let (space_before, glue_after) = if self.closing_punct.is_match(&token) {
                (false, false)
            } else if self.opening_punct.is_match(&token) {
                (true, true)
            } else if CONTRACTION_SUFFIXES.contains(&token.to_lowercase().as_str())
                && out.chars().last().is_some_and(char::is_alphanumeric)
            {
                (false, false)
            } else if token == "\"" || token == "'" {
                let open = if token == "\"" { &mut open_double } else { &mut open_single };
                *open = !*open;
                if *open { (true, true) } else { (false, false) }
            } else {
                (true, false)
            };

            if space_before && !glue_next && !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&token);
            glue_next = glue_after;
        }

        out
    }
}
