//! Language detection for incoming messages.
//!
//! Two tiers: a Unicode script scan for South-Asian scripts, which is reliable
//! even when the text mixes scripts, and a trigram-profile guesser for
//! Latin-script text. Script detection always wins over the statistical guess.

use std::collections::HashMap;
use std::sync::LazyLock;

/// What the classifier concluded about one message.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDetection {
    pub code: String,
    pub confidence: f64,
    /// Whether the detection is trustworthy enough to echo back to the client
    /// and drive the respond-in-language prompt rules.
    pub should_display: bool,
}

impl LanguageDetection {
    /// The safe default: treat as English, show nothing.
    fn english() -> Self {
        Self {
            code: "en".to_string(),
            confidence: 0.0,
            should_display: false,
        }
    }
}

/// South-Asian script ranges, scanned in order. The first script with any
/// code point in the text wins, so Devanagari beats every other script in
/// mixed-script input.
const INDIC_SCRIPTS: &[(char, char, &str)] = &[
    ('\u{0900}', '\u{097F}', "hi"), // Devanagari
    ('\u{0C00}', '\u{0C7F}', "te"), // Telugu
    ('\u{0B80}', '\u{0BFF}', "ta"), // Tamil
    ('\u{0980}', '\u{09FF}', "bn"), // Bengali
    ('\u{0A80}', '\u{0AFF}', "gu"), // Gujarati
    ('\u{0C80}', '\u{0CFF}', "kn"), // Kannada
    ('\u{0D00}', '\u{0D7F}', "ml"), // Malayalam
    ('\u{0A00}', '\u{0A7F}', "pa"), // Gurmukhi
];

/// Codes the trigram guesser mistakes for English often enough that a hit is
/// treated as English instead of shown to the user.
const CONFUSED_WITH_ENGLISH: &[&str] = &[
    "fi", "da", "no", "sv", "et", "lv", "lt", "so", "cy", "eu", "mt", "ga", "is", "fo", "ca",
    "pt", "ro", "sk", "cs", "hr", "sl",
];

/// Per-language trigram profiles, most frequent first. Spaces mark word
/// boundaries. Coverage is Latin-script languages only; text in other scripts
/// either hits the script table above or falls back to English.
const PROFILES: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", " th", "he ", "and", " an", "nd ", " of", "of ", " to", "to ", " in", "in ",
            "ing", "ng ", "ion", "tio", "ati", " is", "is ", "at ", "hat", "tha", " wh", "you",
            " yo", "ou ", "ent", "nt ", "er ", "es ",
        ],
    ),
    (
        "es",
        &[
            " de", "de ", " la", "la ", "que", " qu", "ue ", " el", "el ", " en", "en ", "os ",
            " lo", "los", " se", "se ", "ión", "ció", "aci", " co", "con", " es", "es ", "sta",
            " y ", "ar ", "ado", "do ", " pa", "ra ",
        ],
    ),
    (
        "fr",
        &[
            " de", "de ", " le", "le ", "les", "es ", " la", "la ", "ent", "nt ", "que", " qu",
            "ue ", " et", "et ", " es", "est", " un", "un ", "ion", " co", "our", "ous", "us ",
            " vo", "vou", "je ", " je", "ais", "ait",
        ],
    ),
    (
        "de",
        &[
            "er ", "der", " de", "ie ", "die", " di", "und", " un", "nd ", "en ", "ein", " ei",
            "ine", "ch ", "ich", "sch", " sc", "ung", "cht", "ht ", " ge", "gen", " zu", "zu ",
            "das", " da", "as ", "it ", "eit", "ten",
        ],
    ),
    (
        "it",
        &[
            " di", "di ", "che", " ch", "he ", " co", "con", "on ", "one", "ion", " la", "la ",
            "to ", "ato", " pe", "per", "er ", "re ", "no ", "non", "ell", "lla", "del", " de",
            "zio", "ne ", "gli", " in", "in ", "are",
        ],
    ),
    (
        "pt",
        &[
            " de", "de ", "que", " qu", "ue ", "do ", " do", "da ", " da", " co", "com", "os ",
            " os", "ão ", " nã", "não", " pa", "par", "ara", "ra ", " em", "em ", "ent", "nte",
            " se", "se ", "uma", " um", "ma ", " es",
        ],
    ),
    (
        "nl",
        &[
            " de", "de ", "van", " va", "an ", "het", " he", "et ", "een", " ee", "en ", "n d",
            " en", " in", "in ", "ijn", "zij", " zi", "dat", " da", "at ", "iet", "nie", " ni",
            "oor", "voo", " vo", "er ", "aar", " op",
        ],
    ),
    (
        "ro",
        &[
            " de", "de ", " în", "în ", " cu", "cu ", " la", "la ", " pe", "pe ", "est", "ste",
            "te ", "ul ", "car", "are", "re ", " ca", " nu", "nu ", " se", "se ", "lui", "ui ",
            " di", "din", "in ", "tru", " co", "ea ",
        ],
    ),
    (
        "fi",
        &[
            " ja", "ja ", " on", "on ", "ssa", "ssä", "sta", "stä", "lla", "llä", "tta", "ttä",
            "nen", "ine", "en ", "ksi", "aan", "ään", "än ", "tä ", " se", "sen", " ka", "kui",
            " ku", "oli", " ol", "ist", "taa", " jo",
        ],
    ),
    (
        "da",
        &[
            " og", "og ", " at", "at ", "det", " de", "de ", "er ", " er", "en ", "et ", "til",
            " ti", "il ", " so", "som", "om ", " på", "på ", "ikk", "kke", " ik", "der", "for",
            " fo", "or ", " me", "med", "ed ", " ha",
        ],
    ),
    (
        "no",
        &[
            "og ", " og", "det", " de", "de ", "er ", " er", "en ", "et ", "til", " ti", "il ",
            "som", " so", "om ", " på", "på ", "ikk", "kke", " ik", " me", "med", "ed ", " ha",
            "han", " av", "av ", "eg ", "seg", " se",
        ],
    ),
    (
        "sv",
        &[
            "och", " oc", "ch ", " at", "att", "tt ", "det", " de", "de ", "en ", "som", " so",
            "om ", " på", "på ", "är ", " är", " av", "av ", "för", " fö", "ör ", "til", "ill",
            "ll ", "int", "nte", " in", "ett", " ha",
        ],
    ),
    (
        "cs",
        &[
            " je", "je ", " se", "se ", " na", "na ", "to ", " to", " že", "že ", " po", "pro",
            " pr", "ou ", "né ", " ne", "ně ", "ho ", "ick", "ké ", " kt", "kte", "ter", " by",
            "by ", " do", "la ", "ost", "sta", " st",
        ],
    ),
    (
        "sk",
        &[
            " je", "je ", " sa", "sa ", " na", "na ", "to ", " to", " že", "že ", " po", " pr",
            "pre", "ou ", "né ", " ne", "ho ", "ick", "ké ", " kt", "kto", "tor", " by", "by ",
            " do", "la ", "ost", " ak", "ako", "ia ",
        ],
    ),
    (
        "hr",
        &[
            " je", "je ", " se", "se ", " na", "na ", " da", "da ", " su", "su ", " za", "za ",
            " od", "od ", "koj", "oji", " ko", "ji ", "ije", "ih ", " ih", " bi", "bi ", "ati",
            "ti ", "og ", " po", "ost", " il", "ili",
        ],
    ),
    (
        "ca",
        &[
            " de", "de ", " la", "la ", "el ", " el", "que", " qu", "ue ", " en", "en ", "els",
            "ls ", " pe", "per", "er ", "amb", " am", "mb ", " un", "un ", "una", "es ", " le",
            "les", "al ", " al", "és ", " és", "ió ",
        ],
    ),
    (
        "et",
        &[
            " ja", "ja ", " on", "on ", " et", "et ", "oli", " ol", "li ", " ka", "ka ", "see",
            " se", "ee ", "ing", "nin", " ni", "ud ", "nud", "ise", "se ", "ast", "st ", " ku",
            "kui", "mis", " mi", "is ", "ega", "aga",
        ],
    ),
    (
        "lt",
        &[
            " ir", "ir ", " yr", "yra", "ra ", " ka", "kad", "ad ", "tai", " ta", "ai ", " su",
            "su ", "iš ", " iš", " ap", "api", "pie", " po", "as ", "os ", "us ", "ius", "ini",
            "ti ", " ti", "mas", "is ", " ji", "kai",
        ],
    ),
    (
        "lv",
        &[
            " un", "un ", " ir", "ir ", " ar", "ar ", " pa", "par", " ka", "kas", "as ", " no",
            "no ", " uz", "uz ", "tas", " ta", "ta ", "ja ", "ija", "am ", "iem", "em ", " vi",
            "vis", "ais", "is ", " la", "tu ", "ši ",
        ],
    ),
    (
        "is",
        &[
            " og", "og ", " að", "að ", " er", "er ", " se", "sem", "em ", " ti", "til", "il ",
            "inn", "nn ", "ið ", "ur ", " he", "hef", "ann", " ha", "han", " þa", "það", " ek",
            "ekk", "kki", " vi", "við", "num", " þe",
        ],
    ),
];

/// Smoothing mass given to trigrams absent from a profile.
const SMOOTHING: f64 = 0.5;
/// Rough trigram vocabulary size used for smoothing normalization.
const VOCABULARY: f64 = 2000.0;

/// Profile rank lookup, built once.
static PROFILE_INDEX: LazyLock<Vec<(&'static str, HashMap<&'static str, usize>)>> =
    LazyLock::new(|| {
        PROFILES
            .iter()
            .map(|(code, trigrams)| {
                let ranks = trigrams
                    .iter()
                    .enumerate()
                    .map(|(rank, t)| (*t, rank))
                    .collect();
                (*code, ranks)
            })
            .collect()
    });

/// Returns the code of the first script in the priority table with a code
/// point in the text, if any.
pub fn detect_indic_script(text: &str) -> Option<&'static str> {
    INDIC_SCRIPTS
        .iter()
        .find(|(lo, hi, _)| text.chars().any(|c| (*lo..=*hi).contains(&c)))
        .map(|(_, _, code)| *code)
}

/// Classifies the language of a message.
///
/// Texts under 5 characters are too short to trust and always come back as
/// non-displayed English, as does anything the guesser cannot place or places
/// on the confused-with-English list.
pub fn detect_language(text: &str) -> LanguageDetection {
    let cleaned = text.trim();
    if cleaned.chars().count() < 5 {
        return LanguageDetection::english();
    }

    if let Some(code) = detect_indic_script(cleaned) {
        return LanguageDetection {
            code: code.to_string(),
            confidence: 0.95,
            should_display: true,
        };
    }

    match guess_language(cleaned) {
        Some((code, confidence)) => {
            if CONFUSED_WITH_ENGLISH.contains(&code) {
                return LanguageDetection::english();
            }
            let should_display = confidence > 0.85 && code != "en";
            LanguageDetection {
                code: code.to_string(),
                confidence,
                should_display,
            }
        }
        None => LanguageDetection::english(),
    }
}

/// Splits the text into boundary-padded trigrams with their counts.
fn trigram_counts(text: &str) -> HashMap<String, usize> {
    let lowered = text.to_lowercase();
    let mut counts = HashMap::new();
    for word in lowered.split(|c: char| !c.is_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        let padded: Vec<char> = std::iter::once(' ')
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            *counts.entry(trigram).or_insert(0) += 1;
        }
    }
    counts
}

/// Naive-Bayes scoring of the input trigrams against every profile. Each
/// profile gives rank-weighted probability mass to its own trigrams and a
/// small smoothed mass to everything else; the posterior over languages comes
/// out of a log-space softmax. Returns `None` when no trigram matches any
/// profile at all.
fn guess_language(text: &str) -> Option<(&'static str, f64)> {
    let counts = trigram_counts(text);
    if counts.is_empty() {
        return None;
    }

    let profile_len = PROFILES[0].1.len() as f64;
    let weight_sum = profile_len * (profile_len + 1.0) / 2.0;
    let denominator = weight_sum + SMOOTHING * VOCABULARY;

    let mut any_hit = false;
    let mut log_likelihoods: Vec<(&'static str, f64)> = Vec::with_capacity(PROFILE_INDEX.len());
    for (code, ranks) in PROFILE_INDEX.iter() {
        let mut ll = 0.0;
        for (trigram, count) in &counts {
            let mass = match ranks.get(trigram.as_str()) {
                Some(rank) => {
                    any_hit = true;
                    (profile_len - *rank as f64) + SMOOTHING
                }
                None => SMOOTHING,
            };
            ll += *count as f64 * (mass / denominator).ln();
        }
        log_likelihoods.push((code, ll));
    }
    if !any_hit {
        return None;
    }

    let max_ll = log_likelihoods
        .iter()
        .map(|(_, ll)| *ll)
        .fold(f64::NEG_INFINITY, f64::max);
    let total: f64 = log_likelihoods
        .iter()
        .map(|(_, ll)| (ll - max_ll).exp())
        .sum();
    log_likelihoods
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(code, ll)| (*code, (ll - max_ll).exp() / total))
}

/// Human-readable name for a language code, when known.
pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "ru" => "Russian",
        "zh" => "Chinese",
        "zh-cn" => "Chinese (Simplified)",
        "zh-tw" => "Chinese (Traditional)",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "bn" => "Bengali",
        "ur" => "Urdu",
        "te" => "Telugu",
        "ta" => "Tamil",
        "ml" => "Malayalam",
        "kn" => "Kannada",
        "gu" => "Gujarati",
        "pa" => "Punjabi",
        "mr" => "Marathi",
        "ne" => "Nepali",
        "si" => "Sinhala",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "ms" => "Malay",
        "tl" => "Filipino",
        "tr" => "Turkish",
        "el" => "Greek",
        "he" => "Hebrew",
        "fa" => "Persian",
        "pl" => "Polish",
        "uk" => "Ukrainian",
        "cs" => "Czech",
        "sk" => "Slovak",
        "hu" => "Hungarian",
        "ro" => "Romanian",
        "bg" => "Bulgarian",
        "hr" => "Croatian",
        "sr" => "Serbian",
        "sl" => "Slovenian",
        "fi" => "Finnish",
        "da" => "Danish",
        "no" => "Norwegian",
        "sv" => "Swedish",
        "et" => "Estonian",
        "lv" => "Latvian",
        "lt" => "Lithuanian",
        "is" => "Icelandic",
        "fo" => "Faroese",
        "ga" => "Irish",
        "cy" => "Welsh",
        "mt" => "Maltese",
        "eu" => "Basque",
        "ca" => "Catalan",
        "gl" => "Galician",
        "so" => "Somali",
        "sw" => "Swahili",
        "af" => "Afrikaans",
        "am" => "Amharic",
        "az" => "Azerbaijani",
        "ka" => "Georgian",
        "kk" => "Kazakh",
        "km" => "Khmer",
        "lo" => "Lao",
        "my" => "Burmese",
        "mn" => "Mongolian",
        "uz" => "Uzbek",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_never_trusted() {
        for text in ["", "hi", "ok  ", "नमः", "    a    "] {
            let detection = detect_language(text);
            assert_eq!(detection.code, "en");
            assert_eq!(detection.confidence, 0.0);
            assert!(!detection.should_display);
        }
    }

    #[test]
    fn devanagari_wins_over_every_other_script() {
        // Telugu text with a single Devanagari word mixed in.
        let mixed = "నమస్కారం मित्र మీరు ఎలా ఉన్నారు";
        let detection = detect_language(mixed);
        assert_eq!(detection.code, "hi");
        assert_eq!(detection.confidence, 0.95);
        assert!(detection.should_display);
    }

    #[test]
    fn each_script_maps_to_its_code() {
        let cases = [
            ("आप कैसे हैं मित्र", "hi"),
            ("మీరు ఎలా ఉన్నారు", "te"),
            ("நீங்கள் எப்படி இருக்கிறீர்கள்", "ta"),
            ("আপনি কেমন আছেন", "bn"),
            ("તમે કેમ છો મિત્ર", "gu"),
            ("ನೀವು ಹೇಗಿದ್ದೀರಿ", "kn"),
            ("നിങ്ങൾക്ക് സുഖമാണോ", "ml"),
            ("ਤੁਸੀਂ ਕਿਵੇਂ ਹੋ ਜੀ", "pa"),
        ];
        for (text, expected) in cases {
            let detection = detect_language(text);
            assert_eq!(detection.code, expected, "text: {}", text);
            assert_eq!(detection.confidence, 0.95);
            assert!(detection.should_display);
        }
    }

    #[test]
    fn english_text_is_english_and_not_displayed() {
        let detection =
            detect_language("Hello there, what are you doing today with the children?");
        assert_eq!(detection.code, "en");
        assert!(!detection.should_display);
    }

    #[test]
    fn clear_french_is_detected_and_displayed() {
        let detection = detect_language(
            "Bonjour, je voudrais que vous expliquiez les principes de la philosophie",
        );
        assert_eq!(detection.code, "fr");
        assert!(detection.confidence > 0.85);
        assert!(detection.should_display);
    }

    #[test]
    fn clear_spanish_is_detected_and_displayed() {
        let detection = detect_language(
            "Hola, quisiera que usted explique los principios de la historia española",
        );
        assert_eq!(detection.code, "es");
        assert!(detection.should_display);
    }

    #[test]
    fn confused_languages_fall_back_to_english() {
        // Finnish, on the confused-with-English list.
        let detection = detect_language(
            "Tässä talossa on erittäin kaunista ja meillä on mukavaa tänään täällä",
        );
        assert_eq!(detection.code, "en");
        assert_eq!(detection.confidence, 0.0);
        assert!(!detection.should_display);
    }

    #[test]
    fn symbol_soup_falls_back_to_english() {
        let detection = detect_language("!!! ??? ;;; 12345 %%%");
        assert_eq!(detection.code, "en");
        assert_eq!(detection.confidence, 0.0);
        assert!(!detection.should_display);
    }

    #[test]
    fn indic_script_helper_respects_priority_order() {
        assert_eq!(detect_indic_script("hello"), None);
        assert_eq!(detect_indic_script("నమస్కారం"), Some("te"));
        assert_eq!(detect_indic_script("नमस्ते నమస్కారం"), Some("hi"));
    }

    #[test]
    fn language_names_cover_the_detectable_codes() {
        for &(_, _, code) in INDIC_SCRIPTS {
            assert!(language_name(code).is_some(), "missing name for {}", code);
        }
        for &(code, _) in PROFILES {
            assert!(language_name(code).is_some(), "missing name for {}", code);
        }
        for &code in CONFUSED_WITH_ENGLISH {
            assert!(language_name(code).is_some(), "missing name for {}", code);
        }
        assert_eq!(language_name("xx"), None);
    }
}
