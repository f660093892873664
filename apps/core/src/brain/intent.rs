//! Intent routing using regex patterns.
//!
//! Decides whether a message needs epic-lore retrieval (factual), life
//! guidance grounded in the epics (guidance), or plain conversation
//! (general). Pure regex matching, no model call.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Routing decision for one user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Lore question (who/what/when/where, names, events, places).
    Factual,
    /// Life advice drawing on the epics (should I, how do I cope, wisdom).
    Guidance,
    /// Everything else (greetings, smalltalk, chatter).
    General,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Factual => "factual",
            Intent::Guidance => "guidance",
            Intent::General => "general",
        }
    }

    /// Whether this intent routes through knowledge retrieval.
    pub fn uses_knowledge(&self) -> bool {
        matches!(self, Intent::Factual | Intent::Guidance)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// Compile patterns once at startup.
static FACTUAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\?").expect("Invalid regex: question mark pattern"),
        Regex::new(r"(?i)^(who|what|when|where|which|whose)\b")
            .expect("Invalid regex: question openers"),
        Regex::new(r"(?i)\b(who (was|were|is)|what (was|is|are|happened)|when (did|was)|where (did|was|is))\b")
            .expect("Invalid regex: question phrases"),
        Regex::new(r"(?i)\b(tell me about|describe|story of|history of|name of)\b")
            .expect("Invalid regex: lore requests"),
        Regex::new(r"(?i)\b(battle|war|kingdom|king|queen|prince|sage|warrior|dynasty|exile)\b")
            .expect("Invalid regex: lore nouns"),
        Regex::new(r"(?i)\b(mahabharata|ramayana|gita|bhagavad|kurukshetra|ayodhya|lanka)\b")
            .expect("Invalid regex: epic names"),
        Regex::new(r"(?i)\b(arjuna|krishna|rama|sita|hanuman|ravana|karna|draupadi|bhishma|lakshmana|pandava|kaurava)\b")
            .expect("Invalid regex: epic figures"),
        Regex::new(r"(?i)\b(happened|event|born|died|married|defeated|cursed)\b")
            .expect("Invalid regex: event verbs"),
    ]
});

static GUIDANCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(should i|what should|how should)\b")
            .expect("Invalid regex: should phrases"),
        Regex::new(r"(?i)\b(how (do|can) i)\b").expect("Invalid regex: how-do-i phrases"),
        Regex::new(r"(?i)\b(cope|coping|deal with|overcome|struggle|struggling)\b")
            .expect("Invalid regex: coping words"),
        Regex::new(r"(?i)\b(advice|advise|guidance|guide me|wisdom|teach me|lesson|moral)\b")
            .expect("Invalid regex: advice words"),
        Regex::new(r"(?i)\b(i feel|feeling|afraid|anxious|angry|sad|lost|confused|hurt)\b")
            .expect("Invalid regex: emotion words"),
        Regex::new(r"(?i)\b(right thing|my duty|forgive|let go|move on)\b")
            .expect("Invalid regex: duty phrases"),
        Regex::new(r"(?i)\b(what would (krishna|rama) do|help me (with|through))\b")
            .expect("Invalid regex: appeal phrases"),
    ]
});

static GENERAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)^(hello|hi|hey|namaste|greetings|good (morning|afternoon|evening))\b")
            .expect("Invalid regex: greetings"),
        Regex::new(r"(?i)^(how are you|what's up|sup)\b")
            .expect("Invalid regex: smalltalk openers"),
        Regex::new(r"(?i)\b(thank you|thanks|nice to meet)\b")
            .expect("Invalid regex: thanks phrases"),
        Regex::new(r"(?i)\b(who are you|your name|what can you do)\b")
            .expect("Invalid regex: identity questions"),
        Regex::new(r"(?i)^(bye|goodbye|see you|good night)\b")
            .expect("Invalid regex: farewells"),
    ]
});

struct PatternGroup {
    intent: Intent,
    patterns: &'static LazyLock<Vec<Regex>>,
    weight: f32,
}

// Greetings outrank the advice patterns, which outrank bare lore matches.
static PATTERN_GROUPS: &[PatternGroup] = &[
    PatternGroup {
        intent: Intent::General,
        patterns: &GENERAL_PATTERNS,
        weight: 1.0,
    },
    PatternGroup {
        intent: Intent::Guidance,
        patterns: &GUIDANCE_PATTERNS,
        weight: 0.9,
    },
    PatternGroup {
        intent: Intent::Factual,
        patterns: &FACTUAL_PATTERNS,
        weight: 0.8,
    },
];

/// Classifies a message into a routing intent with a confidence score.
///
/// Score per group is matched-pattern ratio times the group weight; the best
/// group wins. No match at all falls back to `General` at 0.0.
pub fn classify_intent(text: &str) -> (Intent, f32) {
    let text = text.trim();
    if text.is_empty() {
        return (Intent::General, 0.0);
    }

    let mut best_intent = Intent::General;
    let mut best_score: f32 = 0.0;

    for group in PATTERN_GROUPS {
        let match_count = group.patterns.iter().filter(|p| p.is_match(text)).count();
        if match_count == 0 {
            continue;
        }

        let match_ratio = match_count as f32 / group.patterns.len() as f32;
        let score = match_ratio * group.weight;
        if score > best_score {
            best_score = score;
            best_intent = group.intent;
        }
    }

    // Normalize confidence to 0.0-1.0.
    let confidence = (best_score * 1.2).min(1.0);
    (best_intent, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lore_questions_are_factual() {
        let (intent, confidence) = classify_intent("Who was Karna?");
        assert_eq!(intent, Intent::Factual);
        assert!(confidence > 0.0);

        let (intent, _) = classify_intent("Tell me about the battle of Kurukshetra");
        assert_eq!(intent, Intent::Factual);

        let (intent, _) = classify_intent("What happened when Rama went into exile?");
        assert_eq!(intent, Intent::Factual);
    }

    #[test]
    fn advice_requests_are_guidance() {
        let (intent, _) = classify_intent("I feel lost, what should I do?");
        assert_eq!(intent, Intent::Guidance);

        let (intent, _) = classify_intent("How do I cope with failure? Give me some wisdom");
        assert_eq!(intent, Intent::Guidance);

        let (intent, _) = classify_intent("Should I forgive my brother?");
        assert_eq!(intent, Intent::Guidance);
    }

    #[test]
    fn greetings_are_general() {
        let (intent, confidence) = classify_intent("Namaste!");
        assert_eq!(intent, Intent::General);
        assert!(confidence > 0.0);

        let (intent, _) = classify_intent("hello, how's it going");
        assert_eq!(intent, Intent::General);
    }

    #[test]
    fn empty_and_unmatched_fall_back_to_general() {
        assert_eq!(classify_intent(""), (Intent::General, 0.0));
        assert_eq!(classify_intent("   "), (Intent::General, 0.0));
        assert_eq!(classify_intent("zzz qqq"), (Intent::General, 0.0));
    }

    #[test]
    fn confidence_is_capped() {
        let (_, confidence) =
            classify_intent("Who was Arjuna? What happened in the Mahabharata war at Kurukshetra?");
        assert!(confidence <= 1.0);
    }

    #[test]
    fn knowledge_routing_follows_intent() {
        assert!(Intent::Factual.uses_knowledge());
        assert!(Intent::Guidance.uses_knowledge());
        assert!(!Intent::General.uses_knowledge());
    }
}
