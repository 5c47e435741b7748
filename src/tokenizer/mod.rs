//! Advisory token estimation for chat message sets.
//!
//! Mirrors the published counting recipe for chat models: every message pays
//! a fixed framing overhead, plus the encoded role, content and optional
//! name, and the reply is primed with three more tokens. Results are never
//! exact and unknown models estimate to zero.

pub mod encoding;

pub use encoding::Encoding;

use tracing::debug;

use crate::types::ChatMessage;

/// Tokens added for `<|start|>assistant<|message|>` priming of the reply.
const REPLY_PRIMING_TOKENS: i64 = 3;

/// Per-model encoding and framing overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    pub encoding: Encoding,
    pub tokens_per_message: i64,
    /// Added when a message carries a name. Negative when the name replaces
    /// the role.
    pub tokens_per_name: i64,
}

const fn profile(encoding: Encoding, tokens_per_message: i64, tokens_per_name: i64) -> ModelProfile {
    ModelProfile {
        encoding,
        tokens_per_message,
        tokens_per_name,
    }
}

const MODEL_TABLE: &[(&str, ModelProfile)] = &[
    ("gpt-3.5-turbo-0301", profile(Encoding::Cl100kBase, 4, -1)),
    ("gpt-3.5-turbo-0613", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-3.5-turbo-16k-0613", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-3.5-turbo-1106", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-4-0314", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-4-32k-0314", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-4-0613", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-4-32k-0613", profile(Encoding::Cl100kBase, 3, 1)),
    ("gpt-4o-2024-05-13", profile(Encoding::O200kBase, 3, 1)),
    ("gpt-4o-mini-2024-07-18", profile(Encoding::O200kBase, 3, 1)),
];

/// Family substrings and the dated variant they resolve to. Longer families
/// come first so `gpt-4o-mini` is not mistaken for `gpt-4o` or `gpt-4`.
const FAMILY_FALLBACKS: &[(&str, &str)] = &[
    ("gpt-4o-mini", "gpt-4o-mini-2024-07-18"),
    ("gpt-4o", "gpt-4o-2024-05-13"),
    ("gpt-3.5-turbo", "gpt-3.5-turbo-0613"),
    ("gpt-35-turbo", "gpt-3.5-turbo-0613"),
    ("gpt-4", "gpt-4-0613"),
];

fn exact_profile(model: &str) -> Option<ModelProfile> {
    MODEL_TABLE
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, profile)| *profile)
}

/// Resolve the profile for `model`, falling back to the newest dated variant
/// of a known family.
pub fn profile_for(model: &str) -> Option<ModelProfile> {
    if let Some(profile) = exact_profile(model) {
        return Some(profile);
    }
    let (family, dated) = FAMILY_FALLBACKS
        .iter()
        .find(|(family, _)| model.contains(family))?;
    debug!(model, family, dated, "Token estimate assumes family default");
    exact_profile(dated)
}

/// Estimate how many tokens `messages` consume for `model`.
pub fn estimate(messages: &[ChatMessage], model: &str) -> usize {
    let Some(profile) = profile_for(model) else {
        debug!(model, "No token profile for model, estimating zero");
        return 0;
    };
    let encoding = profile.encoding;
    if !encoding.is_available() {
        return 0;
    }

    let mut total = REPLY_PRIMING_TOKENS;
    for message in messages {
        total += profile.tokens_per_message;
        total += encoding.count(&message.content) as i64;
        total += encoding.count(message.role.as_ref()) as i64;
        if let Some(name) = &message.name {
            total += encoding.count(name) as i64;
            total += profile.tokens_per_name;
        }
    }
    total.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names_resolve_to_dated_variants() {
        assert_eq!(profile_for("gpt-4"), exact_profile("gpt-4-0613"));
        assert_eq!(profile_for("gpt-3.5-turbo"), exact_profile("gpt-3.5-turbo-0613"));
        assert_eq!(
            profile_for("gpt-4o-mini").map(|p| p.encoding),
            Some(Encoding::O200kBase)
        );
        assert_eq!(profile_for("azure-gpt-35-turbo"), exact_profile("gpt-3.5-turbo-0613"));
    }

    #[test]
    fn legacy_turbo_uses_four_tokens_per_message() {
        let profile = profile_for("gpt-3.5-turbo-0301").unwrap();
        assert_eq!(profile.tokens_per_message, 4);
        assert_eq!(profile.tokens_per_name, -1);
    }

    #[test]
    fn unknown_model_estimates_zero() {
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(estimate(&messages, "llama-2-70b"), 0);
    }

    #[test]
    fn empty_history_costs_only_priming() {
        assert_eq!(estimate(&[], "gpt-4"), 3);
    }

    #[test]
    fn named_messages_pay_name_overhead() {
        let plain = vec![ChatMessage::user("hello")];
        let named = vec![ChatMessage::user("hello").with_name("bob")];
        let name_tokens = Encoding::Cl100kBase.count("bob");
        assert_eq!(
            estimate(&named, "gpt-4") - estimate(&plain, "gpt-4"),
            name_tokens + 1
        );
    }
}
