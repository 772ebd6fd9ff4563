use whatlang::Lang;

/// Default (Russian) voice, used whenever routing does not pick English.
pub const DEFAULT_SPEAKER: &str = "baya";
/// English voice, used when routing detects English text.
pub const ENGLISH_SPEAKER: &str = "en_0";

/// How a request's text is mapped to a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Always the default model and speaker.
    FixedVoice,
    /// Detect the text's language; English gets its own model, everything
    /// else (including undetectable text) falls through to the default.
    LanguageRouting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRoute {
    Default,
    English,
}

pub fn route(policy: RoutingPolicy, text: &str) -> VoiceRoute {
    match policy {
        RoutingPolicy::FixedVoice => VoiceRoute::Default,
        RoutingPolicy::LanguageRouting => match whatlang::detect_lang(text) {
            Some(Lang::Eng) => VoiceRoute::English,
            _ => VoiceRoute::Default,
        },
    }
}
