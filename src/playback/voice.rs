use super::engine::VoiceDescriptor;
use tracing::debug;

/// Pick the voice for the next chunk.
///
/// A configured voice wins when the engine offers it (matched by id or
/// name). Otherwise the first voice speaking `language` is used, comparing
/// primary subtags only. `None` leaves the choice to the engine.
pub fn select_voice<'a>(
    voices: &'a [VoiceDescriptor],
    preferred: Option<&str>,
    language: &str,
) -> Option<&'a VoiceDescriptor> {
    if let Some(wanted) = preferred {
        if let Some(voice) = voices.iter().find(|v| v.id == wanted || v.name == wanted) {
            return Some(voice);
        }
        debug!(voice = wanted, "Configured voice not offered by engine");
    }

    let language = primary_subtag(language);
    if language.is_empty() {
        return None;
    }
    voices
        .iter()
        .find(|v| primary_subtag(&v.lang).eq_ignore_ascii_case(language))
}

fn primary_subtag(tag: &str) -> &str {
    tag.trim().split(['-', '_']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, lang: &str) -> VoiceDescriptor {
        VoiceDescriptor {
            id: id.to_string(),
            name: format!("{id} voice"),
            lang: lang.to_string(),
            is_default: false,
        }
    }

    #[test]
    fn configured_voice_is_used_when_present() {
        let voices = vec![voice("ryan", "en_US"), voice("alba", "en_GB")];
        let picked = select_voice(&voices, Some("alba"), "en");
        assert_eq!(picked.map(|v| v.id.as_str()), Some("alba"));
    }

    #[test]
    fn configured_voice_matches_by_name() {
        let voices = vec![voice("ryan", "en_US"), voice("alba", "en_GB")];
        let picked = select_voice(&voices, Some("alba voice"), "fr");
        assert_eq!(picked.map(|v| v.id.as_str()), Some("alba"));
    }

    #[test]
    fn falls_back_to_language_match() {
        let voices = vec![voice("siwis", "fr_FR"), voice("thorsten", "de-DE")];
        let picked = select_voice(&voices, Some("missing"), "DE");
        assert_eq!(picked.map(|v| v.id.as_str()), Some("thorsten"));
    }

    #[test]
    fn region_in_content_language_is_ignored() {
        let voices = vec![voice("ryan", "en_US")];
        let picked = select_voice(&voices, None, "en-GB");
        assert_eq!(picked.map(|v| v.id.as_str()), Some("ryan"));
    }

    #[test]
    fn no_match_leaves_engine_default() {
        let voices = vec![voice("ryan", "en_US")];
        assert!(select_voice(&voices, None, "ja").is_none());
        assert!(select_voice(&voices, None, "").is_none());
        assert!(select_voice(&[], Some("ryan"), "en").is_none());
    }
}
