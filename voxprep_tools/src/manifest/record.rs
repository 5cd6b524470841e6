use serde_json::{Map, Value};

/// Value written to `duration` when the audio could not be found or read.
pub const DURATION_UNKNOWN: f64 = -1.0;

pub const DURATION_KEY: &str = "duration";

/// Keys checked after the caller's preferred key, in priority order.
pub const DEFAULT_FALLBACK_KEYS: [&str; 5] = ["audio", "wav", "path", "audio_path", "file"];

pub type Record = Map<String, Value>;

/// True when the record carries a usable duration (a number above zero).
pub fn has_duration(record: &Record) -> bool {
    record
        .get(DURATION_KEY)
        .and_then(Value::as_f64)
        .is_some_and(|d| d > 0.0)
}

pub fn set_duration(record: &mut Record, seconds: f64) {
    record.insert(DURATION_KEY.to_string(), Value::from(seconds));
}

/// Find the audio file a record points at.
///
/// `audio_key` is tried first, then each of `fallback_keys`. The first key
/// present in the record decides the outcome, even when its value is not a
/// usable path. An object value is looked into for a nested `"path"`.
pub fn resolve_audio_path<'a, S: AsRef<str>>(
    record: &'a Record,
    audio_key: &str,
    fallback_keys: &[S],
) -> Option<&'a str> {
    let mut value = std::iter::once(audio_key)
        .chain(fallback_keys.iter().map(AsRef::as_ref))
        .find_map(|key| record.get(key))?;

    if let Value::Object(nested) = value {
        value = nested.get("path")?;
    }

    value.as_str().filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn duration_must_be_positive_number() {
        assert!(has_duration(&record(json!({"duration": 3.5}))));
        assert!(has_duration(&record(json!({"duration": 2}))));
        assert!(!has_duration(&record(json!({"duration": 0.0}))));
        assert!(!has_duration(&record(json!({"duration": -1.0}))));
        assert!(!has_duration(&record(json!({"duration": null}))));
        assert!(!has_duration(&record(json!({"duration": "3.5"}))));
        assert!(!has_duration(&record(json!({"text": "no duration"}))));
    }

    #[test]
    fn default_key_beats_fallbacks() {
        let r = record(json!({"audio": "b.wav", "wav": "a.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), Some("a.wav"));
    }

    #[test]
    fn override_key_beats_everything() {
        let r = record(json!({"wav": "a.wav", "audio": "b.wav", "clip": "c.flac"}));
        assert_eq!(resolve_audio_path(&r, "clip", &DEFAULT_FALLBACK_KEYS), Some("c.flac"));
    }

    #[test]
    fn fallback_order_is_respected() {
        let r = record(json!({"file": "f.wav", "audio_path": "ap.wav", "path": "p.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), Some("p.wav"));

        let r = record(json!({"file": "f.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), Some("f.wav"));
    }

    #[test]
    fn nested_path_object() {
        let r = record(json!({"audio": {"path": "/data/x.wav", "sampling_rate": 44100}}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), Some("/data/x.wav"));
    }

    #[test]
    fn first_present_key_wins_even_if_unusable() {
        let r = record(json!({"wav": null, "audio": "b.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), None);

        let r = record(json!({"audio": {"bytes": "..."}, "path": "p.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), None);
    }

    #[test]
    fn empty_path_is_unresolved() {
        let r = record(json!({"wav": ""}));
        assert_eq!(resolve_audio_path(&r, "wav", &DEFAULT_FALLBACK_KEYS), None);
    }

    #[test]
    fn custom_fallbacks() {
        let r = record(json!({"audio": "a.wav", "speech": "s.wav"}));
        assert_eq!(resolve_audio_path(&r, "wav", &["speech"]), Some("s.wav"));
    }

    #[test]
    fn set_duration_appends_last() {
        let mut r = record(json!({"wav": "a.wav", "text": "hi"}));
        set_duration(&mut r, 2.0);
        let keys: Vec<_> = r.keys().map(String::as_str).collect();
        assert_eq!(keys, ["wav", "text", "duration"]);
    }
}
