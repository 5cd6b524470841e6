pub mod record;

pub use record::{
    has_duration, resolve_audio_path, set_duration, Record, DEFAULT_FALLBACK_KEYS, DURATION_UNKNOWN,
};
