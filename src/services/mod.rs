pub mod agent;
pub mod audio_cache;
pub mod composer;
pub mod gate;
pub mod tts;
