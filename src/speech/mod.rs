//! Text-to-speech for replies. A `Speaker` lists its voices and speaks
//! fire-and-forget; `VoiceCatalog` caches the voice list and picks a voice
//! for the configured locale.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::OnceCell;

pub mod espeak;

pub use espeak::EspeakSpeaker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Identifier passed back to `speak`.
    pub id: String,
    pub name: String,
    /// BCP-47 language tag, e.g. `en-US`.
    pub language: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("no voice matches locale {locale}")]
    NoMatchingVoice { locale: String },
    #[error("speech I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("speech program failed: {0}")]
    ProgramFailed(String),
}

#[async_trait]
pub trait Speaker: Send + Sync {
    async fn list_voices(&self) -> Result<Vec<Voice>, SpeechError>;

    /// Start speaking `text`. Returns once speech has been handed off, not when
    /// it finishes.
    fn speak(&self, text: &str, voice_id: Option<&str>) -> Result<(), SpeechError>;
}

/// Pick uniformly among the voices whose language is exactly `locale`.
pub fn select_voice<'a, R: Rng + ?Sized>(
    voices: &'a [Voice],
    locale: &str,
    rng: &mut R,
) -> Result<&'a Voice, SpeechError> {
    let matching: Vec<&Voice> = voices.iter().filter(|v| v.language == locale).collect();
    matching
        .choose(rng)
        .copied()
        .ok_or_else(|| SpeechError::NoMatchingVoice {
            locale: locale.to_string(),
        })
}

/// Voice list fetched once from the speaker and reused afterwards.
pub struct VoiceCatalog {
    locale: String,
    voices: OnceCell<Vec<Voice>>,
}

impl VoiceCatalog {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            voices: OnceCell::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub async fn voices(&self, speaker: &dyn Speaker) -> Result<&[Voice], SpeechError> {
        let voices = self
            .voices
            .get_or_try_init(|| async {
                let voices = speaker.list_voices().await?;
                log::info!("Loaded {} voices", voices.len());
                Ok::<_, SpeechError>(voices)
            })
            .await?;
        Ok(voices.as_slice())
    }

    /// Load the voices and make sure at least one matches the locale.
    pub async fn validate(&self, speaker: &dyn Speaker) -> Result<(), SpeechError> {
        let voices = self.voices(speaker).await?;
        select_voice(voices, &self.locale, &mut rand::thread_rng()).map(|_| ())
    }

    /// A random voice id for the locale.
    pub async fn pick(&self, speaker: &dyn Speaker) -> Result<String, SpeechError> {
        let voices = self.voices(speaker).await?;
        let voice = select_voice(voices, &self.locale, &mut rand::thread_rng())?;
        Ok(voice.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn voice(id: &str, language: &str) -> Voice {
        Voice {
            id: id.into(),
            name: id.into(),
            language: language.into(),
        }
    }

    struct CountingSpeaker {
        calls: AtomicUsize,
        voices: Vec<Voice>,
    }

    #[async_trait]
    impl Speaker for CountingSpeaker {
        async fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.voices.clone())
        }

        fn speak(&self, _text: &str, _voice_id: Option<&str>) -> Result<(), SpeechError> {
            Ok(())
        }
    }

    #[test]
    fn select_only_returns_matching_locale() {
        let voices = vec![voice("a", "en-US"), voice("b", "fr-FR"), voice("c", "en-US")];
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..50 {
            let v = select_voice(&voices, "en-US", &mut rng).unwrap();
            assert_eq!(v.language, "en-US");
            seen.insert(v.id.clone());
        }
        assert_eq!(seen, HashSet::from(["a".to_string(), "c".to_string()]));
    }

    #[test]
    fn select_is_exact_match() {
        let voices = vec![voice("a", "en-GB")];
        let err = select_voice(&voices, "en-US", &mut rand::thread_rng()).unwrap_err();
        match err {
            SpeechError::NoMatchingVoice { locale } => assert_eq!(locale, "en-US"),
            other => panic!("expected NoMatchingVoice, got {other:?}"),
        }
    }

    #[test]
    fn select_on_empty_list_fails() {
        assert!(matches!(
            select_voice(&[], "en-US", &mut rand::thread_rng()),
            Err(SpeechError::NoMatchingVoice { .. })
        ));
    }

    #[tokio::test]
    async fn catalog_lists_voices_once() {
        let speaker = CountingSpeaker {
            calls: AtomicUsize::new(0),
            voices: vec![voice("a", "en-US")],
        };
        let catalog = VoiceCatalog::new("en-US");
        catalog.validate(&speaker).await.unwrap();
        assert_eq!(catalog.pick(&speaker).await.unwrap(), "a");
        assert_eq!(catalog.pick(&speaker).await.unwrap(), "a");
        assert_eq!(speaker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn catalog_validation_fails_without_match() {
        let speaker = CountingSpeaker {
            calls: AtomicUsize::new(0),
            voices: vec![voice("a", "de-DE")],
        };
        let catalog = VoiceCatalog::new("en-US");
        assert!(matches!(
            catalog.validate(&speaker).await,
            Err(SpeechError::NoMatchingVoice { .. })
        ));
    }
}
