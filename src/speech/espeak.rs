// espeak.rs — Speech through the `espeak-ng` command-line synthesizer.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{SpeechError, Speaker, Voice};

pub const DEFAULT_PROGRAM: &str = "espeak-ng";

pub struct EspeakSpeaker {
    program: String,
}

impl Default for EspeakSpeaker {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl EspeakSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// `en-us` → `en-US`, `cmn-latn-pinyin` stays as is, `pt-br` → `pt-BR`.
pub fn normalize_language_tag(tag: &str) -> String {
    let mut parts = tag.split('-');
    let mut out = parts.next().unwrap_or_default().to_ascii_lowercase();
    for part in parts {
        out.push('-');
        if part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
            out.push_str(&part.to_ascii_uppercase());
        } else {
            out.push_str(part);
        }
    }
    out
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?;
            Some(Voice {
                id: name.to_string(),
                name: name.replace('_', " "),
                language: normalize_language_tag(language),
            })
        })
        .collect()
}

#[async_trait]
impl Speaker for EspeakSpeaker {
    async fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let output = Command::new(&self.program).arg("--voices").output().await?;
        if !output.status.success() {
            return Err(SpeechError::ProgramFailed(format!(
                "{} --voices exited with {}",
                self.program, output.status
            )));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn speak(&self, text: &str, voice_id: Option<&str>) -> Result<(), SpeechError> {
        let mut cmd = Command::new(&self.program);
        if let Some(voice) = voice_id {
            cmd.arg("-v").arg(voice);
        }
        let mut child = cmd
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    log::warn!("{} exited with {}", program, status);
                }
                Err(e) => log::warn!("{} wait failed: {}", program, e),
                _ => {}
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
 5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
 5  cmn-latn-pinyin --/M      Chinese_Pinyin     sit/cmn-Latn-pinyin
";

    #[test]
    fn parses_voice_table() {
        let voices = parse_voice_list(SAMPLE);
        assert_eq!(voices.len(), 4);
        assert_eq!(
            voices[2],
            Voice {
                id: "English_(America)".into(),
                name: "English (America)".into(),
                language: "en-US".into(),
            }
        );
        assert_eq!(voices[0].language, "af");
        assert_eq!(voices[3].language, "cmn-latn-pinyin");
    }

    #[test]
    fn ignores_text_before_header_and_blank_lines() {
        let voices = parse_voice_list("warning: something\n\nPty Language\n\n");
        assert!(voices.is_empty());
    }

    #[test]
    fn normalizes_tags() {
        assert_eq!(normalize_language_tag("en-us"), "en-US");
        assert_eq!(normalize_language_tag("PT-br"), "pt-BR");
        assert_eq!(normalize_language_tag("fr"), "fr");
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let speaker = EspeakSpeaker::new("glance-no-such-tts");
        assert!(matches!(
            speaker.list_voices().await,
            Err(SpeechError::Io(_))
        ));
        assert!(matches!(
            speaker.speak("hi", None),
            Err(SpeechError::Io(_))
        ));
    }
}
