pub mod ai;
pub mod capture;
pub mod dispatcher;
pub mod flow;
pub mod settings;
pub mod speech;

use std::sync::Arc;

use ai::anthropic::AnthropicClient;
use capture::{Camera, CommandCamera, FileCamera};
use settings::{CaptureSource, Settings};
use speech::{EspeakSpeaker, Speaker};

/// Build the camera described by the settings.
pub fn camera_from_settings(settings: &Settings) -> Option<Arc<dyn Camera>> {
    let camera: Arc<dyn Camera> = match settings.capture_source()? {
        CaptureSource::File(path) => Arc::new(FileCamera::new(
            path,
            settings.max_width,
            settings.jpeg_quality,
        )),
        CaptureSource::Command(cmd) => Arc::new(CommandCamera::new(
            cmd.program.clone(),
            cmd.args.clone(),
            settings.max_width,
            settings.jpeg_quality,
        )),
    };
    Some(camera)
}

pub fn provider_from_settings(settings: &Settings) -> AnthropicClient {
    AnthropicClient::with_base_url(settings.api_key.clone(), settings.base_url.clone())
}

pub fn speaker_from_settings(settings: &Settings) -> Arc<dyn Speaker> {
    Arc::new(EspeakSpeaker::new(settings.speech_program.clone()))
}
