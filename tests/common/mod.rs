#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rocket::local::asynchronous::Client;
use tempfile::TempDir;

use genai_relay_server::config::AppConfig;
use genai_relay_server::model_client::{ImageBuffer, ModelClient, ModelError};
use genai_relay_server::{build_rocket, AppState};

/// One call observed by [`ScriptedClient`].
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub image: Option<ImageBuffer>,
}

/// Model client that answers every call with the same scripted outcome.
pub struct ScriptedClient {
    reply: Result<String, (u16, String)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err((status, message.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, prompt: &str, image: Option<&ImageBuffer>) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            image: image.cloned(),
        });
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, message)) => Err(ModelError::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.answer(prompt, None)
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageBuffer,
    ) -> Result<String, ModelError> {
        self.answer(prompt, Some(image))
    }
}

/// Local Rocket client over `model`, with image downloads going to `temp_dir`.
pub async fn local_client(model: Arc<ScriptedClient>, temp_dir: &TempDir) -> Client {
    let mut config = AppConfig::new("test-key");
    config.temp_dir = temp_dir.path().to_path_buf();

    let state = AppState::new(&config, model).expect("app state");
    Client::tracked(build_rocket(state))
        .await
        .expect("valid rocket instance")
}

pub fn encode_image(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, Rgb([120, 80, 30]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, format)
        .expect("encode fixture");
    out.into_inner()
}

pub fn leftover_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).expect("read temp dir").count()
}
