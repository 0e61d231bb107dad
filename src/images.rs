//! Hero image acquisition.
//!
//! Image generation is best-effort. Every `(prompt variant, size)` pair is
//! tried in order until one yields image bytes; exhausting the matrix yields
//! [`HeroImage::Absent`] and the article is rendered without an image block.

use crate::config::ImageConfig;
use crate::models::HeroImage;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// What an image endpoint handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Inline base64 (`b64_json`).
    Base64(String),
    /// A URL that still has to be downloaded.
    Url(String),
}

/// A service that turns a prompt into an image.
pub trait ImageGenerator {
    async fn generate(&self, prompt: &str, size: &str) -> Result<ImagePayload, Box<dyn Error>>;

    /// Fetch the bytes behind an [`ImagePayload::Url`].
    async fn download(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>>;
}

/// Prompt variants for `title`, in the order they are tried.
pub fn prompts_for(config: &ImageConfig, title: &str) -> Vec<String> {
    config
        .prompt_variants
        .iter()
        .map(|variant| variant.replace("{title}", title))
        .collect()
}

async fn payload_bytes<G: ImageGenerator>(
    generator: &G,
    payload: ImagePayload,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let bytes = match payload {
        ImagePayload::Base64(encoded) => STANDARD.decode(encoded.trim())?,
        ImagePayload::Url(url) => generator.download(&url).await?,
    };
    if bytes.is_empty() {
        return Err("image payload was empty".into());
    }
    Ok(bytes)
}

/// Try the prompt/size matrix and write the first image obtained to
/// `images_dir/filename`.
///
/// Never fails: any error along the way moves on to the next combination,
/// and a write failure or an exhausted matrix yields [`HeroImage::Absent`].
#[instrument(level = "info", skip(generator, config, images_dir))]
pub async fn acquire_hero<G: ImageGenerator>(
    generator: &G,
    config: &ImageConfig,
    title: &str,
    images_dir: &Path,
    filename: &str,
) -> HeroImage {
    let prompts = prompts_for(config, title);
    let mut attempts = 0usize;

    for prompt in &prompts {
        for size in &config.sizes {
            attempts += 1;
            let bytes = match generator.generate(prompt, size).await {
                Ok(payload) => match payload_bytes(generator, payload).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(attempt = attempts, %size, error = %e, "Image payload unusable; trying next combination");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(attempt = attempts, %size, error = %e, "Image generation failed; trying next combination");
                    continue;
                }
            };

            let path = images_dir.join(filename);
            if let Err(e) = write_image(&path, &bytes).await {
                warn!(path = %path.display(), error = %e, "Could not write hero image; continuing without it");
                return HeroImage::Absent;
            }
            info!(path = %path.display(), bytes = bytes.len(), attempt = attempts, "Hero image written");
            return HeroImage::Present {
                filename: filename.to_string(),
                alt: title.to_string(),
            };
        }
    }

    warn!(attempts, "Every image prompt/size combination failed; article will have no hero image");
    HeroImage::Absent
}

async fn write_image(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::cell::RefCell;

    /// Fails until `succeed_on` calls have been made, then returns `payload`.
    struct ScriptedGenerator {
        succeed_on: usize,
        payload: ImagePayload,
        seen: RefCell<Vec<(String, String)>>,
    }

    impl ImageGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, size: &str) -> Result<ImagePayload, Box<dyn Error>> {
            self.seen.borrow_mut().push((prompt.to_string(), size.to_string()));
            if self.seen.borrow().len() < self.succeed_on {
                return Err("content policy violation".into());
            }
            Ok(self.payload.clone())
        }

        async fn download(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
            if url.starts_with("https://cdn.example/") {
                Ok(vec![0xFF, 0xD8, 0xFF])
            } else {
                Err("404".into())
            }
        }
    }

    fn config() -> ImageConfig {
        ImageConfig {
            prompt_variants: vec!["Photo: {title}".to_string(), "Illustration: {title}".to_string()],
            sizes: vec!["1536x1024".to_string(), "1024x1024".to_string()],
        }
    }

    #[test]
    fn test_prompts_for() {
        assert_eq!(
            prompts_for(&config(), "Budget"),
            vec!["Photo: Budget".to_string(), "Illustration: Budget".to_string()]
        );
    }

    #[tokio::test]
    async fn test_first_success_wins_and_matrix_order() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator {
            succeed_on: 3,
            payload: ImagePayload::Base64(STANDARD.encode([1u8, 2, 3])),
            seen: RefCell::new(Vec::new()),
        };
        let hero = acquire_hero(&generator, &config(), "Budget", tmp.path(), "x-hero.jpg").await;

        assert_eq!(
            hero,
            HeroImage::Present {
                filename: "x-hero.jpg".to_string(),
                alt: "Budget".to_string()
            }
        );
        let seen = generator.seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("Photo: Budget".to_string(), "1536x1024".to_string()));
        assert_eq!(seen[1], ("Photo: Budget".to_string(), "1024x1024".to_string()));
        assert_eq!(seen[2], ("Illustration: Budget".to_string(), "1536x1024".to_string()));
        assert_eq!(std::fs::read(tmp.path().join("x-hero.jpg")).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_url_payload_is_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator {
            succeed_on: 1,
            payload: ImagePayload::Url("https://cdn.example/img.jpg".to_string()),
            seen: RefCell::new(Vec::new()),
        };
        let hero = acquire_hero(&generator, &config(), "T", tmp.path(), "t-hero.jpg").await;
        assert_eq!(hero.filename(), Some("t-hero.jpg"));
        assert_eq!(std::fs::read(tmp.path().join("t-hero.jpg")).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_exhausted_matrix_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator {
            succeed_on: usize::MAX,
            payload: ImagePayload::Base64(STANDARD.encode([1u8])),
            seen: RefCell::new(Vec::new()),
        };
        let hero = acquire_hero(&generator, &config(), "T", tmp.path(), "t-hero.jpg").await;
        assert_eq!(hero, HeroImage::Absent);
        assert_eq!(generator.seen.borrow().len(), 4);
        assert!(!tmp.path().join("t-hero.jpg").exists());
    }

    #[tokio::test]
    async fn test_bad_base64_moves_on() {
        let tmp = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator {
            succeed_on: 1,
            payload: ImagePayload::Base64("%%% not base64 %%%".to_string()),
            seen: RefCell::new(Vec::new()),
        };
        let hero = acquire_hero(&generator, &config(), "T", tmp.path(), "t-hero.jpg").await;
        assert_eq!(hero, HeroImage::Absent);
        assert_eq!(generator.seen.borrow().len(), 4);
    }
}
