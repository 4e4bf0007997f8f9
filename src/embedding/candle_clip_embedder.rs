//! Local CLIP inference with Candle.
//!
//! Compiled only with the `embeddings-candle` feature. Weights and tokenizer
//! are fetched from the HuggingFace hub on first use and cached under
//! `$HF_HOME` (or `~/.cache/huggingface`).

use std::path::Path;

use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::clip;
use hf_hub::api::sync::ApiBuilder;
use tokenizers::Tokenizer;

use crate::embedding::embedder::{EmbedInput, Embedder, unsupported_input};
use crate::error::{MenagerieError, Result};
use crate::model::Modality;
use crate::vector::core::vector::Vector;

const IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const IMAGE_STD: [f32; 3] = [0.268_629_5, 0.261_302_6, 0.275_777_1];

fn candle_err(context: &str) -> impl Fn(candle_core::Error) -> MenagerieError + '_ {
    move |e| MenagerieError::embedding(format!("{context}: {e}"))
}

/// CLIP text and vision towers projected into a shared space.
///
/// ```no_run
/// use std::path::Path;
///
/// use menagerie::embedding::candle_clip_embedder::CandleClipEmbedder;
/// use menagerie::embedding::embedder::{EmbedInput, Embedder};
///
/// # async fn example() -> menagerie::error::Result<()> {
/// let embedder = CandleClipEmbedder::new("openai/clip-vit-base-patch32")?;
/// let query = embedder.embed(&EmbedInput::Text("a photo of a cat")).await?;
/// let image = embedder
///     .embed(&EmbedInput::ImagePath(Path::new("data/images/cat.jpg")))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CandleClipEmbedder {
    text_model: clip::text_model::ClipTextTransformer,
    vision_model: clip::vision_model::ClipVisionTransformer,
    text_projection: Linear,
    vision_projection: Linear,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    image_size: usize,
    model_name: String,
}

impl std::fmt::Debug for CandleClipEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleClipEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("image_size", &self.image_size)
            .finish()
    }
}

impl CandleClipEmbedder {
    /// Load a CLIP checkpoint with the ViT-B/32 layout from the hub.
    pub fn new(model_name: &str) -> Result<Self> {
        let device = Device::cuda_if_available(0).map_err(candle_err("device setup failed"))?;

        let cache_dir = std::env::var("HF_HOME")
            .or_else(|_| std::env::var("HOME").map(|home| format!("{home}/.cache/huggingface")))
            .unwrap_or_else(|_| "/tmp/huggingface".to_string());
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.into())
            .build()
            .map_err(|e| MenagerieError::embedding(format!("hub client setup failed: {e}")))?;
        let repo = api.model(model_name.to_string());

        let config = clip::ClipConfig::vit_base_patch32();

        log::info!("Loading CLIP weights for {model_name}");
        let weights = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| MenagerieError::embedding(format!("weights download failed: {e}")))?;

        let vb = if weights.extension().is_some_and(|ext| ext == "safetensors") {
            // SAFETY: the file is owned by the hub cache and not modified while mapped.
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)
                    .map_err(candle_err("loading safetensors failed"))?
            }
        } else {
            VarBuilder::from_pth(&weights, DType::F32, &device)
                .map_err(candle_err("loading pytorch weights failed"))?
        };

        let text_model =
            clip::text_model::ClipTextTransformer::new(vb.pp("text_model"), &config.text_config)
                .map_err(candle_err("text tower load failed"))?;
        let vision_model = clip::vision_model::ClipVisionTransformer::new(
            vb.pp("vision_model"),
            &config.vision_config,
        )
        .map_err(candle_err("vision tower load failed"))?;

        let dimension = config.text_config.projection_dim;
        let text_projection = candle_nn::linear_no_bias(
            config.text_config.embed_dim,
            dimension,
            vb.pp("text_projection"),
        )
        .map_err(candle_err("text projection load failed"))?;
        let vision_projection = candle_nn::linear_no_bias(
            config.vision_config.embed_dim,
            dimension,
            vb.pp("visual_projection"),
        )
        .map_err(candle_err("vision projection load failed"))?;

        let tokenizer_file = repo
            .get("tokenizer.json")
            .map_err(|e| MenagerieError::embedding(format!("tokenizer download failed: {e}")))?;
        let tokenizer = Tokenizer::from_file(tokenizer_file)
            .map_err(|e| MenagerieError::embedding(format!("tokenizer load failed: {e}")))?;

        Ok(Self {
            text_model,
            vision_model,
            text_projection,
            vision_projection,
            tokenizer,
            device,
            dimension,
            image_size: config.vision_config.image_size,
            model_name: model_name.to_string(),
        })
    }

    fn embed_text(&self, text: &str) -> Result<Vector> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| MenagerieError::embedding(format!("tokenization failed: {e}")))?;
        let ids = Tensor::new(encoding.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("token tensor"))?;

        let features = self
            .text_model
            .forward(&ids)
            .and_then(|f| self.text_projection.forward(&f))
            .map_err(candle_err("text forward pass failed"))?;
        self.to_unit_vector(&features)
    }

    fn embed_image(&self, path: &Path) -> Result<Vector> {
        let pixels = self.load_image(path)?;
        let features = self
            .vision_model
            .forward(&pixels)
            .and_then(|f| self.vision_projection.forward(&f))
            .map_err(candle_err("vision forward pass failed"))?;
        self.to_unit_vector(&features)
    }

    /// Decode, resize and normalize an image into a `(1, 3, H, W)` tensor.
    fn load_image(&self, path: &Path) -> Result<Tensor> {
        let img = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                MenagerieError::embedding(format!("cannot decode {}: {e}", path.display()))
            })?
            .resize_exact(
                self.image_size as u32,
                self.image_size as u32,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();

        let size = self.image_size;
        let build = || -> candle_core::Result<Tensor> {
            let mean = Tensor::new(&IMAGE_MEAN, &self.device)?.reshape((1, 1, 3))?;
            let std = Tensor::new(&IMAGE_STD, &self.device)?.reshape((1, 1, 3))?;
            Tensor::from_vec(img.into_raw(), (size, size, 3), &self.device)?
                .to_dtype(DType::F32)?
                .affine(1.0 / 255.0, 0.0)?
                .broadcast_sub(&mean)?
                .broadcast_div(&std)?
                .permute((2, 0, 1))?
                .unsqueeze(0)
        };
        build().map_err(candle_err("image tensor"))
    }

    /// L2-normalize a `(1, dim)` tensor and flatten it.
    fn to_unit_vector(&self, features: &Tensor) -> Result<Vector> {
        let data = features
            .sqr()
            .and_then(|t| t.sum_keepdim(1))
            .and_then(|t| t.sqrt())
            .and_then(|norm| features.broadcast_div(&norm))
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err("normalization failed"))?;
        Ok(Vector::new(data))
    }
}

#[async_trait]
impl Embedder for CandleClipEmbedder {
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        match input {
            EmbedInput::Text(text) => self.embed_text(text),
            EmbedInput::ImagePath(path) => self.embed_image(path),
            other => Err(unsupported_input(&self.model_name, other)),
        }
    }

    fn supported_modalities(&self) -> Vec<Modality> {
        vec![Modality::Text, Modality::Image]
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
