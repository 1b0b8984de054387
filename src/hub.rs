//! Fetching weights, configs and tokenizers from the Hugging Face hub.

use std::fmt::Display;
use std::path::PathBuf;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{Api, ApiRepo};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::error::{Result, StudioError};

const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// One file in one hub repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubFile<'a> {
    pub repo: &'a str,
    pub filename: &'a str,
}

/// Which of the two candidates [`fetch_with_fallback`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Fallback,
}

/// Fetch `primary`, then `fallback` if the first fetch fails.
///
/// When nothing can be fetched the error names every repo and file that was
/// tried, along with the error each one gave.
pub fn fetch_with_fallback<E, F>(
    mut fetch: F,
    primary: HubFile<'_>,
    fallback: Option<HubFile<'_>>,
) -> Result<(PathBuf, Source)>
where
    E: Display,
    F: FnMut(HubFile<'_>) -> std::result::Result<PathBuf, E>,
{
    let first = match fetch(primary) {
        Ok(path) => return Ok((path, Source::Primary)),
        Err(e) => e,
    };
    let missing = format!(
        "failed to download '{}' from '{}': {first}",
        primary.filename, primary.repo
    );

    let Some(fallback) = fallback else {
        return Err(StudioError::ModelLoad(missing));
    };
    warn!(
        repo = primary.repo,
        file = primary.filename,
        fallback_repo = fallback.repo,
        fallback_file = fallback.filename,
        error = %first,
        "falling back"
    );

    fetch(fallback)
        .map(|path| (path, Source::Fallback))
        .map_err(|e| {
            StudioError::ModelLoad(format!(
                "{missing}; fallback '{}' from '{}' also failed: {e}",
                fallback.filename, fallback.repo
            ))
        })
}

/// A model repository on the hub, backed by the local hf cache.
pub struct ModelRepo {
    repo_id: String,
    api: Api,
    repo: ApiRepo,
}

impl ModelRepo {
    pub fn open(repo_id: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.model(repo_id.to_string());
        Ok(Self {
            repo_id: repo_id.to_string(),
            api,
            repo,
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn get(&self, filename: &str) -> Result<PathBuf> {
        fetch_with_fallback(|file| self.fetch(file), self.file(filename), None)
            .map(|(path, _)| path)
    }

    /// Deserialize the repo's `config.json`.
    pub fn config<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let path = self.get("config.json")?;
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Weights as a var builder: safetensors when published, the pickled
    /// PyTorch checkpoint otherwise.
    pub fn var_builder(&self, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
        let (path, source) = fetch_with_fallback(
            |file| self.fetch(file),
            self.file(SAFETENSORS_FILE),
            Some(self.file(PYTORCH_FILE)),
        )?;
        let vb = match source {
            // SAFETY: the file sits in the hf cache and is not modified while mapped.
            Source::Primary => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], dtype, device)
            },
            Source::Fallback => VarBuilder::from_pth(path, dtype, device),
        };
        vb.map_err(StudioError::model_load)
    }

    /// `tokenizer.json` from this repo, or from `fallback` when this repo
    /// only ships the slow tokenizer files.
    pub fn tokenizer(&self, fallback: Option<&str>) -> Result<Tokenizer> {
        let fallback = fallback.map(|repo| HubFile {
            repo,
            filename: TOKENIZER_FILE,
        });
        let (path, _) =
            fetch_with_fallback(|file| self.fetch(file), self.file(TOKENIZER_FILE), fallback)?;

        Tokenizer::from_file(&path).map_err(|e| {
            StudioError::ModelLoad(format!(
                "failed to load tokenizer from '{}': {e}",
                path.display()
            ))
        })
    }

    fn file<'a>(&'a self, filename: &'a str) -> HubFile<'a> {
        HubFile {
            repo: &self.repo_id,
            filename,
        }
    }

    fn fetch(
        &self,
        file: HubFile<'_>,
    ) -> std::result::Result<PathBuf, hf_hub::api::sync::ApiError> {
        debug!(repo = file.repo, filename = file.filename, "fetching from hub");
        if file.repo == self.repo_id {
            self.repo.get(file.filename)
        } else {
            self.api.model(file.repo.to_string()).get(file.filename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";
    const BASE: &str = "FacebookAI/roberta-base";

    /// Serves only the listed files and records every request.
    fn stub_hub<'a>(
        available: &'a [(&'a str, &'a str)],
        requests: &'a mut Vec<String>,
    ) -> impl FnMut(HubFile<'_>) -> std::result::Result<PathBuf, String> + 'a {
        move |file| {
            requests.push(format!("{}/{}", file.repo, file.filename));
            if available
                .iter()
                .any(|&(repo, name)| repo == file.repo && name == file.filename)
            {
                Ok(PathBuf::from(file.repo).join(file.filename))
            } else {
                Err("404 Not Found".to_string())
            }
        }
    }

    fn tokenizer_in(repo: &str) -> HubFile<'_> {
        HubFile {
            repo,
            filename: TOKENIZER_FILE,
        }
    }

    #[test]
    fn primary_file_is_used_when_present() {
        let mut requests = Vec::new();
        let available = [(MODEL, TOKENIZER_FILE), (BASE, TOKENIZER_FILE)];
        let (path, source) = fetch_with_fallback(
            stub_hub(&available, &mut requests),
            tokenizer_in(MODEL),
            Some(tokenizer_in(BASE)),
        )
        .unwrap();

        assert_eq!(source, Source::Primary);
        assert_eq!(path, PathBuf::from(MODEL).join(TOKENIZER_FILE));
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn fallback_repo_supplies_a_missing_tokenizer() {
        let mut requests = Vec::new();
        let available = [(BASE, TOKENIZER_FILE)];
        let (path, source) = fetch_with_fallback(
            stub_hub(&available, &mut requests),
            tokenizer_in(MODEL),
            Some(tokenizer_in(BASE)),
        )
        .unwrap();

        assert_eq!(source, Source::Fallback);
        assert_eq!(path, PathBuf::from(BASE).join(TOKENIZER_FILE));
        assert_eq!(
            requests,
            [
                format!("{MODEL}/{TOKENIZER_FILE}"),
                format!("{BASE}/{TOKENIZER_FILE}")
            ]
        );
    }

    #[test]
    fn pytorch_checkpoint_backs_up_missing_safetensors() {
        let mut requests = Vec::new();
        let available = [(MODEL, PYTORCH_FILE)];
        let (path, source) = fetch_with_fallback(
            stub_hub(&available, &mut requests),
            HubFile {
                repo: MODEL,
                filename: SAFETENSORS_FILE,
            },
            Some(HubFile {
                repo: MODEL,
                filename: PYTORCH_FILE,
            }),
        )
        .unwrap();

        assert_eq!(source, Source::Fallback);
        assert_eq!(path, PathBuf::from(MODEL).join(PYTORCH_FILE));
    }

    #[test]
    fn nothing_found_names_every_repo_and_cause() {
        let mut requests = Vec::new();
        let err = fetch_with_fallback(
            stub_hub(&[], &mut requests),
            tokenizer_in(MODEL),
            Some(tokenizer_in(BASE)),
        )
        .unwrap_err();

        assert!(matches!(err, StudioError::ModelLoad(_)), "{err:?}");
        let message = err.to_string();
        assert!(message.contains(MODEL), "{message}");
        assert!(message.contains(BASE), "{message}");
        assert_eq!(message.matches("404 Not Found").count(), 2, "{message}");
    }

    #[test]
    fn without_fallback_the_primary_error_is_returned() {
        let mut requests = Vec::new();
        let err = fetch_with_fallback(stub_hub(&[], &mut requests), tokenizer_in(MODEL), None)
            .unwrap_err();

        assert!(matches!(err, StudioError::ModelLoad(ref m) if m.contains(MODEL)));
        assert_eq!(requests.len(), 1);
    }
}
