use std::time::Instant;

use log::{debug, info, warn};

use crate::classifier::{Prediction, TumorClassifier};
use crate::config::LensConfig;
use crate::error::Result;
use crate::narrative::prompt::{chat_prompt, explanation_prompt};
use crate::narrative::{GeminiClient, NarrativeError, NarrativeService};
use crate::preprocess::{to_input_tensor, Upload};
use crate::saliency::{Overlay, SaliencyEngine};
use crate::store::{OverlayStore, StoredOverlay};

/// Everything one `analyze` call produced.
#[derive(Debug)]
pub struct Analysis {
    pub prediction: Prediction,
    pub overlay: Overlay,
    /// `None` when persisting failed; the overlay above is still valid.
    pub stored: Option<StoredOverlay>,
    /// `None` when no narrator is attached.
    pub explanation: Option<std::result::Result<String, NarrativeError>>,
}

/// Answer to one follow-up question.
#[derive(Debug)]
pub struct Consultation {
    pub prediction: Prediction,
    pub answer: std::result::Result<String, NarrativeError>,
}

/// One user interaction: classify, explain visually, persist, narrate.
///
/// Decoding and model failures abort. Storage and narrative failures are
/// logged and reported in the result instead.
pub struct Pipeline {
    engine: SaliencyEngine,
    store: OverlayStore,
    narrator: Option<Box<dyn NarrativeService>>,
}

impl Pipeline {
    pub fn new(engine: SaliencyEngine, store: OverlayStore) -> Pipeline {
        Pipeline { engine, store, narrator: None }
    }

    /// Engine and store from `config`, without a narrator.
    ///
    /// Only an invalid saliency config is an error. Storage directories that
    /// cannot be created are logged, and each `analyze` then reports
    /// `stored: None`.
    pub fn from_config(config: &LensConfig) -> Result<Pipeline> {
        let engine = SaliencyEngine::new(config.saliency.clone())?;
        let store = match OverlayStore::open(&config.upload_dir, &config.output_dir) {
            Ok(store) => store,
            Err(e) => {
                warn!("Overlay storage unavailable: {}", e);
                OverlayStore::new(&config.upload_dir, &config.output_dir)
            }
        };
        Ok(Pipeline::new(engine, store))
    }

    /// Attaches a `GeminiClient` built from `config`. A client that cannot
    /// be built leaves the pipeline without a narrator.
    pub fn with_gemini(self, config: &LensConfig) -> Pipeline {
        match GeminiClient::from_config(config) {
            Ok(client) => self.with_narrator(Box::new(client)),
            Err(e) => {
                warn!("Narrative service unavailable: {}", e);
                self
            }
        }
    }

    pub fn with_narrator(mut self, narrator: Box<dyn NarrativeService>) -> Pipeline {
        self.narrator = Some(narrator);
        self
    }

    pub fn store(&self) -> &OverlayStore {
        &self.store
    }

    pub fn analyze(&self, classifier: &TumorClassifier, upload: &Upload) -> Result<Analysis> {
        let original = upload.decode()?;
        debug!("Decoded {} ({}x{})", upload.file_name, original.width(), original.height());

        let started = Instant::now();
        let input = to_input_tensor(&original, classifier.input_type())?;
        let prediction = classifier.predict(&input)?;
        info!(
            "{}: {} ({:.4}) in {:.2?}",
            classifier.kind(), prediction.class, prediction.confidence, started.elapsed()
        );

        let started = Instant::now();
        let overlay = self.engine.compute_overlay(
            classifier,
            &original,
            &input,
            prediction.class_index(),
            original.dimensions(),
        )?;
        info!("Saliency overlay computed in {:.2?}", started.elapsed());

        let stored = match self.store.persist(upload, &overlay.image) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!("Could not save overlay for {}: {}", upload.file_name, e);
                None
            }
        };

        let explanation = self.narrator.as_ref().map(|narrator| {
            let started = Instant::now();
            let result = narrator.generate(&explanation_prompt(&prediction), &overlay.image);
            match &result {
                Ok(_) => info!("Explanation generated in {:.2?}", started.elapsed()),
                Err(e) => warn!("Explanation failed: {}", e),
            }
            result
        });

        Ok(Analysis { prediction, overlay, stored, explanation })
    }

    /// Classifies `upload` and asks one question about it. No state is kept
    /// between calls.
    pub fn ask(&self, classifier: &TumorClassifier, upload: &Upload, question: &str) -> Result<Consultation> {
        let original = upload.decode()?;
        let input = to_input_tensor(&original, classifier.input_type())?;
        let prediction = classifier.predict(&input)?;
        info!("{}: {} ({:.4})", classifier.kind(), prediction.class, prediction.confidence);

        let answer = match &self.narrator {
            Some(narrator) => narrator.generate(&chat_prompt(&prediction, question), &original),
            None => Err(NarrativeError::Unavailable),
        };
        if let Err(e) = &answer {
            warn!("Question could not be answered: {}", e);
        }
        Ok(Consultation { prediction, answer })
    }
}
