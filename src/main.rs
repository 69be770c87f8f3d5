use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mri_lens::{ClassifierKind, LensConfig, OverlayStore, Pipeline, TumorClassifier, Upload};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a scan, render its saliency overlay and explain the result
    Analyze {
        image: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ModelArg::Transfer)]
        model: ModelArg,
        /// Skip the LLM explanation
        #[arg(long)]
        no_explain: bool,
    },
    /// Classify a scan and ask one question about it
    Ask {
        image: PathBuf,
        #[arg(short, long)]
        question: String,
        #[arg(short, long, value_enum, default_value_t = ModelArg::Transfer)]
        model: ModelArg,
    },
    /// Write an untrained network with the preset architecture
    Scaffold {
        #[arg(short, long, value_enum)]
        model: ModelArg,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Delete stored uploads and overlays
    Clean,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Transfer,
    Custom,
}

impl From<ModelArg> for ClassifierKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Transfer => ClassifierKind::TransferLearned,
            ModelArg::Custom => ClassifierKind::CustomCnn,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = LensConfig::resolve(args.config.as_deref())?;

    match args.command {
        Command::Analyze { image, model, no_explain } => {
            let start = Instant::now();
            let kind = ClassifierKind::from(model);
            let classifier = TumorClassifier::load(kind, kind.weights_path(&config))?;
            let mut pipeline = Pipeline::from_config(&config)?;
            if !no_explain {
                pipeline = pipeline.with_gemini(&config);
            }

            let analysis = pipeline.analyze(&classifier, &Upload::from_path(&image)?)?;

            println!("Model: {}", kind.display_name());
            println!("Predicted class: {}", analysis.prediction.class);
            println!("Confidence: {:.4}", analysis.prediction.confidence);
            println!("Probabilities:");
            for (class, p) in analysis.prediction.ranked() {
                println!("  {:<12} {:.4}", class.label(), p);
            }
            match &analysis.stored {
                Some(stored) => println!("Saliency map: {}", stored.overlay_path.display()),
                None => println!("Saliency map: not saved"),
            }
            match analysis.explanation {
                Some(Ok(text)) => println!("\nExplanation:\n{}", text),
                Some(Err(e)) => eprintln!("\nExplanation unavailable: {}", e),
                None => {}
            }
            info!("Done in {:.2?}", start.elapsed());
        }
        Command::Ask { image, question, model } => {
            let kind = ClassifierKind::from(model);
            let classifier = TumorClassifier::load(kind, kind.weights_path(&config))?;
            let pipeline = Pipeline::from_config(&config)?.with_gemini(&config);

            let consultation = pipeline.ask(&classifier, &Upload::from_path(&image)?, &question)?;
            println!(
                "Predicted class: {} ({:.2}%)",
                consultation.prediction.class,
                consultation.prediction.confidence * 100.0
            );
            match consultation.answer {
                Ok(text) => println!("\n{}", text),
                Err(e) => {
                    eprintln!("Could not answer: {}", e);
                    return Err(e.into());
                }
            }
        }
        Command::Scaffold { model, out, seed } => {
            let kind = ClassifierKind::from(model);
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let network = kind.architecture().build(&mut rng)?;
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            network.save_json(&out)?;
            println!("Wrote untrained {} network to {}", kind.display_name(), out.display());
        }
        Command::Clean => {
            let store = OverlayStore::new(&config.upload_dir, &config.output_dir);
            let removed = store.clean()?;
            println!("Removed {} files", removed);
        }
    }

    Ok(())
}
