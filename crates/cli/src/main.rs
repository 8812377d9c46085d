use anyhow::{Context, Result, bail};
use arboard::Clipboard;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use snapcrop_core::{Config, CoverRect, CropRect, SendOutcome, Snapcrop, export, init};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snapcrop", author, version, about = "Crop, redact and read text from images")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the backend base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Image to open in the editor
    image: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the editor window
    Edit {
        /// Image to open
        image: Option<PathBuf>,
    },
    /// Print the text recognised in an image
    Ocr {
        #[command(flatten)]
        input: Input,

        /// Copy the result to clipboard automatically
        #[arg(short, long, default_value_t = false)]
        copy: bool,
    },
    /// Crop and cover regions, writing a PNG
    Redact {
        #[command(flatten)]
        input: Input,

        /// Output file (defaults to the suggested export name)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Region to cover as X,Y,W,H; repeatable
        #[arg(long = "cover", value_parser = parse_rect)]
        covers: Vec<CropRect>,

        /// Also cover the text regions reported by the backend
        #[arg(long, default_value_t = false)]
        detect: bool,
    },
    /// Post an image to the upload endpoint
    Upload {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args, Debug)]
struct Input {
    /// Image file
    image: PathBuf,

    /// Crop to X,Y,W,H (image pixels) first
    #[arg(long, value_parser = parse_rect)]
    crop: Option<CropRect>,
}

/// Parses `X,Y,W,H`.
fn parse_rect(value: &str) -> std::result::Result<CropRect, String> {
    let parts: Vec<f32> = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("expected X,Y,W,H: {}", e))?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(CropRect::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err("width and height must be positive".to_string()),
        _ => Err(format!("expected 4 comma-separated numbers, got {}", parts.len())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(base) = &cli.api_base {
        config = config.override_api_base(base).context("Invalid --api-base")?;
    }
    let app = Snapcrop::with_config(config).context("Failed to initialize")?;
    debug!(api_base = %app.config().api_base, command = ?cli.command, "starting");

    match cli.command {
        None => app.run_interactive(cli.image).context("Editor failed")?,
        Some(Command::Edit { image }) => app.run_interactive(image).context("Editor failed")?,
        Some(Command::Ocr { input, copy }) => {
            let spinner = spinner("Reading text...")?;
            let result = app.extract_text(&input.image, input.crop).await;
            spinner.finish_and_clear();

            let text = result.context("Text recognition failed")?;
            println!("{}", text);

            // Copy to clipboard if requested
            if copy {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if let Err(e) = clipboard.set_text(text) {
                            eprintln!("Warning: Failed to copy to clipboard: {}", e);
                        } else {
                            eprintln!("(Copied to clipboard)");
                        }
                    }
                    Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
                }
            }
        }
        Some(Command::Redact {
            input,
            out,
            covers,
            detect,
        }) => {
            let mut covers: Vec<CoverRect> = covers
                .into_iter()
                .enumerate()
                .map(|(i, rect)| CoverRect::new(format!("cover-{}", i + 1), rect))
                .collect();

            if detect {
                let spinner = spinner("Detecting text regions...")?;
                let detected = app.detect_regions(&input.image).await;
                spinner.finish_and_clear();
                covers.extend(detected.context("Region detection failed")?);
            }

            let blob = app
                .redact(&input.image, input.crop, covers)
                .await
                .context("Failed to redact image")?;

            let out = out.unwrap_or_else(|| {
                let original = input.image.file_name().map(|n| n.to_string_lossy().into_owned());
                PathBuf::from(export::suggested_filename(original.as_deref()))
            });
            export::write_export(&out, &blob.data)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("{}", out.display());
        }
        Some(Command::Upload { input }) => {
            let spinner = spinner("Uploading...")?;
            let outcome = app.upload(&input.image, input.crop).await;
            spinner.finish_and_clear();

            match outcome.context("Failed to prepare upload")? {
                SendOutcome::Ok { status, .. } => println!("Uploaded (HTTP {})", status),
                SendOutcome::Rejected { status, body } => {
                    bail!("Upload rejected (HTTP {}): {}", status, snapcrop_core::remote::error_message(&body))
                }
                other => bail!("Upload failed: {}", other.reason().unwrap_or("unknown")),
            }
        }
    }

    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_arguments() {
        assert_eq!(parse_rect("1, 2,30,40").unwrap(), CropRect::new(1.0, 2.0, 30.0, 40.0));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("1,2,0,4").is_err());
        assert!(parse_rect("a,b,c,d").is_err());
    }

    #[test]
    fn bare_image_opens_editor() {
        let cli = Cli::try_parse_from(["snapcrop", "shot.png"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.image, Some(PathBuf::from("shot.png")));

        let cli = Cli::try_parse_from(["snapcrop", "redact", "a.png", "--cover", "0,0,5,5", "--cover", "1,1,2,2"]).unwrap();
        match cli.command {
            Some(Command::Redact { covers, .. }) => assert_eq!(covers.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
