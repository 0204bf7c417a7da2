use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arkcode::{helper, DirectorySink, ExportFormat, Generator, InputRule, LogoAsset};

/// Generate a QR code image from a link or any text.
#[derive(Parser, Debug)]
#[command(name = "arkcode", version, about)]
struct Cli {
    /// Text or link to encode
    text: String,

    /// Foreground colour as #rrggbb or #rgb
    #[arg(short, long, default_value = "#000000")]
    color: String,

    /// Image stamped in the centre of the code
    #[arg(short, long)]
    logo: Option<PathBuf>,

    /// Output format (png, jpg, jpeg, tiff); repeat to export several
    #[arg(short, long = "format", default_value = "png")]
    formats: Vec<ExportFormat>,

    /// Directory the files are written to
    #[arg(short, long, default_value = helper::DEFAULT_DIRECTORY)]
    out_dir: PathBuf,

    /// Black-and-white PNG named <site>_arkcode.png, as in the first release
    #[arg(long)]
    legacy: bool,

    /// Reject input that does not look like a link
    #[arg(long)]
    link: bool,

    /// Print a data: URL instead of writing files
    #[arg(long)]
    data_url: bool,

    /// Print the code to the terminal as well
    #[arg(long)]
    preview: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let default = if verbose { "arkcode=debug,info" } else { "arkcode=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    tracing::debug!("CLI config: {:?}", cli);

    run(&cli, &mut io::stdout().lock())?;
    Ok(())
}

/// Generates the code described by `cli` and writes the saved paths, the data URL and
/// the preview to `out`. Returns the files written.
fn run(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<Vec<PathBuf>> {
    let mut generator = Generator::new();
    if cli.legacy {
        generator = generator.legacy();
    } else if cli.link {
        generator = generator.input_rule(InputRule::Link);
    }

    generator.set_text(cli.text.as_str());
    generator
        .set_color_hex(&cli.color)
        .with_context(|| format!("bad --color value {:?}", cli.color))?;
    if let Some(path) = &cli.logo {
        let logo = LogoAsset::open(path).with_context(|| format!("cannot load logo {}", path.display()))?;
        generator.set_logo(logo);
    }

    if let Err(e) = generator.generate().map(|_| ()) {
        let message = generator.error_message().unwrap_or("Error generating QR code");
        eprintln!("{}", message);
        return Err(e.into());
    }

    if cli.preview {
        let ecc = generator.encoding_request().ecc;
        writeln!(out, "{}", helper::to_terminal_string(&cli.text, ecc)?)?;
    }

    if cli.data_url {
        if let Some(url) = generator.image_source()? {
            writeln!(out, "{}", url)?;
        }
        return Ok(Vec::new());
    }

    let mut sink = DirectorySink::new(&cli.out_dir);
    let mut saved = Vec::new();
    for format in &cli.formats {
        let path = generator.download(*format, &mut sink)?;
        writeln!(out, "{}", path.display())?;
        saved.push(path);
        if cli.legacy {
            // Legacy output is PNG regardless of the requested format.
            break;
        }
    }

    Ok(saved)
}
