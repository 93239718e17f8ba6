use clap::{Parser, Subcommand};
use oss_image_process::config::{self, ServiceConfig};
use oss_image_process::imaging::RustBackend;
use oss_image_process::pipeline::{CancelFlag, ProcessOutput, Processor, ProcessorSettings};
use oss_image_process::runtime::BackendContext;
use oss_image_process::{logging, output, server};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "oss-image-process")]
#[command(about = "HTTP image processing service driven by x-oss-process descriptors")]
#[command(long_about = "\
HTTP image processing service driven by x-oss-process descriptors

POST an image to /image?x-oss-process=<descriptor> and get the processed
image back. A descriptor is a '/'-separated chain of operations, each a
name followed by comma-separated key_value options:

  image/resize,m_pad,w_300,h_200,color_FF0000/format,webp
  image/watermark,text_SGVsbG8,t_50,rotate_30,fill_1/blur,r_3,s_2
  image/info

Operations: resize, watermark, blur. Modifiers: format, info.
Encoder quality comes from [image] quality in the config file.
Errors come back as JSON: {\"code\": 400, \"message\": \"...\", \"reason\": \"...\"}.

Run 'oss-image-process gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Listen address, overriding `server.addr`
        #[arg(long)]
        addr: Option<String>,
    },
    /// Apply a descriptor to a local file
    Process {
        /// Source image
        #[arg(long, short)]
        input: PathBuf,
        /// Descriptor, with or without the `image/` prefix
        #[arg(long, short)]
        descriptor: String,
        /// Destination file (defaults to `<input>-out.<format>`)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { addr } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            if let Some(addr) = addr {
                config.server.addr = addr;
                config.validate()?;
            }
            logging::init(&config.logging)?;
            output::print_server_banner(&config);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(config))?;
        }
        Command::Process {
            input,
            descriptor,
            output,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            logging::init(&config.logging)?;
            run_process(&config, &input, &descriptor, output.as_deref())?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Offline counterpart of `POST /image`.
fn run_process(
    config: &ServiceConfig,
    input: &Path,
    descriptor: &str,
    output_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read(input)?;
    let processor = Processor::new(
        RustBackend::with_decode_limit(config.backend.max_decode_bytes)
            .with_output_limit(config.image.max_output_pixels),
        ProcessorSettings::from(config),
    );
    let context = BackendContext::new(&config.backend)?;
    let cancel = CancelFlag::new();
    let result = context.install(|| processor.process(&source, descriptor, &cancel))?;

    match result {
        ProcessOutput::Info(info) => {
            output::print_info(input, &info);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        ProcessOutput::Image(encoded) => {
            let destination = match output_path {
                Some(path) => path.to_path_buf(),
                None => default_output_path(input, encoded.format.name()),
            };
            std::fs::write(&destination, &encoded.bytes)?;
            output::print_process_summary(input, source.len(), descriptor, &encoded, &destination);
        }
    }
    Ok(())
}

fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}-out.{extension}"))
}
