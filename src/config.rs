use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scriptscan-ocr-server")]
#[command(about = "Multi-engine OCR server for photographed exam scripts")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9310")]
    pub port: u16,

    /// Default language for OCR (e.g., "eng", "deu", "fra")
    #[arg(long, env = "OCR_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Enable GPU acceleration for engines that support it
    #[arg(long, env = "USE_GPU", default_value = "false")]
    pub use_gpu: bool,

    /// Directory holding recognition model files (downloaded to a cache
    /// directory if not set)
    #[arg(long, env = "OCR_MODEL_DIR")]
    pub model_dir: Option<String>,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub max_file_size: usize,
    pub use_gpu: bool,
    pub model_dir: Option<String>,
    pub tessdata_path: Option<String>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            default_language: args.default_language,
            max_file_size: args.max_file_size,
            use_gpu: args.use_gpu,
            model_dir: args.model_dir,
            tessdata_path: args.tessdata_path,
        }
    }
}
