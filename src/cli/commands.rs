use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Provider;

/// Turn demonstration videos into step-by-step lessons and check learners against them
#[derive(Parser, Debug)]
#[command(
    name = "cyclops",
    about = "Turn demonstration videos into step-by-step lessons and check learners against them",
    version,
    author,
    long_about = "cyclops samples a demonstration video, asks a vision model for a timestamped \
                  procedure, cuts one clip per step, and then classifies live learner frames \
                  against the active step. It supports a local Ollama backend and hosted \
                  OpenAI-compatible APIs."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Extract a procedure from a video without storing a lesson",
        long_about = "Samples frames from the video, asks the model for timestamped steps, \
                      reconciles the step windows, and prints the procedure.\n\n\
                      Examples:\n  \
                      cyclops extract demo.mp4\n  \
                      cyclops extract demo.mp4 --title \"Change a tire\" --format json\n  \
                      cyclops extract demo.mp4 --provider cloud --model gpt-4o --no-clips"
    )]
    Extract(ExtractArgs),

    #[command(subcommand, about = "Create, inspect and delete stored lessons")]
    Lesson(LessonCommands),

    #[command(
        about = "Classify a burst of learner frames against a lesson step",
        long_about = "Sends up to five frames to the model and prints in_progress, complete \
                      or mistake.\n\n\
                      Examples:\n  \
                      cyclops verify --lesson <ID> --step 2 f1.jpg f2.jpg f3.jpg"
    )]
    Verify(VerifyArgs),

    #[command(
        about = "Generate a corrective overlay for a detected mistake",
        long_about = "Examples:\n  \
                      cyclops feedback --lesson <ID> --step 2 --mistake wrong_tool\n  \
                      cyclops feedback --lesson <ID> --step 2 --mistake wrong_tool --frame now.jpg"
    )]
    Feedback(FeedbackArgs),

    #[command(
        about = "Check backend availability",
        long_about = "Checks the configured backend, or every backend with --all.\n\n\
                      Examples:\n  \
                      cyclops health\n  \
                      cyclops health --provider cloud\n  \
                      cyclops health --all"
    )]
    Health(HealthArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

/// Backend overrides shared by every model-calling command
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    #[arg(
        short = 'p',
        long,
        value_parser = parse_provider,
        help = "Backend provider (local or cloud); defaults to CYCLOPS_PROVIDER"
    )]
    pub provider: Option<Provider>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name for the selected provider")]
    pub model: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Request timeout in seconds")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(value_name = "VIDEO", help = "Path to the demonstration video")]
    pub video: PathBuf,

    #[arg(short = 't', long, default_value = "", help = "Lesson title passed to the model")]
    pub title: String,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, help = "Skip cutting per-step clips")]
    pub no_clips: bool,

    #[arg(long, help = "Synthesize spoken instructions (needs OPENAI_API_KEY)")]
    pub tts: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum LessonCommands {
    #[command(about = "Store a video as a lesson and extract its procedure")]
    Create(LessonCreateArgs),

    #[command(about = "List stored lessons")]
    List(FormatArgs),

    #[command(about = "Show one lesson with its steps")]
    Show(LessonIdArgs),

    #[command(about = "Delete a lesson")]
    Delete(LessonIdArgs),

    #[command(about = "Cut the step clips again from the stored video")]
    RegenerateClips(LessonIdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LessonCreateArgs {
    #[arg(value_name = "VIDEO", help = "Path to the demonstration video")]
    pub video: PathBuf,

    #[arg(short = 't', long, default_value = "", help = "Lesson title")]
    pub title: String,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, help = "Synthesize spoken instructions (needs OPENAI_API_KEY)")]
    pub tts: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct LessonIdArgs {
    #[arg(value_name = "ID", help = "Lesson id")]
    pub id: String,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[arg(short = 'l', long, value_name = "ID", help = "Lesson id")]
    pub lesson: String,

    #[arg(short = 's', long, value_name = "STEP", help = "Step id within the lesson")]
    pub step: u32,

    #[arg(value_name = "FRAMES", required = true, help = "Image files in capture order")]
    pub frames: Vec<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct FeedbackArgs {
    #[arg(short = 'l', long, value_name = "ID", help = "Lesson id")]
    pub lesson: String,

    #[arg(short = 's', long, value_name = "STEP", help = "Step id within the lesson")]
    pub step: u32,

    #[arg(long, value_name = "TYPE", help = "Mistake identifier, e.g. wrong_tool")]
    pub mistake: String,

    #[arg(long, default_value = "0.8", help = "Detection confidence within [0, 1]")]
    pub confidence: f64,

    #[arg(long, value_name = "IMAGE", help = "Current camera frame")]
    pub frame: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'p',
        long,
        value_parser = parse_provider,
        conflicts_with = "all",
        help = "Specific provider to check"
    )]
    pub provider: Option<Provider>,

    #[arg(long, help = "Check every provider")]
    pub all: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    s.parse::<Provider>().map_err(|e| e.to_string())
}
