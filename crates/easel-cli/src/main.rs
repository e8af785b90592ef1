use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use easel_contracts::events::{EventPayload, SessionLog};
use easel_contracts::presets::{
    SizeRegistry, StyleRegistry, DEFAULT_MODEL, EXAMPLE_PROMPTS, INSPIRATION_PROMPTS,
};
use easel_contracts::prompt::compose_prompt;
use easel_contracts::request::build_request;
use easel_contracts::session::SessionState;
use easel_engine::{
    encode_png, save_artifact, session_stamp, DryRunBackend, GenerationOutcome,
    HuggingFaceBackend, ImageBackend, TOKEN_ENV,
};
use rand::seq::SliceRandom;
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(name = "easel", version, about = "Terminal studio for text-to-image generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session: set options with slash commands, type a prompt to generate.
    Session(SessionArgs),
    /// One-shot generation from flags.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long, default_value = "easel-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "None")]
    style: String,
    #[arg(long, default_value = "Square (512x512)")]
    size: String,
    #[arg(long)]
    negative: Option<String>,
    #[arg(long)]
    reference: Option<String>,
    #[arg(long, default_value = "easel-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long)]
    dry_run: bool,
}

const SETUP_INSTRUCTIONS: &str = "\
Setup instructions:
  1. Go to https://huggingface.co/settings/tokens
  2. Create a new token with Write permissions
  3. Create a .env file in the project root
  4. Add: HUGGINGFACE_TOKEN=hf_your_token_here
  5. Restart the application";

const EMPTY_PROMPT_WARNING: &str = "Please enter a prompt to generate an image.";

fn main() {
    let _ = dotenv::dotenv();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("easel error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Session(args) => run_session(args),
        Command::Generate(args) => run_generate(args),
    }
}

/// The form fields one generation attempt reads.
#[derive(Debug, Clone)]
struct GenerationForm {
    prompt: String,
    style: String,
    size: String,
    negative: Option<String>,
    reference: Option<String>,
}

impl GenerationForm {
    fn new() -> Self {
        Self {
            prompt: String::new(),
            style: "None".to_string(),
            size: "Square (512x512)".to_string(),
            negative: None,
            reference: None,
        }
    }
}

/// What one attempt produced, for display.
#[derive(Debug)]
enum Attempt {
    /// No usable prompt text; nothing was sent.
    EmptyPrompt,
    /// The backend failed; message is already classified for display.
    Failed(String),
    /// Success. `enhanced` is set when a style suffix or reference
    /// description changed the prompt the user typed.
    Generated { prompt: String, enhanced: bool },
}

/// Drives compose -> build -> generate and owns the retained result.
struct Presenter<'a> {
    backend: &'a dyn ImageBackend,
    styles: StyleRegistry,
    sizes: SizeRegistry,
    state: SessionState,
    log: SessionLog,
    model: String,
}

impl<'a> Presenter<'a> {
    fn new(backend: &'a dyn ImageBackend, log: SessionLog, model: impl Into<String>) -> Self {
        Self {
            backend,
            styles: StyleRegistry::default(),
            sizes: SizeRegistry::default(),
            state: SessionState::new(),
            log,
            model: model.into(),
        }
    }

    fn attempt(&mut self, form: &GenerationForm) -> Result<Attempt> {
        let style = self
            .styles
            .get(&form.style)
            .with_context(|| format!("unknown style preset '{}'", form.style))?
            .clone();
        let size = self
            .sizes
            .get(&form.size)
            .with_context(|| format!("unknown size option '{}'", form.size))?
            .clone();

        let final_prompt =
            match compose_prompt(&form.prompt, form.reference.as_deref(), &style.suffix) {
                Ok(prompt) => prompt,
                Err(_) => return Ok(Attempt::EmptyPrompt),
            };
        let request = match build_request(
            &final_prompt,
            form.negative.as_deref(),
            &size,
            &self.model,
        ) {
            Ok(request) => request,
            Err(_) => return Ok(Attempt::EmptyPrompt),
        };

        self.log.emit(
            "generation_started",
            json_object(json!({
                "prompt": request.prompt,
                "style": style.name,
                "size": size.name,
                "width": request.width,
                "height": request.height,
                "backend": self.backend.name(),
            })),
        )?;

        match self.backend.generate(&request) {
            GenerationOutcome::Failure { message } => {
                self.log.emit(
                    "generation_failed",
                    json_object(json!({ "message": message })),
                )?;
                Ok(Attempt::Failed(message))
            }
            GenerationOutcome::Success(generated) => {
                let png = encode_png(&generated.image)?;
                self.state.record_success(png, request.prompt.clone());
                let enhanced = !style.suffix.is_empty()
                    || form
                        .reference
                        .as_deref()
                        .map(str::trim)
                        .is_some_and(|text| !text.is_empty());
                self.log.emit(
                    "generation_succeeded",
                    json_object(json!({
                        "prompt": request.prompt,
                        "width": generated.width,
                        "height": generated.height,
                    })),
                )?;
                Ok(Attempt::Generated {
                    prompt: request.prompt,
                    enhanced,
                })
            }
        }
    }
}

fn resolve_backend(dry_run: bool) -> Result<Box<dyn ImageBackend>, i32> {
    if dry_run {
        return Ok(Box::new(DryRunBackend));
    }
    match HuggingFaceBackend::from_env() {
        Ok(backend) => Ok(Box::new(backend)),
        Err(err) => {
            eprintln!("easel: {err:#}");
            eprintln!("Generation is disabled until {TOKEN_ENV} is configured.");
            eprintln!("{SETUP_INSTRUCTIONS}");
            Err(2)
        }
    }
}

fn run_session(args: SessionArgs) -> Result<i32> {
    let backend = match resolve_backend(args.dry_run) {
        Ok(backend) => backend,
        Err(code) => return Ok(code),
    };
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let log = SessionLog::new(&events_path, format!("session-{}", session_stamp()));
    let mut presenter = Presenter::new(backend.as_ref(), log.clone(), args.model.clone());
    let mut form = GenerationForm::new();

    log.emit(
        "session_started",
        json_object(json!({
            "model": args.model,
            "backend": backend.name(),
            "out_dir": args.out.to_string_lossy().to_string(),
        })),
    )?;

    println!("Easel session started. Type /help for commands, or enter a prompt to generate.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(tail) = input.strip_prefix('/') {
            let (command, arg) = split_command(tail);
            match command.as_str() {
                "help" => print_help(),
                "styles" => {
                    for style in presenter.styles.list() {
                        if style.suffix.is_empty() {
                            println!("  {}", style.name);
                        } else {
                            println!("  {}  ({})", style.name, style.suffix.trim_start_matches(", "));
                        }
                    }
                }
                "style" => {
                    if presenter.styles.get(&arg).is_some() {
                        form.style = arg;
                        println!("Style preset: {}", form.style);
                    } else {
                        println!(
                            "Unknown style '{arg}'. Available: {}",
                            presenter.styles.names().join(", ")
                        );
                    }
                }
                "sizes" => {
                    for size in presenter.sizes.list() {
                        println!("  {} ({}x{})", size.name, size.width, size.height);
                    }
                }
                "size" => {
                    if presenter.sizes.get(&arg).is_some() {
                        form.size = arg;
                        println!("Size option: {}", form.size);
                    } else {
                        println!(
                            "Unknown size '{arg}'. Available: {}",
                            presenter.sizes.names().join(", ")
                        );
                    }
                }
                "negative" => {
                    if arg.is_empty() {
                        form.negative = None;
                        println!("Negative prompt cleared.");
                    } else {
                        println!("Negative prompt: {arg}");
                        form.negative = Some(arg);
                    }
                }
                "reference" => {
                    if arg.is_empty() {
                        form.reference = None;
                        println!("Reference description cleared.");
                    } else {
                        println!("Reference description: {arg}");
                        form.reference = Some(arg);
                    }
                }
                "random" => {
                    if let Some(prompt) = INSPIRATION_PROMPTS.choose(&mut rand::thread_rng()) {
                        form.prompt = (*prompt).to_string();
                        println!("Prompt: {prompt}");
                        println!("Enter /go to generate it.");
                    }
                }
                "examples" => {
                    for (idx, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
                        println!("  {}. {prompt}", idx + 1);
                    }
                    println!("Pick one with /example <n>.");
                }
                "example" => match arg.parse::<usize>() {
                    Ok(n) if (1..=EXAMPLE_PROMPTS.len()).contains(&n) => {
                        form.prompt = EXAMPLE_PROMPTS[n - 1].to_string();
                        println!("Prompt: {}", form.prompt);
                        println!("Enter /go to generate it.");
                    }
                    _ => println!("/example takes a number from 1 to {}.", EXAMPLE_PROMPTS.len()),
                },
                "go" => {
                    run_attempt(&mut presenter, &form, &args.out, &log)?;
                }
                "show" => match presenter.state.last() {
                    Some(last) => {
                        println!("Last prompt: {}", last.prompt);
                        println!("Image held in memory ({} bytes). Use /save to export.", last.png.len());
                    }
                    None => println!("Nothing generated yet."),
                },
                "save" => match presenter.state.last() {
                    Some(last) => {
                        let dir = if arg.is_empty() {
                            args.out.clone()
                        } else {
                            PathBuf::from(arg)
                        };
                        let path = save_artifact(&dir, &last.png)?;
                        log.emit(
                            "artifact_saved",
                            json_object(json!({
                                "path": path.to_string_lossy().to_string(),
                                "prompt": last.prompt,
                            })),
                        )?;
                        println!("Saved to {}", path.display());
                    }
                    None => println!("Nothing generated yet."),
                },
                "quit" | "exit" => break,
                _ => println!("Unknown command /{command}. Type /help for commands."),
            }
            continue;
        }

        form.prompt = input.to_string();
        run_attempt(&mut presenter, &form, &args.out, &log)?;
    }

    log.emit("session_finished", EventPayload::new())?;
    Ok(0)
}

fn run_attempt(
    presenter: &mut Presenter<'_>,
    form: &GenerationForm,
    out_dir: &Path,
    log: &SessionLog,
) -> Result<()> {
    if !form.prompt.trim().is_empty() {
        println!("Generating image... this may take 10-30 seconds.");
    }
    match presenter.attempt(form)? {
        Attempt::EmptyPrompt => println!("{EMPTY_PROMPT_WARNING}"),
        Attempt::Failed(message) => println!("{message}"),
        Attempt::Generated { prompt, enhanced } => {
            if enhanced {
                println!("Enhanced prompt: {prompt}");
            }
            println!("Image generated successfully.");
            if let Some(last) = presenter.state.last() {
                let path = save_artifact(out_dir, &last.png)?;
                log.emit(
                    "artifact_saved",
                    json_object(json!({
                        "path": path.to_string_lossy().to_string(),
                        "prompt": last.prompt,
                    })),
                )?;
                println!("Saved to {}", path.display());
            }
        }
    }
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let backend = match resolve_backend(args.dry_run) {
        Ok(backend) => backend,
        Err(code) => return Ok(code),
    };
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let log = SessionLog::new(&events_path, format!("generate-{}", session_stamp()));
    let mut presenter = Presenter::new(backend.as_ref(), log.clone(), args.model.clone());

    let form = GenerationForm {
        prompt: args.prompt.clone(),
        style: args.style.clone(),
        size: args.size.clone(),
        negative: args.negative.clone(),
        reference: args.reference.clone(),
    };

    match presenter.attempt(&form)? {
        Attempt::EmptyPrompt => {
            eprintln!("{EMPTY_PROMPT_WARNING}");
            Ok(1)
        }
        Attempt::Failed(message) => {
            eprintln!("{message}");
            Ok(1)
        }
        Attempt::Generated { prompt, enhanced } => {
            if enhanced {
                println!("Enhanced prompt: {prompt}");
            }
            let last = presenter
                .state
                .last()
                .context("generation succeeded but no result was retained")?;
            let path = save_artifact(&args.out, &last.png)?;
            log.emit(
                "artifact_saved",
                json_object(json!({
                    "path": path.to_string_lossy().to_string(),
                    "prompt": last.prompt,
                })),
            )?;
            println!("Saved to {}", path.display());
            Ok(0)
        }
    }
}

fn split_command(tail: &str) -> (String, String) {
    let command_len = tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = tail[..command_len].to_ascii_lowercase();
    let arg = tail[command_len..].trim().to_string();
    (command, arg)
}

fn print_help() {
    println!("Commands:");
    println!("  /styles            list style presets");
    println!("  /style <name>      pick a style preset");
    println!("  /sizes             list size options");
    println!("  /size <name>       pick a size option");
    println!("  /negative [text]   set or clear the negative prompt");
    println!("  /reference [text]  set or clear the reference description");
    println!("  /random            fill the prompt from the inspiration list");
    println!("  /examples          list example prompts");
    println!("  /example <n>       fill the prompt from the example list");
    println!("  /go                generate with the current form");
    println!("  /show              show the retained result");
    println!("  /save [dir]        export the retained image as PNG");
    println!("  /quit              leave the session");
    println!("Any other text is used as the prompt and generates immediately.");
}

fn json_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
