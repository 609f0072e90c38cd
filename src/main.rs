use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use flex_chat::config::{FlexConfig, build_translator, load_config_from_file};
use flex_chat::context::{Arguments, Audience, Context, Key, SimpleAudience};
use flex_chat::placeholder::{PlaceholderPipeline, TemplateManager};
use flex_chat::translator::{Locale, MockMode, MockTranslator, Translator};
use tracing::info;

fn cli() -> Command {
    Command::new("flex")
        .version("0.1.0")
        .about("Render chat templates and translate messages")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("JSON configuration file with templates and the translator backend"),
        )
        .subcommand(
            Command::new("render")
                .about("Interpolate placeholders in a text")
                .arg(
                    Arg::new("text")
                        .help("Text to render, e.g. \"%template:chat_format%\"")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("audience")
                        .long("audience")
                        .short('a')
                        .help("Subject as JSON, e.g. '{\"name\": \"alice\", \"locale\": \"fr\"}'"),
                )
                .arg(
                    Arg::new("arg")
                        .long("arg")
                        .action(ArgAction::Append)
                        .help("Argument as namespace:name=value, may be repeated"),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a text with the configured backend")
                .arg(
                    Arg::new("text")
                        .help("Text to translate")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("target-locale")
                        .help("Target language code (e.g., fr, es, de)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("source-locale")
                        .long("source")
                        .short('s')
                        .help("Source language code, \"auto\" to detect")
                        .default_value("en"),
                )
                .arg(
                    Arg::new("mock")
                        .long("mock")
                        .short('m')
                        .help("Use the mock translator instead of the configured backend")
                        .action(ArgAction::SetTrue),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let matches = cli().get_matches();
    let config = match matches.get_one::<String>("config") {
        Some(path) => load_config_from_file(path)?,
        None => FlexConfig::default(),
    };

    match matches.subcommand() {
        Some(("render", args)) => render(config, args).await,
        Some(("translate", args)) => translate(config, args).await,
        _ => Err("Unknown command".into()),
    }
}

async fn render(config: FlexConfig, args: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let text = args.get_one::<String>("text").ok_or("Missing text")?;
    let audience: SimpleAudience = match args.get_one::<String>("audience") {
        Some(json) => serde_json::from_str(json)?,
        None => SimpleAudience::default(),
    };

    let mut arguments = Arguments::new();
    for raw in args.get_many::<String>("arg").into_iter().flatten() {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("Argument '{}' is not namespace:name=value", raw))?;
        let key = Key::parse(key).ok_or_else(|| format!("Invalid argument key '{}'", key))?;
        arguments.insert(key, value);
    }

    let engine = PlaceholderPipeline::with_defaults(Arc::new(TemplateManager::new(config.templates)))?;
    let subject: Arc<dyn Audience> = Arc::new(audience);
    let ctx = Context::new(subject, text.as_str()).with_arguments(arguments);
    println!("{}", engine.pump(&ctx).await);
    Ok(())
}

async fn translate(config: FlexConfig, args: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let text = args.get_one::<String>("text").ok_or("Missing text")?;
    let target = Locale::parse(args.get_one::<String>("target-locale").ok_or("Missing target")?)?;
    let source = Locale::parse(args.get_one::<String>("source-locale").ok_or("Missing source")?)?;

    let translator: Arc<dyn Translator> = if args.get_flag("mock") {
        Arc::new(MockTranslator::new(MockMode::Suffix))
    } else {
        build_translator(&config.translator.backend, &reqwest::Client::new()).await?
    };

    let result = translator.translate_detecting(text, &source, &target).await?;
    if source.is_auto() {
        info!("Detected source language: {}", result.source);
    }
    println!("{}", result.text);
    Ok(())
}
